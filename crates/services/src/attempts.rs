use std::sync::Arc;

use api::LearnApi;
use lesson_core::model::{ProblemId, ValidationResult};

/// Record an attempt without blocking the caller.
///
/// The verdict has already been shown by the time this runs; a failed write
/// is only logged.
pub fn record_in_background(
    api: Arc<dyn LearnApi>,
    username: Option<String>,
    problem_id: ProblemId,
    submitted: String,
    result: ValidationResult,
    stage: Option<&'static str>,
) {
    tokio::spawn(async move {
        let outcome = api
            .record_attempt(username.as_deref(), problem_id, &submitted, &result, stage)
            .await;
        match outcome {
            Ok(()) => tracing::debug!(problem = %problem_id, stage, "attempt recorded"),
            Err(err) => tracing::warn!(problem = %problem_id, %err, "failed to record attempt"),
        }
    });
}
