use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::feedback::Feedback;

/// Judge response for a submission.
///
/// `details` is kept as raw JSON because it is echoed back verbatim when the
/// attempt is recorded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ValidationResult {
    #[must_use]
    pub fn passed(stage: Option<String>) -> Self {
        Self {
            ok: true,
            stage,
            error: None,
            details: None,
        }
    }

    /// Stand-in record for a validator call that never produced a result.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            stage: None,
            error: Some(error.into()),
            details: None,
        }
    }

    /// Expression of the first failing test case, when the judge reported one.
    #[must_use]
    pub fn first_failure_expr(&self) -> Option<&str> {
        self.details
            .as_ref()?
            .get("failures")?
            .as_array()?
            .first()?
            .get("expr")?
            .as_str()
            .filter(|expr| !expr.is_empty())
    }
}

/// Outcome of checking a practice submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct { stage: Option<String> },
    /// The judge accepted the submission but it differs from the canonical text.
    WrongFormat,
    Incorrect {
        reason: String,
        failed_expr: Option<String>,
    },
}

impl Verdict {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct { .. })
    }

    #[must_use]
    pub fn feedback(&self) -> Feedback {
        match self {
            Verdict::Correct { stage } => match stage {
                Some(stage) => Feedback::positive(format!("Correct! ({stage})")),
                None => Feedback::positive("Correct!"),
            },
            Verdict::WrongFormat => Feedback::negative("Incorrect format."),
            Verdict::Incorrect {
                reason,
                failed_expr,
            } => match failed_expr {
                Some(expr) => Feedback::negative(format!("{reason}\nFailed test: {expr}")),
                None => Feedback::negative(reason.clone()),
            },
        }
    }
}

/// Decide correctness from both the judge's flag and a literal comparison
/// of the trimmed submission against the canonical answer.
#[must_use]
pub fn judge(result: &ValidationResult, submitted: &str, canonical: &str) -> Verdict {
    let literal_match = submitted.trim() == canonical;
    match (result.ok, literal_match) {
        (true, true) => Verdict::Correct {
            stage: result.stage.clone().filter(|stage| !stage.is_empty()),
        },
        (true, false) => Verdict::WrongFormat,
        (false, _) => Verdict::Incorrect {
            reason: result
                .error
                .clone()
                .filter(|error| !error.is_empty())
                .unwrap_or_else(|| "Incorrect.".to_string()),
            failed_expr: result.first_failure_expr().map(str::to_string),
        },
    }
}
