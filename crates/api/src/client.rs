use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use lesson_core::model::{
    DueReview, Lesson, LessonId, Problem, ProblemId, User, ValidationResult,
};

use crate::error::ApiError;

/// Body of an attempt-recording call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub username: String,
    pub problem_id: ProblemId,
    pub submitted_text: String,
    pub is_correct: bool,
    pub stage: Option<String>,
    pub error_reason: Option<String>,
    pub details: Option<Value>,
}

impl AttemptRecord {
    /// Build the record for a judged submission. An explicit `stage` wins over
    /// the stage the judge reported.
    #[must_use]
    pub fn from_validation(
        username: &str,
        problem_id: ProblemId,
        submitted_text: &str,
        result: &ValidationResult,
        stage: Option<&str>,
    ) -> Self {
        Self {
            username: username.to_string(),
            problem_id,
            submitted_text: submitted_text.to_string(),
            is_correct: result.ok,
            stage: stage.map(str::to_string).or_else(|| result.stage.clone()),
            error_reason: if result.ok { None } else { result.error.clone() },
            details: result.details.clone(),
        }
    }
}

/// Remote lessons/judge service consumed by the practice and review engines.
#[async_trait]
pub trait LearnApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn list_lessons(&self) -> Result<Vec<Lesson>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown lessons.
    async fn load_lesson(&self, id: LessonId) -> Result<Lesson, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn load_problems(&self, lesson_id: LessonId) -> Result<Vec<Problem>, ApiError>;

    /// Ask the judge about a submission.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with the status and body text when the judge
    /// responds with an error, or `ApiError::Http` on transport failure.
    async fn validate(
        &self,
        problem_id: ProblemId,
        submission: &str,
    ) -> Result<ValidationResult, ApiError>;

    /// Store an attempt. Does nothing when no username is known.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn record_attempt(
        &self,
        username: Option<&str>,
        problem_id: ProblemId,
        submitted_text: &str,
        result: &ValidationResult,
        stage: Option<&str>,
    ) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` with the server message on failure.
    async fn get_user_by_username(&self, username: &str) -> Result<User, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` with the server message on failure.
    async fn login_with_username(&self, username: &str) -> Result<User, ApiError>;

    /// Unlock the lesson after the user's active one.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` with the server message on failure.
    async fn advance_user(&self, username: &str) -> Result<User, ApiError>;

    /// Next scheduled review. Lookup failures read as "nothing scheduled".
    async fn fetch_next_review(&self, username: &str) -> Option<DueReview>;
}
