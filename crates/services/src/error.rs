//! Shared error types for the services crate.

use thiserror::Error;

use api::ApiError;
use lesson_core::model::LessonId;

/// Errors emitted by `LessonContext`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonError {
    /// The learner has not unlocked this lesson yet.
    #[error("lesson {0} is locked; keep a streak going in an unlocked lesson to open it")]
    Locked(LessonId),
    #[error("no lessons found")]
    NoLessons,
    #[error("lesson {0} is not in the lesson list")]
    UnknownLesson(LessonId),
    #[error("lesson index {0} is out of range")]
    OutOfRange(usize),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `PracticeEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("failed to load problems for lesson {lesson}: {source}")]
    LoadProblems {
        lesson: LessonId,
        #[source]
        source: ApiError,
    },
}

/// Errors emitted by `ReviewScheduler` for user-invoked reviews.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReviewError {
    #[error("No lessons available to review.")]
    NoLessons,
    #[error("No problems found for lesson {0}.")]
    NoProblems(LessonId),
    #[error("a review cannot open while another overlay is showing")]
    OverlayActive,
}

/// Errors emitted by `LoginHandler`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoginError {
    #[error("Please enter a username.")]
    EmptyUsername,
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error(transparent)]
    Lessons(#[from] LessonError),
}

/// Errors emitted while reading `SessionSettings` from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds, got {raw:?}")]
    InvalidMillis { key: &'static str, raw: String },
    #[error("{key} must be a whole number, got {raw:?}")]
    InvalidCount { key: &'static str, raw: String },
    #[error("{key} must be true or false, got {raw:?}")]
    InvalidBool { key: &'static str, raw: String },
    #[error("review delay range is inverted: min {min_ms} ms > max {max_ms} ms")]
    InvertedRange { min_ms: u128, max_ms: u128 },
    #[error("unlock streak must be at least 1")]
    ZeroStreak,
}
