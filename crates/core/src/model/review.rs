use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::LessonId;

/// Stage tag attached to attempts made from the review overlay.
pub const REVIEW_STAGE: &str = "review";

/// Server-scheduled review: which lesson is owed and from when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueReview {
    #[serde(default)]
    pub lesson_id: Option<LessonId>,
    pub due_at: DateTime<Utc>,
    /// Leitner box the server keeps the lesson in. Informational only.
    #[serde(default, rename = "box", skip_serializing_if = "Option::is_none")]
    pub leitner_box: Option<u32>,
}

impl DueReview {
    #[must_use]
    pub fn new(lesson_id: Option<LessonId>, due_at: DateTime<Utc>) -> Self {
        Self {
            lesson_id,
            due_at,
            leitner_box: None,
        }
    }

    /// A review is due once its timestamp is not after `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}
