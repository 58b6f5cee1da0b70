use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, UserId};

/// Learner as returned by login/advance calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub active_lesson: Option<LessonId>,
    /// Unlocked lessons.
    #[serde(default)]
    pub lessons: Vec<LessonId>,
}

impl User {
    #[must_use]
    pub fn has_lesson(&self, id: LessonId) -> bool {
        self.lessons.contains(&id)
    }
}
