use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, ProblemId};

/// A single exercise. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub lesson_id: LessonId,
    #[serde(default)]
    pub prompt_text: String,
    /// Canonical answer; also shown verbatim on reveal.
    #[serde(default)]
    pub answer_text: String,
}

impl Problem {
    #[must_use]
    pub fn new(
        id: ProblemId,
        lesson_id: LessonId,
        prompt_text: impl Into<String>,
        answer_text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            lesson_id,
            prompt_text: prompt_text.into(),
            answer_text: answer_text.into(),
        }
    }

    /// Answer text for display, with a placeholder when the server sent none.
    #[must_use]
    pub fn display_answer(&self) -> &str {
        if self.answer_text.is_empty() {
            "N/A"
        } else {
            &self.answer_text
        }
    }
}
