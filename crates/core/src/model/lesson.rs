use serde::{Deserialize, Serialize};

use crate::model::ids::LessonId;

/// Lower bound for a lesson's estimated duration, in minutes.
pub const MIN_ESTIMATE_MINUTES: u32 = 5;

/// Estimate used when a lesson's problems could not be counted.
pub const FALLBACK_ESTIMATE_MINUTES: u32 = 15;

/// A unit of curriculum as served by the lessons API.
///
/// `problem_count` and `estimated_minutes` are filled in client-side and are
/// only hints for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body_md: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
}

impl Lesson {
    #[must_use]
    pub fn new(id: LessonId, title: impl Into<String>, body_md: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body_md: body_md.into(),
            problem_count: None,
            estimated_minutes: None,
        }
    }

    /// Record how many problems the lesson holds and derive the time estimate.
    pub fn set_problem_count(&mut self, count: usize) {
        self.problem_count = Some(count);
        self.estimated_minutes = Some(estimate_minutes(count));
    }

    /// Mark the problem count as unknown after a failed lookup.
    pub fn set_count_unavailable(&mut self) {
        self.problem_count = Some(0);
        self.estimated_minutes = Some(FALLBACK_ESTIMATE_MINUTES);
    }

    /// Lesson body with escaped newlines expanded and outer whitespace removed.
    #[must_use]
    pub fn cleaned_body(&self) -> String {
        clean_body(&self.body_md)
    }
}

/// Two and a half minutes per problem, rounded up, never below five minutes.
#[must_use]
pub fn estimate_minutes(problem_count: usize) -> u32 {
    let half_minutes = problem_count.saturating_mul(5);
    let minutes = u32::try_from(half_minutes.div_ceil(2)).unwrap_or(u32::MAX);
    minutes.max(MIN_ESTIMATE_MINUTES)
}

/// Lesson bodies are stored with literal `\n` sequences; expand them.
#[must_use]
pub fn clean_body(raw: &str) -> String {
    raw.replace("\\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_has_five_minute_floor() {
        assert_eq!(estimate_minutes(0), 5);
        assert_eq!(estimate_minutes(2), 5);
        assert_eq!(estimate_minutes(3), 8);
        assert_eq!(estimate_minutes(4), 10);
        assert_eq!(estimate_minutes(10), 25);
    }

    #[test]
    fn unavailable_count_uses_fallback_estimate() {
        let mut lesson = Lesson::new(LessonId::new(1), "Atoms", "");
        lesson.set_count_unavailable();
        assert_eq!(lesson.problem_count, Some(0));
        assert_eq!(lesson.estimated_minutes, Some(FALLBACK_ESTIMATE_MINUTES));
    }

    #[test]
    fn cleans_escaped_newlines() {
        let lesson = Lesson::new(LessonId::new(1), "Lists", "  # Lists\\n\\n(list 1 2)  ");
        assert_eq!(lesson.cleaned_body(), "# Lists\n\n(list 1 2)");
    }

    #[test]
    fn deserializes_server_shape_without_hints() {
        let lesson: Lesson =
            serde_json::from_str(r#"{"id": 4, "title": "Cons", "body_md": "x"}"#).unwrap();
        assert_eq!(lesson.id, LessonId::new(4));
        assert_eq!(lesson.problem_count, None);
    }
}
