//! Lesson access and navigation predicates.
//!
//! These are recomputed from current state on every call; nothing here is cached.

use crate::model::{Lesson, LessonId, User};

/// Whether the previous/next lesson buttons are disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Navigation {
    pub prev_disabled: bool,
    pub next_disabled: bool,
}

/// A lesson is accessible when it is in the user's unlocked set.
#[must_use]
pub fn has_access(user: Option<&User>, lesson_id: LessonId) -> bool {
    user.is_some_and(|user| user.has_lesson(lesson_id))
}

/// Lesson following the current one in list order.
#[must_use]
pub fn next_lesson_id(lessons: &[Lesson], current: Option<usize>) -> Option<LessonId> {
    let index = current?;
    lessons.get(index + 1).map(|lesson| lesson.id)
}

#[must_use]
pub fn at_first_lesson(lessons: &[Lesson], current: Option<usize>) -> bool {
    let min = lessons.iter().map(|lesson| lesson.id).min();
    current_id(lessons, current).is_some_and(|id| Some(id) == min)
}

#[must_use]
pub fn at_last_lesson(lessons: &[Lesson], current: Option<usize>) -> bool {
    let max = lessons.iter().map(|lesson| lesson.id).max();
    current_id(lessons, current).is_some_and(|id| Some(id) == max)
}

#[must_use]
pub fn navigation(lessons: &[Lesson], current: Option<usize>, user: Option<&User>) -> Navigation {
    let multiple = lessons.len() > 1;
    let next_locked =
        next_lesson_id(lessons, current).is_some_and(|next| !has_access(user, next));

    Navigation {
        prev_disabled: !multiple || at_first_lesson(lessons, current),
        next_disabled: !multiple || at_last_lesson(lessons, current) || next_locked,
    }
}

fn current_id(lessons: &[Lesson], current: Option<usize>) -> Option<LessonId> {
    current.and_then(|index| lessons.get(index)).map(|lesson| lesson.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;

    fn lessons(ids: &[u64]) -> Vec<Lesson> {
        ids.iter()
            .map(|id| Lesson::new(LessonId::new(*id), format!("L{id}"), ""))
            .collect()
    }

    fn user(unlocked: &[u64]) -> User {
        User {
            user_id: UserId::new(1),
            username: "ada".into(),
            active_lesson: unlocked.last().map(|id| LessonId::new(*id)),
            lessons: unlocked.iter().map(|id| LessonId::new(*id)).collect(),
        }
    }

    #[test]
    fn next_is_disabled_when_locked() {
        let list = lessons(&[1, 2, 3]);
        let learner = user(&[1]);
        let nav = navigation(&list, Some(0), Some(&learner));
        assert!(nav.prev_disabled);
        assert!(nav.next_disabled);

        let learner = user(&[1, 2]);
        let nav = navigation(&list, Some(0), Some(&learner));
        assert!(!nav.next_disabled);
    }

    #[test]
    fn last_lesson_disables_next() {
        let list = lessons(&[1, 2]);
        let learner = user(&[1, 2]);
        let nav = navigation(&list, Some(1), Some(&learner));
        assert!(!nav.prev_disabled);
        assert!(nav.next_disabled);
        assert_eq!(next_lesson_id(&list, Some(1)), None);
    }

    #[test]
    fn single_lesson_disables_both() {
        let list = lessons(&[5]);
        assert_eq!(
            navigation(&list, Some(0), None),
            Navigation {
                prev_disabled: true,
                next_disabled: true
            }
        );
    }

    #[test]
    fn no_user_has_no_access() {
        assert!(!has_access(None, LessonId::new(1)));
    }
}
