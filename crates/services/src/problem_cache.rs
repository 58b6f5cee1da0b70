use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api::LearnApi;
use lesson_core::model::{LessonId, Problem};

/// Problems already fetched per lesson, shared by review lookups.
#[derive(Clone)]
pub struct ProblemCache {
    api: Arc<dyn LearnApi>,
    entries: Arc<Mutex<HashMap<LessonId, Arc<[Problem]>>>>,
}

impl ProblemCache {
    #[must_use]
    pub fn new(api: Arc<dyn LearnApi>) -> Self {
        Self {
            api,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<LessonId, Arc<[Problem]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn cached(&self, lesson_id: LessonId) -> Option<Arc<[Problem]>> {
        self.entries().get(&lesson_id).cloned()
    }

    /// Cached problems for `lesson_id`, fetching them on a miss.
    ///
    /// A failed fetch yields an empty list and is not cached, so the next call
    /// retries.
    pub async fn get_or_load(&self, lesson_id: LessonId) -> Arc<[Problem]> {
        if let Some(hit) = self.cached(lesson_id) {
            return hit;
        }
        match self.api.load_problems(lesson_id).await {
            Ok(problems) => {
                let problems: Arc<[Problem]> = problems.into();
                self.entries().insert(lesson_id, Arc::clone(&problems));
                problems
            }
            Err(err) => {
                tracing::warn!(lesson = %lesson_id, %err, "failed to load problems for review");
                Arc::from(Vec::new())
            }
        }
    }

    pub fn insert(&self, lesson_id: LessonId, problems: Vec<Problem>) {
        self.entries().insert(lesson_id, problems.into());
    }

    pub fn invalidate(&self, lesson_id: LessonId) {
        self.entries().remove(&lesson_id);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::InMemoryApi;
    use lesson_core::model::{Lesson, ProblemId};

    fn api_with_lesson() -> InMemoryApi {
        let api = InMemoryApi::new();
        let lesson = LessonId::new(1);
        api.add_lesson(
            Lesson::new(lesson, "One", ""),
            vec![Problem::new(ProblemId::new(1), lesson, "p", "a")],
        );
        api
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let api = api_with_lesson();
        let cache = ProblemCache::new(Arc::new(api.clone()));
        assert_eq!(cache.get_or_load(LessonId::new(1)).await.len(), 1);
        assert_eq!(cache.get_or_load(LessonId::new(1)).await.len(), 1);
        assert_eq!(api.load_problem_calls(), 1);

        cache.invalidate(LessonId::new(1));
        cache.get_or_load(LessonId::new(1)).await;
        assert_eq!(api.load_problem_calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let api = api_with_lesson();
        api.fail_problems_for(LessonId::new(1));
        let cache = ProblemCache::new(Arc::new(api.clone()));
        assert!(cache.get_or_load(LessonId::new(1)).await.is_empty());
        assert!(cache.cached(LessonId::new(1)).is_none());
        cache.get_or_load(LessonId::new(1)).await;
        assert_eq!(api.load_problem_calls(), 2);
    }

    #[test]
    fn insert_and_clear() {
        let cache = ProblemCache::new(Arc::new(InMemoryApi::new()));
        cache.insert(LessonId::new(4), Vec::new());
        assert!(cache.cached(LessonId::new(4)).is_some());
        cache.clear();
        assert!(cache.cached(LessonId::new(4)).is_none());
    }
}
