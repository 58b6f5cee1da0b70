use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use lesson_core::model::{
    DueReview, Lesson, LessonId, Problem, ProblemId, User, UserId, ValidationResult,
};

use crate::client::{AttemptRecord, LearnApi};
use crate::error::ApiError;

#[derive(Default)]
struct MemoryState {
    lessons: Vec<Lesson>,
    problems: HashMap<LessonId, Vec<Problem>>,
    users: HashMap<String, User>,
    next_review: Option<DueReview>,
    attempts: Vec<AttemptRecord>,
    validation_override: Option<ValidationResult>,
    validation_failure: Option<String>,
    advance_failure: Option<String>,
    failing_problem_lessons: HashSet<LessonId>,
    fail_recording: bool,
    validate_latency: Option<Duration>,
    validate_calls: usize,
    load_problem_calls: usize,
    next_review_calls: usize,
}

/// In-process stand-in for the lessons service, for tests and offline runs.
///
/// The default judge accepts a submission when its trimmed text equals the
/// problem's canonical answer.
#[derive(Clone, Default)]
pub struct InMemoryApi {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ApiError> {
        self.state
            .lock()
            .map_err(|e| ApiError::Unavailable(e.to_string()))
    }

    /// Mutations from test setup ignore poisoning; a poisoned fake is a bug in the test.
    fn lock_for_setup(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a lesson with its problems. Lessons keep insertion order.
    pub fn add_lesson(&self, lesson: Lesson, problems: Vec<Problem>) {
        let mut state = self.lock_for_setup();
        state.problems.insert(lesson.id, problems);
        state.lessons.retain(|existing| existing.id != lesson.id);
        state.lessons.push(lesson);
    }

    pub fn add_user(&self, user: User) {
        self.lock_for_setup()
            .users
            .insert(user.username.clone(), user);
    }

    pub fn set_next_review(&self, next: Option<DueReview>) {
        self.lock_for_setup().next_review = next;
    }

    /// Answer every validation with `result` instead of judging.
    pub fn set_validation_override(&self, result: Option<ValidationResult>) {
        self.lock_for_setup().validation_override = result;
    }

    /// Make validation fail with a server error carrying `message`.
    pub fn fail_validation(&self, message: Option<String>) {
        self.lock_for_setup().validation_failure = message;
    }

    pub fn fail_advance(&self, message: Option<String>) {
        self.lock_for_setup().advance_failure = message;
    }

    pub fn fail_problems_for(&self, lesson_id: LessonId) {
        self.lock_for_setup()
            .failing_problem_lessons
            .insert(lesson_id);
    }

    pub fn fail_recording(&self, fail: bool) {
        self.lock_for_setup().fail_recording = fail;
    }

    /// Delay every validation by `latency` of runtime time.
    pub fn set_validate_latency(&self, latency: Option<Duration>) {
        self.lock_for_setup().validate_latency = latency;
    }

    #[must_use]
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.lock_for_setup().attempts.clone()
    }

    #[must_use]
    pub fn validate_calls(&self) -> usize {
        self.lock_for_setup().validate_calls
    }

    #[must_use]
    pub fn load_problem_calls(&self) -> usize {
        self.lock_for_setup().load_problem_calls
    }

    #[must_use]
    pub fn next_review_calls(&self) -> usize {
        self.lock_for_setup().next_review_calls
    }

    #[must_use]
    pub fn user(&self, username: &str) -> Option<User> {
        self.lock_for_setup().users.get(username).cloned()
    }

    fn find_problem(state: &MemoryState, problem_id: ProblemId) -> Option<&Problem> {
        state
            .problems
            .values()
            .flatten()
            .find(|problem| problem.id == problem_id)
    }
}

fn server_error(action: &'static str, message: &str) -> ApiError {
    ApiError::Status {
        action,
        status: 500,
        body: message.to_string(),
    }
}

#[async_trait]
impl LearnApi for InMemoryApi {
    async fn list_lessons(&self) -> Result<Vec<Lesson>, ApiError> {
        Ok(self.lock()?.lessons.clone())
    }

    async fn load_lesson(&self, id: LessonId) -> Result<Lesson, ApiError> {
        self.lock()?
            .lessons
            .iter()
            .find(|lesson| lesson.id == id)
            .cloned()
            .ok_or(ApiError::NotFound("lesson"))
    }

    async fn load_problems(&self, lesson_id: LessonId) -> Result<Vec<Problem>, ApiError> {
        let mut state = self.lock()?;
        state.load_problem_calls += 1;
        if state.failing_problem_lessons.contains(&lesson_id) {
            return Err(server_error("load problems", "problems unavailable"));
        }
        Ok(state.problems.get(&lesson_id).cloned().unwrap_or_default())
    }

    async fn validate(
        &self,
        problem_id: ProblemId,
        submission: &str,
    ) -> Result<ValidationResult, ApiError> {
        let latency = {
            let mut state = self.lock()?;
            state.validate_calls += 1;
            state.validate_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.lock()?;
        if let Some(message) = &state.validation_failure {
            return Err(server_error("validate", message));
        }
        if let Some(result) = &state.validation_override {
            return Ok(result.clone());
        }
        let problem = Self::find_problem(&state, problem_id).ok_or(ApiError::NotFound("problem"))?;
        if submission.trim() == problem.answer_text.trim() {
            Ok(ValidationResult::passed(None))
        } else {
            Ok(ValidationResult::failed("Incorrect."))
        }
    }

    async fn record_attempt(
        &self,
        username: Option<&str>,
        problem_id: ProblemId,
        submitted_text: &str,
        result: &ValidationResult,
        stage: Option<&str>,
    ) -> Result<(), ApiError> {
        let Some(username) = username.filter(|name| !name.is_empty()) else {
            return Ok(());
        };
        let mut state = self.lock()?;
        if state.fail_recording {
            return Err(server_error("record attempt", "attempt store offline"));
        }
        state.attempts.push(AttemptRecord::from_validation(
            username,
            problem_id,
            submitted_text,
            result,
            stage,
        ));
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, ApiError> {
        self.lock()?
            .users
            .get(username)
            .cloned()
            .ok_or(ApiError::NotFound("user"))
    }

    /// Unknown usernames are registered with the first lesson unlocked.
    async fn login_with_username(&self, username: &str) -> Result<User, ApiError> {
        let mut state = self.lock()?;
        if let Some(user) = state.users.get(username) {
            return Ok(user.clone());
        }
        let first = state.lessons.first().map(|lesson| lesson.id);
        let next_id = u64::try_from(state.users.len()).unwrap_or(u64::MAX) + 1;
        let user = User {
            user_id: UserId::new(next_id),
            username: username.to_string(),
            active_lesson: first,
            lessons: first.into_iter().collect(),
        };
        state.users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn advance_user(&self, username: &str) -> Result<User, ApiError> {
        let mut state = self.lock()?;
        if let Some(message) = &state.advance_failure {
            return Err(server_error("advance", message));
        }
        let order: Vec<LessonId> = state.lessons.iter().map(|lesson| lesson.id).collect();
        let user = state
            .users
            .get_mut(username)
            .ok_or(ApiError::NotFound("user"))?;

        let position = user
            .active_lesson
            .and_then(|active| order.iter().position(|id| *id == active));
        let next = match position {
            Some(index) => order.get(index + 1).copied(),
            None => order.first().copied(),
        };
        let Some(next) = next else {
            return Err(ApiError::Status {
                action: "advance",
                status: 400,
                body: "No next lesson to unlock.".into(),
            });
        };
        if !user.lessons.contains(&next) {
            user.lessons.push(next);
        }
        user.active_lesson = Some(next);
        Ok(user.clone())
    }

    async fn fetch_next_review(&self, _username: &str) -> Option<DueReview> {
        let mut state = self.lock().ok()?;
        state.next_review_calls += 1;
        state.next_review.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryApi {
        let api = InMemoryApi::new();
        for id in 1..=2 {
            let lesson_id = LessonId::new(id);
            api.add_lesson(
                Lesson::new(lesson_id, format!("Lesson {id}"), ""),
                vec![Problem::new(
                    ProblemId::new(id * 10),
                    lesson_id,
                    "(+ 1 2)",
                    "3",
                )],
            );
        }
        api
    }

    #[tokio::test]
    async fn default_judge_compares_trimmed_text() {
        let api = seeded();
        assert!(api.validate(ProblemId::new(10), " 3 ").await.unwrap().ok);
        assert!(!api.validate(ProblemId::new(10), "4").await.unwrap().ok);
        assert_eq!(api.validate_calls(), 2);
    }

    #[tokio::test]
    async fn login_registers_then_advance_unlocks_next() {
        let api = seeded();
        let user = api.login_with_username("ada").await.unwrap();
        assert_eq!(user.lessons, vec![LessonId::new(1)]);

        let advanced = api.advance_user("ada").await.unwrap();
        assert_eq!(advanced.active_lesson, Some(LessonId::new(2)));
        assert!(advanced.has_lesson(LessonId::new(2)));

        let err = api.advance_user("ada").await.unwrap_err();
        assert_eq!(err.user_message(), "No next lesson to unlock.");
    }

    #[tokio::test]
    async fn recording_without_username_is_a_no_op() {
        let api = seeded();
        api.fail_recording(true);
        let result = ValidationResult::passed(None);
        api.record_attempt(None, ProblemId::new(10), "3", &result, None)
            .await
            .unwrap();
        assert!(
            api.record_attempt(Some("ada"), ProblemId::new(10), "3", &result, None)
                .await
                .is_err()
        );
        assert!(api.attempts().is_empty());
    }

    #[tokio::test]
    async fn failing_lesson_problems_surface_errors() {
        let api = seeded();
        api.fail_problems_for(LessonId::new(2));
        assert_eq!(api.load_problems(LessonId::new(1)).await.unwrap().len(), 1);
        assert!(api.load_problems(LessonId::new(2)).await.is_err());
        assert_eq!(api.load_problem_calls(), 2);
    }
}
