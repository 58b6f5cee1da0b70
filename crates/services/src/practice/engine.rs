use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use api::LearnApi;
use lesson_core::UiMode;
use lesson_core::model::{Feedback, LessonId, ProblemId, judge};

use super::state::{PracticeSnapshot, PracticeState};
use crate::attempts::record_in_background;
use crate::auth::AuthContext;
use crate::config::SessionSettings;
use crate::error::PracticeError;
use crate::lessons::LessonContext;
use crate::problem_cache::ProblemCache;
use crate::shell::Shell;
use crate::timer::{TimerSlot, TimerTicket};

const ALREADY_REVEALED: &str = "You revealed this one. Try the next problem.";
const EMPTY_ANSWER: &str = "Type your answer first";
const NO_PROBLEM: &str = "No problem selected";
const SIGN_IN_FIRST: &str = "Please sign in first.";
const LESSON_UNLOCKED: &str = "Next lesson unlocked!";

struct PracticeInner {
    api: Arc<dyn LearnApi>,
    shell: Shell,
    auth: AuthContext,
    lessons: LessonContext,
    cache: ProblemCache,
    settings: SessionSettings,
    state: Mutex<PracticeState>,
    advance_timer: TimerSlot,
}

impl Drop for PracticeInner {
    fn drop(&mut self) {
        self.advance_timer.cancel();
    }
}

/// Drives the current problem: checking answers, the streak, reveal and
/// timed auto-advance.
///
/// At most one auto-advance is pending at a time; any manual move voids it.
#[derive(Clone)]
pub struct PracticeEngine {
    inner: Arc<PracticeInner>,
}

impl PracticeEngine {
    #[must_use]
    pub fn new(
        api: Arc<dyn LearnApi>,
        shell: Shell,
        auth: AuthContext,
        lessons: LessonContext,
        cache: ProblemCache,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PracticeInner {
                api,
                shell,
                auth,
                lessons,
                cache,
                settings,
                state: Mutex::new(PracticeState::default()),
                advance_timer: TimerSlot::new("practice-advance"),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PracticeState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_feedback(&self, feedback: Feedback) -> Feedback {
        self.state().feedback = Some(feedback.clone());
        feedback
    }

    #[must_use]
    pub fn snapshot(&self) -> PracticeSnapshot {
        let mode = self.inner.shell.mode();
        let advance_pending = self.inner.advance_timer.is_pending();
        let state = self.state();
        PracticeSnapshot {
            lesson_id: state.lesson_id,
            problem: state.current().cloned(),
            index: state.index,
            total: state.problems.len(),
            streak: state.streak,
            answer: state.answer.clone(),
            feedback: state.feedback.clone(),
            reveal_requested: state.reveal_requested,
            is_revealed: state.is_current_revealed(),
            loading_next: state.loading_next,
            unlock_proposed: mode.is_unlock_modal(),
            advance_pending,
        }
    }

    /// Fetch the lesson's problems and restart the run at the first one.
    ///
    /// A failed fetch leaves an empty problem list rather than the previous
    /// lesson's problems.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::LoadProblems` with the API error.
    pub async fn load_problems_for_lesson(&self, lesson_id: LessonId) -> Result<usize, PracticeError> {
        self.inner.advance_timer.cancel();
        let loaded = self.inner.api.load_problems(lesson_id).await;

        self.inner.advance_timer.cancel();
        match loaded {
            Ok(problems) => {
                self.inner.cache.insert(lesson_id, problems.clone());
                let count = problems.len();
                self.state().replace_problems(lesson_id, problems);
                tracing::info!(lesson = %lesson_id, count, "practice problems loaded");
                Ok(count)
            }
            Err(source) => {
                tracing::warn!(lesson = %lesson_id, err = %source, "failed to load practice problems");
                self.state().replace_problems(lesson_id, Vec::new());
                Err(PracticeError::LoadProblems {
                    lesson: lesson_id,
                    source,
                })
            }
        }
    }

    /// Draft text typed into the answer box.
    pub fn set_answer(&self, text: impl Into<String>) {
        self.state().answer = text.into();
    }

    /// Check `raw` against the current problem.
    ///
    /// Returns `None` when the login overlay swallows the submission or the
    /// problem changed while the judge was answering.
    pub async fn submit_answer(&self, raw: &str) -> Option<Feedback> {
        if self.inner.shell.mode().is_login() {
            return None;
        }

        let problem = {
            let mut state = self.state();
            state.answer = raw.to_string();
            if state.is_current_revealed() {
                let feedback = Feedback::negative(ALREADY_REVEALED);
                state.feedback = Some(feedback.clone());
                return Some(feedback);
            }
            state.current().cloned()
        };

        let submitted = raw.trim();
        if submitted.is_empty() {
            return Some(self.set_feedback(Feedback::negative(EMPTY_ANSWER)));
        }
        let Some(problem) = problem else {
            return Some(self.set_feedback(Feedback::negative(NO_PROBLEM)));
        };

        let result = match self.inner.api.validate(problem.id, submitted).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(problem = %problem.id, %err, "validation failed");
                let feedback = Feedback::negative(format!("Validation failed: {}", err.user_message()));
                return self.apply_if_current(problem.id, |state| {
                    state.feedback = Some(feedback.clone());
                    feedback
                });
            }
        };

        record_in_background(
            Arc::clone(&self.inner.api),
            self.inner.auth.username(),
            problem.id,
            submitted.to_string(),
            result.clone(),
            None,
        );

        let verdict = judge(&result, submitted, &problem.answer_text);
        let feedback = verdict.feedback();
        let streak = self.apply_if_current(problem.id, |state| {
            state.feedback = Some(feedback.clone());
            if verdict.is_correct() {
                state.streak += 1;
            } else {
                state.streak = 0;
            }
            state.streak
        })?;
        tracing::debug!(problem = %problem.id, correct = verdict.is_correct(), streak, "answer checked");

        if verdict.is_correct() {
            self.after_correct(streak);
        }
        Some(feedback)
    }

    /// Run `apply` only if `problem_id` is still the problem on screen.
    fn apply_if_current<T>(
        &self,
        problem_id: ProblemId,
        apply: impl FnOnce(&mut PracticeState) -> T,
    ) -> Option<T> {
        let mut state = self.state();
        if state.current_id() != Some(problem_id) {
            tracing::debug!(problem = %problem_id, "problem changed while checking; result dropped");
            return None;
        }
        Some(apply(&mut state))
    }

    fn after_correct(&self, streak: u32) {
        if streak >= self.inner.settings.unlock_streak {
            let raised = self.propose_unlock();
            if raised || self.inner.shell.mode().is_unlock_modal() {
                self.clear_advance_timer();
                if raised {
                    tracing::info!(streak, "lesson unlock proposed");
                }
                return;
            }
        }
        if self.inner.settings.advance_on_correct {
            self.schedule_advance(self.inner.settings.advance_delay);
        }
    }

    /// Raise the unlock proposal. `true` only when it was not showing yet.
    fn propose_unlock(&self) -> bool {
        !self.inner.shell.mode().is_unlock_modal()
            && self.inner.shell.try_transition(UiMode::with_unlock_modal)
    }

    /// Move to the next problem, voiding any pending auto-advance.
    pub fn next_problem(&self) {
        self.inner.advance_timer.cancel();
        self.state().step();
    }

    /// Ask to reveal the current answer; `confirm_reveal` completes it.
    ///
    /// Refused behind the login overlay, without a problem, or when the
    /// problem was already revealed.
    pub fn reveal_current(&self) -> bool {
        if self.inner.shell.mode().is_login() {
            return false;
        }
        let mut state = self.state();
        if state.current().is_none() || state.is_current_revealed() {
            return false;
        }
        state.reveal_requested = true;
        true
    }

    pub fn cancel_reveal(&self) {
        self.state().reveal_requested = false;
    }

    /// Disclose the current answer and schedule the move to the next problem.
    pub fn confirm_reveal(&self) -> Option<Feedback> {
        let login_showing = self.inner.shell.mode().is_login();
        let feedback = {
            let mut state = self.state();
            if !state.reveal_requested {
                return None;
            }
            state.reveal_requested = false;
            if login_showing || state.is_current_revealed() {
                return None;
            }
            let problem = state.current()?.clone();
            state.revealed.insert(problem.id);
            let feedback = Feedback::revealed_answer(problem.display_answer());
            state.feedback = Some(feedback.clone());
            tracing::debug!(problem = %problem.id, "answer revealed");
            feedback
        };
        self.schedule_advance(self.inner.settings.reveal_delay);
        Some(feedback)
    }

    /// Accept the unlock proposal: advance the learner on the server and
    /// switch to the newly active lesson.
    ///
    /// Returns `None` when no proposal is showing. On failure the proposal
    /// stays up so the learner can retry.
    pub async fn confirm_lesson_advance(&self) -> Option<Feedback> {
        if !self.inner.shell.mode().is_unlock_modal() {
            return None;
        }
        let Some(username) = self.inner.auth.username() else {
            return Some(self.set_feedback(Feedback::negative(SIGN_IN_FIRST)));
        };

        let user = match self.inner.api.advance_user(&username).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(%err, "lesson advance failed");
                return Some(self.set_feedback(Feedback::negative(err.user_message())));
            }
        };

        let previous_lesson = self.state().lesson_id;
        self.inner.auth.set_user(user.clone());
        self.state().streak = 0;
        self.inner.shell.transition(UiMode::without_unlock_modal);
        tracing::info!(username = %username, active = ?user.active_lesson, "lesson advanced");

        if let Some(active) = user.active_lesson.filter(|id| Some(*id) != previous_lesson) {
            if let Err(err) = self.inner.lessons.set_lesson_by_id(active).await {
                return Some(self.set_feedback(Feedback::negative(err.to_string())));
            }
            if let Err(err) = self.load_problems_for_lesson(active).await {
                return Some(self.set_feedback(Feedback::negative(err.to_string())));
            }
        }
        Some(self.set_feedback(Feedback::positive(LESSON_UNLOCKED)))
    }

    /// Decline the unlock proposal and start the streak over.
    pub fn reset_streak_and_dismiss(&self) {
        self.state().streak = 0;
        self.inner.shell.transition(UiMode::without_unlock_modal);
    }

    /// Void a pending auto-advance without moving.
    pub fn clear_advance_timer(&self) {
        self.inner.advance_timer.cancel();
        self.state().loading_next = false;
    }

    fn schedule_advance(&self, delay: Duration) {
        self.state().loading_next = true;
        let weak: Weak<PracticeInner> = Arc::downgrade(&self.inner);
        self.inner.advance_timer.schedule(delay, move |ticket| async move {
            if let Some(inner) = weak.upgrade() {
                PracticeEngine { inner }.fire_advance(ticket);
            }
        });
    }

    fn fire_advance(&self, ticket: TimerTicket) {
        let mut state = self.state();
        if !self.inner.advance_timer.is_current(ticket) {
            return;
        }
        state.loading_next = false;
        if self.inner.shell.mode().suppresses_auto_advance() {
            tracing::debug!("auto-advance suppressed by overlay");
            return;
        }
        state.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryUsernameStore;
    use api::InMemoryApi;

    fn engine() -> (PracticeEngine, Shell) {
        let api: Arc<dyn LearnApi> = Arc::new(InMemoryApi::new());
        let shell = Shell::new();
        let auth = AuthContext::new(shell.clone(), Arc::new(MemoryUsernameStore::default()));
        let lessons = LessonContext::new(Arc::clone(&api), shell.clone());
        let cache = ProblemCache::new(Arc::clone(&api));
        let engine = PracticeEngine::new(
            api,
            shell.clone(),
            auth,
            lessons,
            cache,
            SessionSettings::default(),
        );
        (engine, shell)
    }

    #[tokio::test]
    async fn unlock_is_raised_once() {
        let (engine, shell) = engine();
        shell.transition(|_| UiMode::Practice);
        assert!(engine.propose_unlock());
        assert_eq!(shell.mode(), UiMode::UnlockModal);
        assert!(!engine.propose_unlock());
        assert_eq!(shell.mode(), UiMode::UnlockModal);
    }

    #[tokio::test]
    async fn unlock_is_not_raised_over_login() {
        let (engine, shell) = engine();
        shell.transition(UiMode::with_login);
        assert!(!engine.propose_unlock());
        assert!(shell.mode().is_login());
    }
}
