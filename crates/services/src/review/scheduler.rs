use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use tokio::task::JoinHandle;

use api::LearnApi;
use lesson_core::model::{DueReview, Feedback, LessonId, Problem, REVIEW_STAGE, ValidationResult};
use lesson_core::{Clock, UiMode};

use super::state::{DueCheck, ManualReview, ReviewSnapshot, ReviewState};
use crate::attempts::record_in_background;
use crate::auth::AuthContext;
use crate::config::SessionSettings;
use crate::error::ReviewError;
use crate::lessons::LessonContext;
use crate::problem_cache::ProblemCache;
use crate::shell::Shell;
use crate::timer::TimerSlot;

const EMPTY_ANSWER: &str = "Type your answer first";

struct ReviewInner {
    api: Arc<dyn LearnApi>,
    shell: Shell,
    auth: AuthContext,
    lessons: LessonContext,
    cache: ProblemCache,
    settings: SessionSettings,
    clock: Clock,
    state: Mutex<ReviewState>,
    ticker: TimerSlot,
    auto_close: TimerSlot,
}

impl Drop for ReviewInner {
    fn drop(&mut self) {
        self.ticker.cancel();
        self.auto_close.cancel();
    }
}

/// Background probe for due reviews and the review overlay it opens.
///
/// Two timers run here: the polling ticker, re-armed with a fresh random
/// delay after every probe, and the one-shot auto-close after a correct
/// review answer. Polling only runs on the bare home view with a known user.
#[derive(Clone)]
pub struct ReviewScheduler {
    inner: Arc<ReviewInner>,
}

impl ReviewScheduler {
    #[must_use]
    pub fn new(
        api: Arc<dyn LearnApi>,
        shell: Shell,
        auth: AuthContext,
        lessons: LessonContext,
        cache: ProblemCache,
        settings: SessionSettings,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(ReviewInner {
                api,
                shell,
                auth,
                lessons,
                cache,
                settings,
                clock,
                state: Mutex::new(ReviewState::default()),
                ticker: TimerSlot::new("review-ticker"),
                auto_close: TimerSlot::new("review-auto-close"),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReviewState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.shell.mode().is_review()
    }

    /// Delay the pending polling tick was armed with, if polling is active.
    #[must_use]
    pub fn ticker_delay(&self) -> Option<std::time::Duration> {
        self.inner.ticker.pending_delay()
    }

    #[must_use]
    pub fn snapshot(&self) -> ReviewSnapshot {
        let open = self.is_open();
        let ticker_delay = self.ticker_delay();
        let auto_close_pending = self.inner.auto_close.is_pending();
        let state = self.state();
        ReviewSnapshot {
            open,
            problem: state.problem.clone(),
            answer: state.answer.clone(),
            revealed: state.revealed,
            checking: state.checking,
            feedback: state.feedback.clone(),
            ticker_delay,
            auto_close_pending,
        }
    }

    /// Start polling if the home view is bare and a user is known; stop it
    /// otherwise. A running ticker is left alone.
    pub fn maybe_start_polling(&self) {
        let eligible =
            self.inner.shell.mode().polling_allowed() && self.inner.auth.username().is_some();
        if !eligible {
            if self.inner.ticker.cancel() {
                tracing::debug!("review polling paused");
            }
            return;
        }
        if !self.inner.ticker.is_pending() {
            self.schedule_ticker();
        }
    }

    pub fn cancel_polling(&self) {
        self.inner.ticker.cancel();
    }

    fn schedule_ticker(&self) {
        let delay = self.inner.settings.random_review_delay();
        let weak = Arc::downgrade(&self.inner);
        self.inner.ticker.schedule(delay, move |ticket| async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let scheduler = ReviewScheduler { inner };
            let outcome = scheduler.check_due_and_maybe_open().await;
            tracing::debug!(?outcome, "review probe finished");
            // Opening a review or leaving home voids the ticket.
            if scheduler.inner.ticker.is_current(ticket) {
                scheduler.schedule_ticker();
            }
        });
        tracing::debug!(delay_ms = delay.as_millis(), "next review probe scheduled");
    }

    /// Probe the server for a due review and open it when one is owed.
    pub async fn check_due_and_maybe_open(&self) -> DueCheck {
        if !self.inner.shell.mode().allows_review() {
            return DueCheck::Blocked;
        }
        let Some(username) = self.inner.auth.username() else {
            return DueCheck::SignedOut;
        };
        let Some(due) = self.inner.api.fetch_next_review(&username).await else {
            return DueCheck::NothingScheduled;
        };
        if !due.is_due(self.inner.clock.now()) {
            return DueCheck::NotYetDue;
        }
        let Some(lesson_id) = self.resolve_lesson(Some(&due)) else {
            return DueCheck::NoLesson;
        };
        let problems = self.inner.cache.get_or_load(lesson_id).await;
        let Some(problem) = pick_random(&problems) else {
            return DueCheck::NoProblems(lesson_id);
        };
        let problem_id = problem.id;
        if self.open_review(problem) {
            tracing::info!(lesson = %lesson_id, problem = %problem_id, "due review opened");
            DueCheck::Opened(problem_id)
        } else {
            DueCheck::Blocked
        }
    }

    /// The due review's lesson, else the learner's active lesson, else the
    /// first lesson.
    fn resolve_lesson(&self, due: Option<&DueReview>) -> Option<LessonId> {
        due.and_then(|due| due.lesson_id)
            .or_else(|| self.inner.auth.user().and_then(|user| user.active_lesson))
            .or_else(|| self.inner.lessons.first_lesson_id())
    }

    /// Show `problem` in the review overlay. Returns `false` when login or the
    /// unlock proposal holds the screen.
    pub fn open_review(&self, problem: Problem) -> bool {
        if !self.inner.shell.try_transition(UiMode::with_review) {
            tracing::debug!(problem = %problem.id, "review refused by active overlay");
            return false;
        }
        self.inner.ticker.cancel();
        self.inner.auto_close.cancel();
        self.state().start(problem);
        true
    }

    /// Dismiss the overlay and resume polling.
    pub fn close_review(&self) {
        self.inner.auto_close.cancel();
        self.inner.shell.transition(UiMode::without_review);
        self.state().clear();
        self.maybe_start_polling();
    }

    /// Check `text` against the problem under review.
    ///
    /// Returns `None` when ignored: no review, a check already in flight, or
    /// the review was closed or reopened while the judge was answering.
    pub async fn submit_review_answer(&self, text: &str) -> Option<Feedback> {
        let (problem, session) = {
            let mut state = self.state();
            if state.checking {
                return None;
            }
            let problem = state.problem.clone()?;
            state.answer = text.to_string();
            if text.trim().is_empty() {
                let feedback = Feedback::negative(EMPTY_ANSWER);
                state.feedback = Some(feedback.clone());
                return Some(feedback);
            }
            state.checking = true;
            (problem, state.session)
        };
        self.inner.auto_close.cancel();

        let submitted = text.trim();
        let (result, feedback) = match self.inner.api.validate(problem.id, submitted).await {
            Ok(result) => {
                let feedback = if result.ok {
                    Feedback::positive("Correct!")
                } else {
                    Feedback::negative(
                        result
                            .error
                            .clone()
                            .filter(|error| !error.is_empty())
                            .unwrap_or_else(|| "Incorrect.".to_string()),
                    )
                };
                (result, feedback)
            }
            Err(err) => {
                tracing::warn!(problem = %problem.id, %err, "review validation failed");
                let message = err.user_message();
                let feedback = Feedback::negative(format!("Validation failed: {message}"));
                (ValidationResult::failed(message), feedback)
            }
        };

        record_in_background(
            Arc::clone(&self.inner.api),
            self.inner.auth.username(),
            problem.id,
            submitted.to_string(),
            result.clone(),
            Some(REVIEW_STAGE),
        );

        let still_open = self.is_open();
        let applied = {
            let mut state = self.state();
            if state.session == session && still_open {
                state.checking = false;
                state.feedback = Some(feedback.clone());
                true
            } else {
                false
            }
        };
        if !applied {
            tracing::debug!(problem = %problem.id, "review changed while checking; result dropped");
            return None;
        }
        if result.ok {
            self.schedule_auto_close();
        }
        Some(feedback)
    }

    fn schedule_auto_close(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .auto_close
            .schedule(self.inner.settings.review_auto_close, move |ticket| async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let scheduler = ReviewScheduler { inner };
                if scheduler.inner.auto_close.is_current(ticket) {
                    scheduler.close_review();
                }
            });
    }

    /// Disclose the canonical answer. The overlay stays open.
    pub fn reveal_review_answer(&self) -> Option<Feedback> {
        let mut state = self.state();
        let answer = state.problem.as_ref()?.display_answer().to_string();
        state.revealed = true;
        let feedback = Feedback::revealed_answer(&answer);
        state.feedback = Some(feedback.clone());
        Some(feedback)
    }

    /// Open a review right now, regardless of due time.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NoLessons` or `ReviewError::NoProblems` when there
    /// is nothing to review, and `ReviewError::OverlayActive` if the unlock
    /// proposal holds the screen.
    pub async fn trigger_manual_review(&self) -> Result<ManualReview, ReviewError> {
        let username = self.inner.auth.username();
        let Some(username) = username.filter(|_| !self.inner.shell.mode().is_login()) else {
            self.inner.auth.open_login();
            return Ok(ManualReview::LoginRequired);
        };

        let due = self.inner.api.fetch_next_review(&username).await;
        let lesson_id = self
            .resolve_lesson(due.as_ref())
            .ok_or(ReviewError::NoLessons)?;
        let problems = self.inner.cache.get_or_load(lesson_id).await;
        let problem = pick_random(&problems).ok_or(ReviewError::NoProblems(lesson_id))?;
        let problem_id = problem.id;
        if !self.open_review(problem) {
            return Err(ReviewError::OverlayActive);
        }
        tracing::info!(lesson = %lesson_id, problem = %problem_id, "manual review opened");
        Ok(ManualReview::Opened(problem_id))
    }

    /// Re-evaluate polling whenever the shell changes. The task ends once the
    /// scheduler is dropped.
    #[must_use]
    pub fn spawn_reactor(&self) -> JoinHandle<()> {
        let mut changes = self.inner.shell.subscribe();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    let scheduler = ReviewScheduler { inner };
                    if !scheduler.is_open() {
                        scheduler.inner.auto_close.cancel();
                    }
                    scheduler.maybe_start_polling();
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

fn pick_random(problems: &[Problem]) -> Option<Problem> {
    if problems.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..problems.len());
    problems.get(index).cloned()
}
