use std::time::Duration;

use lesson_core::model::{Feedback, LessonId, Problem, ProblemId};

/// The single review session, if one is open.
#[derive(Debug, Default)]
pub(crate) struct ReviewState {
    pub problem: Option<Problem>,
    pub answer: String,
    pub revealed: bool,
    /// A validation is in flight; further submissions are ignored.
    pub checking: bool,
    pub feedback: Option<Feedback>,
    /// Bumped on every open and close; a check only lands in the session it
    /// started in.
    pub session: u64,
}

impl ReviewState {
    pub fn start(&mut self, problem: Problem) {
        *self = Self {
            problem: Some(problem),
            session: self.session.wrapping_add(1),
            ..Self::default()
        };
    }

    pub fn clear(&mut self) {
        *self = Self {
            session: self.session.wrapping_add(1),
            ..Self::default()
        };
    }
}

/// Presentation copy of the review overlay and its timers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSnapshot {
    pub open: bool,
    pub problem: Option<Problem>,
    pub answer: String,
    pub revealed: bool,
    pub checking: bool,
    pub feedback: Option<Feedback>,
    /// Delay the pending polling tick was armed with.
    pub ticker_delay: Option<Duration>,
    pub auto_close_pending: bool,
}

/// What a due-review probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueCheck {
    /// Login, the unlock proposal or another review is showing.
    Blocked,
    SignedOut,
    NothingScheduled,
    NotYetDue,
    NoLesson,
    NoProblems(LessonId),
    Opened(ProblemId),
}

/// Outcome of a user-invoked review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualReview {
    /// No identity; the login overlay was opened instead.
    LoginRequired,
    Opened(ProblemId),
}
