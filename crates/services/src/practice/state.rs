use std::collections::HashSet;

use lesson_core::model::{Feedback, LessonId, Problem, ProblemId};

/// Mutable state of one practice run through a lesson's problems.
#[derive(Debug, Default)]
pub(crate) struct PracticeState {
    pub lesson_id: Option<LessonId>,
    pub problems: Vec<Problem>,
    pub index: usize,
    pub streak: u32,
    pub answer: String,
    pub feedback: Option<Feedback>,
    pub reveal_requested: bool,
    /// Problems whose answer was disclosed; they never count toward the streak.
    pub revealed: HashSet<ProblemId>,
    pub loading_next: bool,
}

impl PracticeState {
    pub fn current(&self) -> Option<&Problem> {
        self.problems.get(self.index)
    }

    pub fn current_id(&self) -> Option<ProblemId> {
        self.current().map(|problem| problem.id)
    }

    pub fn is_current_revealed(&self) -> bool {
        self.current_id()
            .is_some_and(|id| self.revealed.contains(&id))
    }

    /// Install a fresh problem list. Revealed markers survive only a reload
    /// of the same lesson.
    pub fn replace_problems(&mut self, lesson_id: LessonId, problems: Vec<Problem>) {
        if self.lesson_id != Some(lesson_id) {
            self.revealed.clear();
        }
        self.lesson_id = Some(lesson_id);
        self.problems = problems;
        self.index = 0;
        self.streak = 0;
        self.reset_problem_ui();
    }

    /// Move to the next problem, wrapping to the first.
    pub fn step(&mut self) {
        if !self.problems.is_empty() {
            self.index = (self.index + 1) % self.problems.len();
        }
        self.reset_problem_ui();
    }

    pub fn reset_problem_ui(&mut self) {
        self.answer.clear();
        self.feedback = None;
        self.reveal_requested = false;
        self.loading_next = false;
    }
}

/// Presentation copy of the practice session.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSnapshot {
    pub lesson_id: Option<LessonId>,
    pub problem: Option<Problem>,
    pub index: usize,
    pub total: usize,
    pub streak: u32,
    pub answer: String,
    pub feedback: Option<Feedback>,
    pub reveal_requested: bool,
    pub is_revealed: bool,
    pub loading_next: bool,
    pub unlock_proposed: bool,
    pub advance_pending: bool,
}
