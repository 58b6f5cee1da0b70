use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api::LearnApi;
use lesson_core::model::{Lesson, LessonId};
use lesson_core::navigation::{self, Navigation};
use lesson_core::View;

use crate::error::LessonError;
use crate::shell::Shell;

#[derive(Debug, Default)]
struct LessonState {
    lessons: Vec<Lesson>,
    index: Option<usize>,
    body: String,
    loading: bool,
    error: Option<String>,
}

/// Presentation copy of the lesson context.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSnapshot {
    pub lessons: Vec<Lesson>,
    pub index: Option<usize>,
    pub current: Option<Lesson>,
    pub body: String,
    pub loading: bool,
    pub error: Option<String>,
    pub view: View,
    pub navigation: Navigation,
}

/// Ordered lesson list, the selected lesson and the base view.
#[derive(Clone)]
pub struct LessonContext {
    api: Arc<dyn LearnApi>,
    shell: Shell,
    state: Arc<Mutex<LessonState>>,
}

impl LessonContext {
    #[must_use]
    pub fn new(api: Arc<dyn LearnApi>, shell: Shell) -> Self {
        Self {
            api,
            shell,
            state: Arc::new(Mutex::new(LessonState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, LessonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> LessonSnapshot {
        let user = self.shell.user();
        let state = self.state();
        LessonSnapshot {
            lessons: state.lessons.clone(),
            index: state.index,
            current: state.index.and_then(|i| state.lessons.get(i)).cloned(),
            body: state.body.clone(),
            loading: state.loading,
            error: state.error.clone(),
            view: self.shell.mode().view(),
            navigation: navigation::navigation(&state.lessons, state.index, user.as_ref()),
        }
    }

    #[must_use]
    pub fn lessons(&self) -> Vec<Lesson> {
        self.state().lessons.clone()
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.state().index
    }

    #[must_use]
    pub fn current_lesson(&self) -> Option<Lesson> {
        let state = self.state();
        state.index.and_then(|i| state.lessons.get(i)).cloned()
    }

    #[must_use]
    pub fn first_lesson_id(&self) -> Option<LessonId> {
        self.state().lessons.first().map(|lesson| lesson.id)
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.shell.mode().view()
    }

    pub fn go_home(&self) {
        self.shell.transition(|mode| mode.with_view(View::Home));
    }

    /// Switch the base view to practice for the selected lesson.
    pub fn start_lesson(&self) {
        self.shell.transition(|mode| mode.with_view(View::Practice));
    }

    #[must_use]
    pub fn has_access(&self, lesson_id: LessonId) -> bool {
        navigation::has_access(self.shell.user().as_ref(), lesson_id)
    }

    #[must_use]
    pub fn next_lesson_id(&self) -> Option<LessonId> {
        let state = self.state();
        navigation::next_lesson_id(&state.lessons, state.index)
    }

    #[must_use]
    pub fn at_first_lesson(&self) -> bool {
        let state = self.state();
        navigation::at_first_lesson(&state.lessons, state.index)
    }

    #[must_use]
    pub fn at_last_lesson(&self) -> bool {
        let state = self.state();
        navigation::at_last_lesson(&state.lessons, state.index)
    }

    #[must_use]
    pub fn has_multiple_lessons(&self) -> bool {
        self.state().lessons.len() > 1
    }

    #[must_use]
    pub fn navigation(&self) -> Navigation {
        let user = self.shell.user();
        let state = self.state();
        navigation::navigation(&state.lessons, state.index, user.as_ref())
    }

    /// Fetch the lesson list and annotate each lesson with its problem count
    /// and time estimate. A lesson whose problems fail to load gets the
    /// fallback estimate instead of failing the whole list.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Api` if the list itself cannot be fetched.
    pub async fn load_lessons_data(&self) -> Result<Vec<Lesson>, LessonError> {
        let mut lessons = match self.api.list_lessons().await {
            Ok(lessons) => lessons,
            Err(err) => {
                self.state().error = Some(format!("Failed to load lessons: {}", err.user_message()));
                return Err(err.into());
            }
        };

        for lesson in &mut lessons {
            match self.api.load_problems(lesson.id).await {
                Ok(problems) => lesson.set_problem_count(problems.len()),
                Err(err) => {
                    tracing::debug!(lesson = %lesson.id, %err, "problem count unavailable");
                    lesson.set_count_unavailable();
                }
            }
        }

        let mut state = self.state();
        let selected = state.index.and_then(|i| state.lessons.get(i)).map(|l| l.id);
        state.index = selected.and_then(|id| lessons.iter().position(|l| l.id == id));
        state.lessons = lessons.clone();
        state.error = None;
        Ok(lessons)
    }

    /// Fetch the lesson list and select the learner's active lesson, or the
    /// first one. Signed out, the list is kept and selection fails with
    /// `LessonError::Locked`.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::NoLessons` for an empty list, or the error from
    /// selecting the lesson.
    pub async fn bootstrap_lessons(&self) -> Result<LessonId, LessonError> {
        let lessons = self.api.list_lessons().await?;
        if lessons.is_empty() {
            self.state().error = Some(LessonError::NoLessons.to_string());
            return Err(LessonError::NoLessons);
        }

        let active = self.shell.user().and_then(|user| user.active_lesson);
        let index = active
            .and_then(|id| lessons.iter().position(|lesson| lesson.id == id))
            .unwrap_or(0);
        {
            let mut state = self.state();
            // Keep annotations from an earlier `load_lessons_data`.
            let annotated = std::mem::take(&mut state.lessons);
            state.lessons = lessons
                .into_iter()
                .map(|fresh| match annotated.iter().find(|old| old.id == fresh.id) {
                    Some(old) => Lesson {
                        problem_count: old.problem_count,
                        estimated_minutes: old.estimated_minutes,
                        ..fresh
                    },
                    None => fresh,
                })
                .collect();
        }
        self.set_lesson_by_index(index).await
    }

    /// # Errors
    ///
    /// Returns `LessonError::UnknownLesson` if the id is not in the list, or
    /// the error from `set_lesson_by_index`.
    pub async fn set_lesson_by_id(&self, lesson_id: LessonId) -> Result<LessonId, LessonError> {
        let index = self
            .state()
            .lessons
            .iter()
            .position(|lesson| lesson.id == lesson_id)
            .ok_or(LessonError::UnknownLesson(lesson_id))?;
        self.set_lesson_by_index(index).await
    }

    /// Select the lesson at `index` and load its body.
    ///
    /// Only lessons in the learner's unlocked set can be selected, so nothing
    /// is selectable while signed out. A locked lesson leaves the selection
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::OutOfRange`, `LessonError::Locked`, or the API
    /// error from loading the lesson.
    pub async fn set_lesson_by_index(&self, index: usize) -> Result<LessonId, LessonError> {
        let user = self.shell.user();
        let lesson_id = {
            let mut state = self.state();
            let lesson_id = state
                .lessons
                .get(index)
                .map(|lesson| lesson.id)
                .ok_or(LessonError::OutOfRange(index))?;
            if !navigation::has_access(user.as_ref(), lesson_id) {
                return Err(LessonError::Locked(lesson_id));
            }
            state.index = Some(index);
            state.body.clear();
            state.loading = true;
            state.error = None;
            lesson_id
        };

        let loaded = self.api.load_lesson(lesson_id).await;

        let mut state = self.state();
        let still_selected = state
            .index
            .and_then(|i| state.lessons.get(i))
            .is_some_and(|lesson| lesson.id == lesson_id);
        if !still_selected {
            tracing::debug!(lesson = %lesson_id, "lesson selection changed while loading");
            return Ok(lesson_id);
        }
        state.loading = false;
        match loaded {
            Ok(lesson) => {
                state.body = lesson.cleaned_body();
                if let Some(slot) = state.lessons.get_mut(index) {
                    slot.title = lesson.title;
                    slot.body_md = lesson.body_md;
                }
                tracing::info!(lesson = %lesson_id, "lesson selected");
                Ok(lesson_id)
            }
            Err(err) => {
                state.error = Some(err.user_message());
                Err(err.into())
            }
        }
    }

    /// Step back one lesson. `Ok(None)` when already at the first lesson.
    ///
    /// # Errors
    ///
    /// Returns the error from `set_lesson_by_index`.
    pub async fn previous_lesson(&self) -> Result<Option<LessonId>, LessonError> {
        let Some(index) = self.current_index().and_then(|i| i.checked_sub(1)) else {
            return Ok(None);
        };
        self.set_lesson_by_index(index).await.map(Some)
    }

    /// Step forward one lesson. `Ok(None)` when already at the last lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Locked` if the next lesson is not unlocked, or
    /// the error from `set_lesson_by_index`.
    pub async fn next_lesson(&self) -> Result<Option<LessonId>, LessonError> {
        let next = {
            let state = self.state();
            state
                .index
                .map(|i| i + 1)
                .filter(|next| *next < state.lessons.len())
        };
        let Some(index) = next else {
            return Ok(None);
        };
        self.set_lesson_by_index(index).await.map(Some)
    }
}
