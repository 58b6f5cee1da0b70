use std::sync::Arc;

use tokio::task::JoinHandle;

use api::{ApiError, HttpApi, LearnApi};
use lesson_core::model::LessonId;

use crate::Clock;
use crate::auth::{AuthContext, UsernameStore};
use crate::config::SessionSettings;
use crate::error::{LessonError, PracticeError};
use crate::lessons::LessonContext;
use crate::login::LoginHandler;
use crate::practice::PracticeEngine;
use crate::problem_cache::ProblemCache;
use crate::review::ReviewScheduler;
use crate::shell::Shell;

/// Assembles the contexts and engines around one API client.
#[derive(Clone)]
pub struct AppServices {
    api: Arc<dyn LearnApi>,
    shell: Shell,
    auth: AuthContext,
    lessons: LessonContext,
    login: LoginHandler,
    cache: ProblemCache,
    practice: PracticeEngine,
    review: ReviewScheduler,
}

impl AppServices {
    #[must_use]
    pub fn new(
        api: Arc<dyn LearnApi>,
        store: Arc<dyn UsernameStore>,
        settings: SessionSettings,
        clock: Clock,
    ) -> Self {
        let shell = Shell::new();
        let auth = AuthContext::new(shell.clone(), store);
        let lessons = LessonContext::new(Arc::clone(&api), shell.clone());
        let cache = ProblemCache::new(Arc::clone(&api));
        let login = LoginHandler::new(Arc::clone(&api), auth.clone(), lessons.clone());
        let practice = PracticeEngine::new(
            Arc::clone(&api),
            shell.clone(),
            auth.clone(),
            lessons.clone(),
            cache.clone(),
            settings.clone(),
        );
        let review = ReviewScheduler::new(
            Arc::clone(&api),
            shell.clone(),
            auth.clone(),
            lessons.clone(),
            cache.clone(),
            settings,
            clock,
        );

        Self {
            api,
            shell,
            auth,
            lessons,
            login,
            cache,
            practice,
            review,
        }
    }

    /// Build services backed by the HTTP lessons service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidBaseUrl` if `base_url` is not a usable http(s) URL.
    pub fn new_http(
        base_url: &str,
        store: Arc<dyn UsernameStore>,
        settings: SessionSettings,
        clock: Clock,
    ) -> Result<Self, ApiError> {
        let api = HttpApi::new(base_url)?;
        tracing::info!(base = %api.base_url(), "using lessons service");
        Ok(Self::new(Arc::new(api), store, settings, clock))
    }

    /// Restore the remembered user and load the catalog.
    ///
    /// Nothing here is fatal: without a usable identity the login overlay
    /// opens, and lesson failures are left on the lesson context for display.
    pub async fn bootstrap(&self) {
        match self.auth.load_local_user() {
            Some(username) => match self.auth.refresh_user(self.api.as_ref()).await {
                Ok(_) => tracing::info!(%username, "restored session"),
                Err(err) => {
                    tracing::warn!(%username, %err, "stored user could not be refreshed");
                    self.auth.open_login();
                }
            },
            None => self.auth.open_login(),
        }

        match self.lessons.bootstrap_lessons().await {
            Ok(_) => {}
            Err(LessonError::Locked(_)) if self.auth.user().is_none() => {
                tracing::debug!("no lesson selected until sign-in");
            }
            Err(err) => tracing::warn!(%err, "lesson bootstrap failed"),
        }
        if let Err(err) = self.lessons.load_lessons_data().await {
            tracing::warn!(%err, "lesson catalog could not be annotated");
        }
    }

    /// Select the lesson at `index` and enter practice on it.
    ///
    /// # Errors
    ///
    /// Returns the lesson selection error; problem loading failures are
    /// reported as `LessonError::Api`.
    pub async fn open_lesson(&self, index: usize) -> Result<LessonId, LessonError> {
        let lesson_id = self.lessons.set_lesson_by_index(index).await?;
        self.start_practice(lesson_id).await.map_err(|err| match err {
            PracticeError::LoadProblems { source, .. } => LessonError::Api(source),
        })?;
        Ok(lesson_id)
    }

    /// Enter practice on `lesson_id` with freshly loaded problems.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::LoadProblems` if the problems cannot be fetched;
    /// the view still switches so the failure can be shown.
    pub async fn start_practice(&self, lesson_id: LessonId) -> Result<usize, PracticeError> {
        self.lessons.start_lesson();
        self.practice.load_problems_for_lesson(lesson_id).await
    }

    /// Leave practice; the pending auto-advance is dropped.
    pub fn go_home(&self) {
        self.practice.clear_advance_timer();
        self.lessons.go_home();
    }

    /// Start the task that keeps review polling in step with the UI mode.
    #[must_use]
    pub fn spawn_reactor(&self) -> JoinHandle<()> {
        self.review.spawn_reactor()
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn LearnApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn shell(&self) -> Shell {
        self.shell.clone()
    }

    #[must_use]
    pub fn auth(&self) -> AuthContext {
        self.auth.clone()
    }

    #[must_use]
    pub fn lessons(&self) -> LessonContext {
        self.lessons.clone()
    }

    #[must_use]
    pub fn login(&self) -> LoginHandler {
        self.login.clone()
    }

    #[must_use]
    pub fn problem_cache(&self) -> ProblemCache {
        self.cache.clone()
    }

    #[must_use]
    pub fn practice(&self) -> PracticeEngine {
        self.practice.clone()
    }

    #[must_use]
    pub fn review(&self) -> ReviewScheduler {
        self.review.clone()
    }
}
