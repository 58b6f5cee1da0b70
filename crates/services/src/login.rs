use std::sync::Arc;

use api::LearnApi;
use lesson_core::model::User;

use crate::auth::AuthContext;
use crate::error::LoginError;
use crate::lessons::LessonContext;

/// Submits the login form and brings the lesson context up for the new user.
#[derive(Clone)]
pub struct LoginHandler {
    api: Arc<dyn LearnApi>,
    auth: AuthContext,
    lessons: LessonContext,
}

impl LoginHandler {
    #[must_use]
    pub fn new(api: Arc<dyn LearnApi>, auth: AuthContext, lessons: LessonContext) -> Self {
        Self { api, auth, lessons }
    }

    /// Sign in as `input` (trimmed). Failures are also stored as the form's
    /// error so the overlay can show them.
    ///
    /// # Errors
    ///
    /// Returns `LoginError::EmptyUsername`, the API error, or the lesson error
    /// raised while selecting the user's lesson.
    pub async fn login_with_username(&self, input: &str) -> Result<User, LoginError> {
        let result = self.login(input.trim()).await;
        if let Err(err) = &result {
            tracing::warn!(%err, "login failed");
            self.auth.set_login_error(Some(err.to_string()));
        }
        result
    }

    /// Sign in with whatever is currently typed into the login form.
    ///
    /// # Errors
    ///
    /// Same as `login_with_username`.
    pub async fn submit_login_form(&self) -> Result<User, LoginError> {
        let input = self.auth.login_input();
        self.login_with_username(&input).await
    }

    async fn login(&self, username: &str) -> Result<User, LoginError> {
        if username.is_empty() {
            return Err(LoginError::EmptyUsername);
        }
        self.auth.set_login_error(None);
        let user = self.api.login_with_username(username).await?;
        self.auth.set_user(user.clone());
        self.auth.close_login();
        self.lessons.bootstrap_lessons().await?;
        Ok(user)
    }
}
