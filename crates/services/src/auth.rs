use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api::{ApiError, LearnApi};
use lesson_core::UiMode;
use lesson_core::model::User;

use crate::shell::Shell;

/// Local persistence of the last signed-in username.
pub trait UsernameStore: Send + Sync {
    fn load(&self) -> Option<String>;

    /// # Errors
    ///
    /// Returns the underlying I/O error if the username cannot be written.
    fn save(&self, username: &str) -> io::Result<()>;

    /// # Errors
    ///
    /// Returns the underlying I/O error if the stored username cannot be removed.
    fn clear(&self) -> io::Result<()>;
}

/// Volatile `UsernameStore` for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryUsernameStore {
    value: Mutex<Option<String>>,
}

impl MemoryUsernameStore {
    #[must_use]
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(username.into())),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UsernameStore for MemoryUsernameStore {
    fn load(&self) -> Option<String> {
        self.slot().clone()
    }

    fn save(&self, username: &str) -> io::Result<()> {
        *self.slot() = Some(username.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LoginForm {
    input: String,
    error: Option<String>,
}

/// Current identity plus the login overlay's form state.
#[derive(Clone)]
pub struct AuthContext {
    shell: Shell,
    store: Arc<dyn UsernameStore>,
    form: Arc<Mutex<LoginForm>>,
}

impl AuthContext {
    #[must_use]
    pub fn new(shell: Shell, store: Arc<dyn UsernameStore>) -> Self {
        Self {
            shell,
            store,
            form: Arc::new(Mutex::new(LoginForm::default())),
        }
    }

    fn form(&self) -> MutexGuard<'_, LoginForm> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.shell.username()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.shell.user()
    }

    #[must_use]
    pub fn show_login(&self) -> bool {
        self.shell.mode().is_login()
    }

    /// Adopt `user` as the signed-in learner and remember the username.
    pub fn set_user(&self, user: User) {
        if let Err(err) = self.store.save(&user.username) {
            tracing::warn!(%err, "failed to persist username");
        }
        tracing::info!(username = %user.username, "signed in");
        self.shell
            .set_identity(Some(user.username.clone()), Some(user));
    }

    /// Restore the remembered username without a server round-trip.
    pub fn load_local_user(&self) -> Option<String> {
        let username = self
            .store
            .load()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())?;
        self.shell.set_identity(Some(username.clone()), None);
        Some(username)
    }

    /// Re-fetch the learner record for the current username.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` when no username is set, or the lookup error.
    pub async fn refresh_user(&self, api: &dyn LearnApi) -> Result<User, ApiError> {
        let username = self.username().ok_or(ApiError::NotFound("user"))?;
        let user = api.get_user_by_username(&username).await?;
        self.shell.set_identity(Some(username), Some(user.clone()));
        Ok(user)
    }

    /// Forget the identity. Unless `silent`, the login overlay opens.
    pub fn logout(&self, silent: bool) {
        if let Err(err) = self.store.clear() {
            tracing::warn!(%err, "failed to clear stored username");
        }
        self.shell.set_identity(None, None);
        tracing::info!("signed out");
        if !silent {
            self.open_login();
        }
    }

    /// Show the login overlay with the form pre-filled from the current username.
    pub fn open_login(&self) {
        {
            let mut form = self.form();
            form.input = self.username().unwrap_or_default();
            form.error = None;
        }
        self.shell.transition(UiMode::with_login);
    }

    pub fn close_login(&self) {
        self.form().error = None;
        self.shell.transition(UiMode::without_login);
    }

    #[must_use]
    pub fn login_input(&self) -> String {
        self.form().input.clone()
    }

    pub fn set_login_input(&self, input: impl Into<String>) {
        self.form().input = input.into();
    }

    #[must_use]
    pub fn login_error(&self) -> Option<String> {
        self.form().error.clone()
    }

    pub fn set_login_error(&self, error: Option<String>) {
        self.form().error = error;
    }
}
