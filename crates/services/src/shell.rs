use std::sync::Arc;

use tokio::sync::watch;

use lesson_core::UiMode;
use lesson_core::model::User;

/// Observable UI-facing state shared by every engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellState {
    pub mode: UiMode,
    pub username: Option<String>,
    pub user: Option<User>,
}

/// Single owner of the UI mode and learner identity.
///
/// Every overlay decision goes through `try_transition`, so two entry points
/// cannot both claim the screen. Subscribers are woken only on real changes.
#[derive(Clone)]
pub struct Shell {
    tx: Arc<watch::Sender<ShellState>>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ShellState::default());
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ShellState> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ShellState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn mode(&self) -> UiMode {
        self.tx.borrow().mode
    }

    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.tx.borrow().username.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    /// Apply `next` to the current mode. Returns `false` when the transition
    /// is refused; a refusal or a no-op change notifies nobody.
    pub fn try_transition(&self, next: impl FnOnce(UiMode) -> Option<UiMode>) -> bool {
        let mut accepted = false;
        self.tx.send_if_modified(|state| {
            let Some(mode) = next(state.mode) else {
                return false;
            };
            accepted = true;
            if mode == state.mode {
                return false;
            }
            tracing::debug!(from = ?state.mode, to = ?mode, "ui mode changed");
            state.mode = mode;
            true
        });
        accepted
    }

    pub fn transition(&self, next: impl FnOnce(UiMode) -> UiMode) {
        self.try_transition(|mode| Some(next(mode)));
    }

    /// Replace the identity; a `None` user keeps `username` as given.
    pub fn set_identity(&self, username: Option<String>, user: Option<User>) {
        self.tx.send_if_modified(|state| {
            if state.username == username && state.user == user {
                return false;
            }
            state.username = username;
            state.user = user;
            true
        });
    }
}
