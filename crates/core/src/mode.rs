//! The single presentation mode every entry point consults.
//!
//! Login, the lesson-unlock proposal and the review overlay are mutually
//! exclusive, so they are variants of one enum rather than independent flags.

/// Base screen underneath any overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Practice,
}

/// Current presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    #[default]
    Home,
    Practice,
    /// Login overlay; `resume` is restored when it closes.
    Login { resume: View },
    /// Lesson-unlock proposal over the practice view.
    UnlockModal,
    /// Review overlay; `resume` is restored when it closes.
    Review { resume: View },
}

impl UiMode {
    #[must_use]
    pub fn from_view(view: View) -> Self {
        match view {
            View::Home => UiMode::Home,
            View::Practice => UiMode::Practice,
        }
    }

    /// Screen shown underneath the active overlay, if any.
    #[must_use]
    pub fn view(self) -> View {
        match self {
            UiMode::Home => View::Home,
            UiMode::Practice | UiMode::UnlockModal => View::Practice,
            UiMode::Login { resume } | UiMode::Review { resume } => resume,
        }
    }

    #[must_use]
    pub fn is_login(self) -> bool {
        matches!(self, UiMode::Login { .. })
    }

    #[must_use]
    pub fn is_unlock_modal(self) -> bool {
        matches!(self, UiMode::UnlockModal)
    }

    #[must_use]
    pub fn is_review(self) -> bool {
        matches!(self, UiMode::Review { .. })
    }

    #[must_use]
    pub fn has_overlay(self) -> bool {
        !matches!(self, UiMode::Home | UiMode::Practice)
    }

    /// A new review may only appear over a bare view.
    #[must_use]
    pub fn allows_review(self) -> bool {
        !self.has_overlay()
    }

    /// Timed auto-advance must not move the practice flow behind these overlays.
    #[must_use]
    pub fn suppresses_auto_advance(self) -> bool {
        self.is_login() || self.is_unlock_modal()
    }

    /// Background review polling only runs on the bare home view.
    #[must_use]
    pub fn polling_allowed(self) -> bool {
        matches!(self, UiMode::Home)
    }

    // ─── TRANSITIONS ───────────────────────────────────────────────────────────

    /// Login takes precedence over every other overlay.
    #[must_use]
    pub fn with_login(self) -> Self {
        match self {
            UiMode::Login { .. } => self,
            other => UiMode::Login {
                resume: other.view(),
            },
        }
    }

    #[must_use]
    pub fn without_login(self) -> Self {
        match self {
            UiMode::Login { resume } => UiMode::from_view(resume),
            other => other,
        }
    }

    /// `None` when the proposal cannot be shown (login or review is up).
    #[must_use]
    pub fn with_unlock_modal(self) -> Option<Self> {
        match self {
            UiMode::Home | UiMode::Practice | UiMode::UnlockModal => Some(UiMode::UnlockModal),
            UiMode::Login { .. } | UiMode::Review { .. } => None,
        }
    }

    #[must_use]
    pub fn without_unlock_modal(self) -> Self {
        match self {
            UiMode::UnlockModal => UiMode::Practice,
            other => other,
        }
    }

    /// `None` when login or the unlock proposal is showing. An open review
    /// stays open so its problem can be replaced.
    #[must_use]
    pub fn with_review(self) -> Option<Self> {
        match self {
            UiMode::Home | UiMode::Practice => Some(UiMode::Review {
                resume: self.view(),
            }),
            UiMode::Review { .. } => Some(self),
            UiMode::Login { .. } | UiMode::UnlockModal => None,
        }
    }

    #[must_use]
    pub fn without_review(self) -> Self {
        match self {
            UiMode::Review { resume } => UiMode::from_view(resume),
            other => other,
        }
    }

    /// Switch the underlying screen. Overlays that carry a resume target keep
    /// showing; the unlock proposal belongs to practice and is dropped when
    /// leaving it.
    #[must_use]
    pub fn with_view(self, view: View) -> Self {
        match self {
            UiMode::Home | UiMode::Practice => UiMode::from_view(view),
            UiMode::UnlockModal => match view {
                View::Home => UiMode::Home,
                View::Practice => UiMode::UnlockModal,
            },
            UiMode::Login { .. } => UiMode::Login { resume: view },
            UiMode::Review { .. } => UiMode::Review { resume: view },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_resumes_previous_view() {
        let mode = UiMode::Practice.with_login();
        assert_eq!(
            mode,
            UiMode::Login {
                resume: View::Practice
            }
        );
        assert_eq!(mode.without_login(), UiMode::Practice);
    }

    #[test]
    fn review_is_refused_behind_login_and_unlock() {
        assert_eq!(UiMode::Home.with_login().with_review(), None);
        assert_eq!(UiMode::UnlockModal.with_review(), None);
        assert_eq!(
            UiMode::Home.with_review(),
            Some(UiMode::Review { resume: View::Home })
        );
    }

    #[test]
    fn unlock_modal_cannot_cover_review() {
        let review = UiMode::Review { resume: View::Home };
        assert_eq!(review.with_unlock_modal(), None);
        assert_eq!(UiMode::Practice.with_unlock_modal(), Some(UiMode::UnlockModal));
        assert_eq!(UiMode::UnlockModal.without_unlock_modal(), UiMode::Practice);
    }

    #[test]
    fn only_bare_home_allows_polling() {
        assert!(UiMode::Home.polling_allowed());
        assert!(!UiMode::Practice.polling_allowed());
        assert!(!UiMode::Home.with_login().polling_allowed());
        assert!(!UiMode::Review { resume: View::Home }.polling_allowed());
    }

    #[test]
    fn leaving_practice_drops_unlock_proposal() {
        assert_eq!(UiMode::UnlockModal.with_view(View::Home), UiMode::Home);
        assert_eq!(
            UiMode::Home.with_login().with_view(View::Practice),
            UiMode::Login {
                resume: View::Practice
            }
        );
    }

    #[test]
    fn auto_advance_suppressed_only_by_login_and_unlock() {
        assert!(UiMode::UnlockModal.suppresses_auto_advance());
        assert!(UiMode::Practice.with_login().suppresses_auto_advance());
        assert!(!UiMode::Review { resume: View::Practice }.suppresses_auto_advance());
        assert!(!UiMode::Practice.suppresses_auto_advance());
    }
}
