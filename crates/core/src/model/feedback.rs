use std::fmt;

/// Note appended to a revealed answer.
pub const REVEALED_NOTE: &str =
    "(This problem is marked as revealed and won't count toward your streak)";

/// Result line shown under a problem after a check or reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    ok: bool,
    message: String,
}

impl Feedback {
    #[must_use]
    pub fn positive(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn negative(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    /// Disclosure of the canonical answer, shown as a positive result.
    #[must_use]
    pub fn revealed_answer(answer: &str) -> Self {
        Self::positive(format!("Answer: {answer} - {REVEALED_NOTE}"))
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        self.ok
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.ok { "✅" } else { "❌" };
        write!(f, "{mark} {}", self.message)
    }
}
