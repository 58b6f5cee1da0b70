//! Errors surfaced by the lessons API boundary.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid API base url: {0}")]
    InvalidBaseUrl(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Non-success response; `body` is the server's text, possibly empty.
    #[error("{action} failed ({status}): {}", body_or_unknown(.body))]
    Status {
        action: &'static str,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

fn body_or_unknown(body: &str) -> &str {
    let body = body.trim();
    if body.is_empty() { "unknown" } else { body }
}

impl ApiError {
    /// Message suitable for showing to the learner: the server's own text when
    /// it sent one, otherwise the full error description.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { body, .. } if !body.trim().is_empty() => body.trim().to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_falls_back_to_unknown() {
        let err = ApiError::Status {
            action: "validate",
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "validate failed (502): unknown");
        assert_eq!(err.user_message(), "validate failed (502): unknown");
    }

    #[test]
    fn user_message_prefers_server_text() {
        let err = ApiError::Status {
            action: "login",
            status: 409,
            body: "Username taken\n".into(),
        };
        assert_eq!(err.user_message(), "Username taken");
    }
}
