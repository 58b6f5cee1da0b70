use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use url::Url;

use lesson_core::model::{
    DueReview, Lesson, LessonId, Problem, ProblemId, User, ValidationResult,
};

use crate::client::{AttemptRecord, LearnApi};
use crate::error::ApiError;

/// Default base URL when none is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// JSON-over-HTTP client for the lessons service.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns `ApiError::InvalidBaseUrl` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), base_url)
    }

    /// # Errors
    ///
    /// Returns `ApiError::InvalidBaseUrl` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url.trim())
            .map_err(|err| ApiError::InvalidBaseUrl(format!("{base_url}: {err}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidBaseUrl(self.base.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
        action: &'static str,
    ) -> Result<Response, ApiError> {
        let response = self.client.post(url).json(body).send().await?;
        check_status(response, action).await
    }

    async fn get(&self, url: Url, action: &'static str) -> Result<Response, ApiError> {
        let response = self.client.get(url).send().await?;
        check_status(response, action).await
    }
}

async fn check_status(response: Response, action: &'static str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        action,
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    problem_id: ProblemId,
    submission: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
}

#[async_trait]
impl LearnApi for HttpApi {
    async fn list_lessons(&self) -> Result<Vec<Lesson>, ApiError> {
        let url = self.endpoint(&["lessons"])?;
        Ok(self.get(url, "list lessons").await?.json().await?)
    }

    async fn load_lesson(&self, id: LessonId) -> Result<Lesson, ApiError> {
        let url = self.endpoint(&["lessons", &id.to_string()])?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound("lesson"));
        }
        Ok(check_status(response, "load lesson").await?.json().await?)
    }

    async fn load_problems(&self, lesson_id: LessonId) -> Result<Vec<Problem>, ApiError> {
        let url = self.endpoint(&["lessons", &lesson_id.to_string(), "problems"])?;
        Ok(self.get(url, "load problems").await?.json().await?)
    }

    async fn validate(
        &self,
        problem_id: ProblemId,
        submission: &str,
    ) -> Result<ValidationResult, ApiError> {
        let url = self.endpoint(&["validate"])?;
        let body = ValidateRequest {
            problem_id,
            submission,
        };
        Ok(self.post_json(url, &body, "validate").await?.json().await?)
    }

    async fn record_attempt(
        &self,
        username: Option<&str>,
        problem_id: ProblemId,
        submitted_text: &str,
        result: &ValidationResult,
        stage: Option<&str>,
    ) -> Result<(), ApiError> {
        let Some(username) = username.filter(|name| !name.is_empty()) else {
            return Ok(());
        };
        let url = self.endpoint(&["attempts"])?;
        let record =
            AttemptRecord::from_validation(username, problem_id, submitted_text, result, stage);
        self.post_json(url, &record, "record attempt").await?;
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, ApiError> {
        let url = self.endpoint(&["users", "by-username", username])?;
        Ok(self.get(url, "load user").await?.json().await?)
    }

    async fn login_with_username(&self, username: &str) -> Result<User, ApiError> {
        let url = self.endpoint(&["login"])?;
        let body = LoginRequest { username };
        Ok(self.post_json(url, &body, "login").await?.json().await?)
    }

    async fn advance_user(&self, username: &str) -> Result<User, ApiError> {
        let url = self.endpoint(&["users", "by-username", username, "advance"])?;
        let response = self.client.post(url).send().await?;
        Ok(check_status(response, "advance").await?.json().await?)
    }

    async fn fetch_next_review(&self, username: &str) -> Option<DueReview> {
        let url = match self.endpoint(&["users", "by-username", username, "next-review"]) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(%err, "next-review url could not be built");
                return None;
            }
        };
        let response = match self.get(url, "next review").await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(%err, "next-review lookup failed");
                return None;
            }
        };
        // The endpoint answers `null` when nothing is scheduled.
        match response.json::<Option<DueReview>>().await {
            Ok(next) => next,
            Err(err) => {
                tracing::debug!(%err, "next-review payload could not be parsed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_base_path() {
        let api = HttpApi::new("http://localhost:8000/api/").unwrap();
        let url = api.endpoint(&["lessons", "3", "problems"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/lessons/3/problems");

        let api = HttpApi::new("http://localhost:8000/api").unwrap();
        let url = api.endpoint(&["validate"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/validate");
    }

    #[test]
    fn usernames_are_percent_encoded() {
        let api = HttpApi::new(DEFAULT_API_BASE).unwrap();
        let url = api
            .endpoint(&["users", "by-username", "ada lovelace/1", "advance"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/users/by-username/ada%20lovelace%2F1/advance"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(matches!(
            HttpApi::new("mailto:someone@example.com"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpApi::new("not a url"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn validate_request_uses_wire_names() {
        let body = ValidateRequest {
            problem_id: ProblemId::new(5),
            submission: "(+ 1 2)",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["problem_id"], 5);
        assert_eq!(json["submission"], "(+ 1 2)");
    }
}
