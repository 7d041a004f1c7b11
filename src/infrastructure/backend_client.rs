use crate::domain::models::{Goal, SessionLog, StreakData, WeeklyReflection};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const ANALYZE_LOG_FUNCTION: &str = "analyze-log";
const GENERATE_REFLECTION_FUNCTION: &str = "generate-weekly-reflection";
const SEND_REFLECTION_EMAIL_FUNCTION: &str = "send-reflection-email";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerateReflectionRequest {
    pub user_id: String,
    pub date: String,
    pub logs: Vec<SessionLog>,
    pub goals: Vec<Goal>,
    pub streak: StreakData,
}

/// Hosted backend surface: edge functions for AI analysis and notification,
/// plus the authenticated-user lookup.
#[async_trait]
pub trait InsightsBackendClient: Send + Sync {
    async fn analyze_log(
        &self,
        access_token: &str,
        log_content: &str,
    ) -> Result<String, InfraError>;

    async fn generate_reflection(
        &self,
        access_token: &str,
        request: &GenerateReflectionRequest,
    ) -> Result<WeeklyReflection, InfraError>;

    async fn current_user_email(&self, access_token: &str) -> Result<Option<String>, InfraError>;

    async fn send_reflection_email(
        &self,
        access_token: &str,
        reflection: &WeeklyReflection,
        email: &str,
    ) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestInsightsBackendClient {
    client: Client,
    base_url: Url,
}

impl ReqwestInsightsBackendClient {
    pub fn new(base_url: &str) -> Result<Self, InfraError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::Backend(format!("invalid backend base url: {error}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Backend(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn backend_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("backend error: http {}", status.as_u16())
        } else {
            format!("backend error: http {}; body={body}", status.as_u16())
        };
        InfraError::Backend(message)
    }

    fn function_endpoint(&self, function_name: &str) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Backend("backend base URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push("functions");
            segments.push("v1");
            segments.push(function_name);
        }
        Ok(url)
    }

    fn user_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Backend("backend base URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push("auth");
            segments.push("v1");
            segments.push("user");
        }
        Ok(url)
    }

    async fn post_function(
        &self,
        access_token: &str,
        function_name: &str,
        payload: &serde_json::Value,
    ) -> Result<String, InfraError> {
        let endpoint = self.function_endpoint(function_name)?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
            .map_err(|error| {
                InfraError::Backend(format!("network error while calling {function_name}: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Backend(format!("failed reading {function_name} response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::backend_http_error(status, &body));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeLogResponse {
    analysis: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    email: Option<String>,
}

#[async_trait]
impl InsightsBackendClient for ReqwestInsightsBackendClient {
    async fn analyze_log(
        &self,
        access_token: &str,
        log_content: &str,
    ) -> Result<String, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(log_content, "log content")?;

        let payload = serde_json::json!({ "logContent": log_content });
        let body = self
            .post_function(access_token, ANALYZE_LOG_FUNCTION, &payload)
            .await?;

        let parsed: AnalyzeLogResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Backend(format!("invalid analyze-log payload: {error}; body={body}"))
        })?;
        parsed
            .analysis
            .map(|value| value.trim_start().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::Backend("analyze-log response did not include analysis".to_string())
            })
    }

    async fn generate_reflection(
        &self,
        access_token: &str,
        request: &GenerateReflectionRequest,
    ) -> Result<WeeklyReflection, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(&request.user_id, "user id")?;

        let payload = serde_json::to_value(request)?;
        let body = self
            .post_function(access_token, GENERATE_REFLECTION_FUNCTION, &payload)
            .await?;

        let reflection: WeeklyReflection = serde_json::from_str(&body).map_err(|error| {
            InfraError::Backend(format!(
                "invalid generate-reflection payload: {error}; body={body}"
            ))
        })?;
        reflection
            .validate()
            .map_err(|message| InfraError::Backend(format!("invalid reflection: {message}")))?;
        Ok(reflection)
    }

    async fn current_user_email(&self, access_token: &str) -> Result<Option<String>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.user_endpoint()?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::Backend(format!("network error while fetching user: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Backend(format!("failed reading user response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::backend_http_error(status, &body));
        }

        let parsed: UserResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Backend(format!("invalid user payload: {error}; body={body}"))
        })?;
        Ok(parsed
            .email
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    async fn send_reflection_email(
        &self,
        access_token: &str,
        reflection: &WeeklyReflection,
        email: &str,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(email, "email")?;

        let payload = serde_json::json!({
            "reflection": reflection,
            "email": email,
        });
        let _ = self
            .post_function(access_token, SEND_REFLECTION_EMAIL_FUNCTION, &payload)
            .await?;
        Ok(())
    }
}
