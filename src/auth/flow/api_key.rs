use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info};

use super::oauth;
use crate::auth::interaction::{SecretPrompt, TerminalPrompt};
use crate::auth::token::{account_info_from_value, AccountInfo, TokenResponse};
use crate::config::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::error::AuthError;

/// Local shape check for an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormat {
    pub prefix: Option<String>,
    pub min_len: usize,
}

impl KeyFormat {
    pub fn new(prefix: Option<&str>, min_len: usize) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            min_len,
        }
    }

    /// Any key of at least ten characters.
    pub fn generic() -> Self {
        Self::new(None, 10)
    }

    pub fn check(&self, provider: &str, api_key: &str) -> Result<(), AuthError> {
        if let Some(prefix) = self.prefix.as_deref() {
            if !api_key.starts_with(prefix) {
                return Err(AuthError::InvalidCredential(format!(
                    "{provider} API key should start with '{prefix}'"
                )));
            }
        }
        if api_key.len() < self.min_len {
            return Err(AuthError::InvalidCredential(format!(
                "{provider} API key is too short"
            )));
        }
        Ok(())
    }
}

/// A key that passed validation.
#[derive(Debug, Clone)]
pub struct ApiKeyToken {
    pub api_key: String,
    pub provider: String,
    pub validated_at: DateTime<Utc>,
    pub account_info: AccountInfo,
}

impl From<ApiKeyToken> for TokenResponse {
    fn from(token: ApiKeyToken) -> Self {
        TokenResponse {
            access_token: token.api_key,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: None,
            scope: None,
            account_info: Some(token.account_info),
        }
    }
}

/// API-key "flow": obtain a key, then prove it works.
///
/// With a validation endpoint the key is sent as a bearer credential; without
/// one only [`KeyFormat`] is checked. When `format_fallback` is on, a
/// non-401 failure from the endpoint degrades to the format check.
#[derive(Clone)]
pub struct ApiKeyFlow {
    provider: String,
    validation_endpoint: Option<String>,
    format: KeyFormat,
    format_fallback: bool,
    api_key: Option<String>,
    client: reqwest::Client,
    prompt: Arc<dyn SecretPrompt>,
}

impl ApiKeyFlow {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            validation_endpoint: None,
            format: KeyFormat::generic(),
            format_fallback: false,
            api_key: None,
            client: oauth::http_client(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            prompt: Arc::new(TerminalPrompt),
        }
    }

    pub fn with_validation_endpoint(mut self, url: impl Into<String>) -> Self {
        self.validation_endpoint = Some(url.into());
        self
    }

    pub fn with_format(mut self, format: KeyFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_format_fallback(mut self, enabled: bool) -> Self {
        self.format_fallback = enabled;
        self
    }

    /// Key to use when the caller does not pass one.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.client = oauth::http_client(timeout);
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn SecretPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn format(&self) -> &KeyFormat {
        &self.format
    }

    pub async fn validate_api_key(&self, api_key: &str) -> Result<AccountInfo, AuthError> {
        let Some(endpoint) = self.validation_endpoint.as_deref() else {
            self.format.check(&self.provider, api_key)?;
            return Ok(format_valid());
        };

        let response = self.client.get(endpoint).bearer_auth(api_key).send().await?;
        let status = response.status();
        debug!(provider = %self.provider, status = status.as_u16(), "api key validation answered");

        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredential(format!(
                "{} rejected the API key",
                self.provider
            )));
        }
        if status != StatusCode::OK {
            if self.format_fallback {
                self.format.check(&self.provider, api_key)?;
                return Ok(format_valid());
            }
            return Err(AuthError::ValidationFailed {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let value = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
        Ok(match value {
            serde_json::Value::Null => AccountInfo::new(),
            other => account_info_from_value(other),
        })
    }

    /// Use `api_key`, else the configured key, else ask the user. Blank keys count as absent.
    pub async fn authenticate(&self, api_key: Option<&str>) -> Result<ApiKeyToken, AuthError> {
        let supplied = api_key.filter(|key| !key.trim().is_empty());
        let configured = self.api_key.as_deref().filter(|key| !key.trim().is_empty());
        let key = match supplied.or(configured) {
            Some(key) => key.trim().to_string(),
            None => self.ask_for_key().await?,
        };
        if key.is_empty() {
            return Err(AuthError::InvalidCredential(format!(
                "{} API key is required",
                self.provider
            )));
        }

        let account_info = self.validate_api_key(&key).await?;
        info!(provider = %self.provider, "api key accepted");
        Ok(ApiKeyToken {
            api_key: key,
            provider: self.provider.clone(),
            validated_at: Utc::now(),
            account_info,
        })
    }

    async fn ask_for_key(&self) -> Result<String, AuthError> {
        let prompt = Arc::clone(&self.prompt);
        let label = format!("{} API key", self.provider);
        let answer = tokio::task::spawn_blocking(move || prompt.prompt_secret(&label))
            .await
            .map_err(|err| AuthError::Prompt(err.to_string()))??;
        Ok(answer.trim().to_string())
    }
}

impl std::fmt::Debug for ApiKeyFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyFlow")
            .field("provider", &self.provider)
            .field("validation_endpoint", &self.validation_endpoint)
            .field("format", &self.format)
            .field("format_fallback", &self.format_fallback)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

fn format_valid() -> AccountInfo {
    account_info_from_value(json!({ "status": "format_valid" }))
}
