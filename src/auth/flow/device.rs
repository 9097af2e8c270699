use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::oauth::{self, TokenEndpointBody};
use crate::auth::interaction::{ConsoleNotifier, FlowNotifier};
use crate::auth::token::TokenResponse;
use crate::config::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::error::AuthError;

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

const DEFAULT_DEVICE_CODE_LIFETIME_SECS: u64 = 1800;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Upper bound on how long polling may run when the server's lifetime does not fit the clock.
const MAX_POLL_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// Interval increase mandated for every `slow_down` answer.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Answer from the device authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default = "default_lifetime", deserialize_with = "lenient_or_lifetime")]
    pub expires_in: u64,
    #[serde(default = "default_interval", deserialize_with = "lenient_or_interval")]
    pub interval: u64,
}

/// Classification of one token-endpoint poll.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCodePoll {
    Pending,
    SlowDown,
    Authorized { token: TokenResponse },
    AccessDenied,
    Expired,
}

/// RFC 8628 device authorization grant.
///
/// # Example
/// ```no_run
/// use ai_auth::auth::flow::DeviceFlow;
///
/// # async fn run() -> Result<(), ai_auth::error::AuthError> {
/// let flow = DeviceFlow::new(
///     "codex-cli",
///     "https://auth.openai.com/oauth/device/code",
///     "https://auth.openai.com/oauth/token",
/// )
/// .with_scope("chat models");
/// let token = flow.authenticate().await?;
/// println!("expires in {:?}s", token.expires_in);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeviceFlow {
    provider: String,
    client_id: String,
    client_secret: Option<String>,
    device_code_url: String,
    token_url: String,
    scope: String,
    slow_down_increment: Duration,
    client: reqwest::Client,
    notifier: Arc<dyn FlowNotifier>,
}

impl DeviceFlow {
    pub fn new(
        client_id: impl Into<String>,
        device_code_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: "device".to_string(),
            client_id: client_id.into(),
            client_secret: None,
            device_code_url: device_code_url.into(),
            token_url: token_url.into(),
            scope: "chat".to_string(),
            slow_down_increment: SLOW_DOWN_INCREMENT,
            client: oauth::http_client(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            notifier: Arc::new(ConsoleNotifier),
        }
    }

    /// Provider name used in logs and notifications.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.client = oauth::http_client(timeout);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn FlowNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Override the `slow_down` step; only tests should need this.
    pub fn with_slow_down_increment(mut self, increment: Duration) -> Self {
        self.slow_down_increment = increment;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse, AuthError> {
        let (status, body) = oauth::post_form(
            &self.client,
            &self.device_code_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ],
        )
        .await?;
        if !status.is_success() {
            let detail = TokenEndpointBody::parse(&body)
                .error_detail()
                .unwrap_or_else(|| format!("status {status}: {}", oauth::truncate(&body, 200)));
            return Err(AuthError::Token(format!("device code request failed: {detail}")));
        }
        let response: DeviceCodeResponse = serde_json::from_str(&body)?;
        debug!(
            provider = %self.provider,
            expires_in = response.expires_in,
            interval_secs = response.interval,
            "device code issued"
        );
        Ok(response)
    }

    /// Poll the token endpoint once and classify the answer.
    pub async fn poll_once(&self, device_code: &str) -> Result<DeviceCodePoll, AuthError> {
        let mut params = vec![
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ("device_code", device_code),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }
        let (status, body) = oauth::post_form(&self.client, &self.token_url, &params).await?;
        let parsed = TokenEndpointBody::parse(&body);

        match parsed.error.as_deref() {
            Some("authorization_pending") => return Ok(DeviceCodePoll::Pending),
            Some("slow_down") => return Ok(DeviceCodePoll::SlowDown),
            Some("expired_token") => return Ok(DeviceCodePoll::Expired),
            Some("access_denied") => return Ok(DeviceCodePoll::AccessDenied),
            Some(_) => {
                return Err(AuthError::Token(
                    parsed.error_detail().unwrap_or_default(),
                ))
            }
            None => {}
        }

        if status.is_success() {
            if let Some(token) = parsed.into_token_response() {
                return Ok(DeviceCodePoll::Authorized { token });
            }
        }
        Err(AuthError::Token(format!(
            "unexpected device token answer (status {status}): {}",
            oauth::truncate(&body, 200)
        )))
    }

    /// Poll until the user authorizes, declines, or `expires_in` elapses.
    ///
    /// The deadline is measured from the start of polling and holds even if
    /// the server never reports `expired_token`.
    pub async fn poll_for_token(
        &self,
        device_code: &str,
        interval: Duration,
        expires_in: Duration,
    ) -> Result<TokenResponse, AuthError> {
        // Server-supplied lifetimes can be absurd; never let them overflow the clock.
        let deadline = Instant::now()
            .checked_add(expires_in)
            .unwrap_or_else(|| Instant::now() + MAX_POLL_WINDOW);
        let mut interval = interval;

        loop {
            if Instant::now() >= deadline {
                return Err(AuthError::AuthorizationExpired(format!(
                    "device code for {} expired after {}s",
                    self.provider,
                    expires_in.as_secs()
                )));
            }

            match self.poll_once(device_code).await? {
                DeviceCodePoll::Authorized { token } => {
                    info!(provider = %self.provider, "device authorization granted");
                    return Ok(token);
                }
                DeviceCodePoll::Pending => {}
                DeviceCodePoll::SlowDown => {
                    interval = interval.saturating_add(self.slow_down_increment);
                    debug!(
                        provider = %self.provider,
                        interval_ms = interval.as_millis() as u64,
                        "server asked to slow down"
                    );
                    self.notifier.slow_down(&self.provider, interval);
                }
                DeviceCodePoll::AccessDenied => return Err(AuthError::AuthorizationDenied),
                DeviceCodePoll::Expired => {
                    return Err(AuthError::AuthorizationExpired(
                        "device code expired".to_string(),
                    ))
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }

    /// Full flow: request a code, show it, poll for the token.
    pub async fn authenticate(&self) -> Result<TokenResponse, AuthError> {
        let response = self.request_device_code().await?;
        self.notifier.device_code(&self.provider, &response);
        self.poll_for_token(
            &response.device_code,
            Duration::from_secs(response.interval),
            Duration::from_secs(response.expires_in),
        )
        .await
    }
}

impl std::fmt::Debug for DeviceFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFlow")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("device_code_url", &self.device_code_url)
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

fn default_lifetime() -> u64 {
    DEFAULT_DEVICE_CODE_LIFETIME_SECS
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn lenient_or_lifetime<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(oauth::lenient_u64(deserializer)?.unwrap_or(DEFAULT_DEVICE_CODE_LIFETIME_SECS))
}

fn lenient_or_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(oauth::lenient_u64(deserializer)?.unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_code_response_applies_defaults() {
        let response: DeviceCodeResponse = serde_json::from_str(
            r#"{"device_code": "dc", "user_code": "ABCD-EFGH", "verification_uri": "https://example.com/device"}"#,
        )
        .unwrap();
        assert_eq!(response.expires_in, 1800);
        assert_eq!(response.interval, 5);
        assert_eq!(response.verification_uri_complete, None);
    }

    #[test]
    fn device_code_response_accepts_string_numbers() {
        let response: DeviceCodeResponse = serde_json::from_str(
            r#"{"device_code": "dc", "user_code": "U", "verification_uri": "https://x", "expires_in": "600", "interval": 3}"#,
        )
        .unwrap();
        assert_eq!(response.expires_in, 600);
        assert_eq!(response.interval, 3);
    }
}
