//! Credential flows: device grant, PKCE with a local redirect, and API keys.

pub mod api_key;
pub mod device;
pub mod oauth;
pub mod pkce;

use std::time::Duration;

pub use api_key::{ApiKeyFlow, ApiKeyToken, KeyFormat};
pub use device::{DeviceCodePoll, DeviceCodeResponse, DeviceFlow, DEVICE_CODE_GRANT_TYPE};
pub use pkce::{PkceChallenge, PkceFlow, PkceSession};

use crate::auth::token::TokenResponse;
use crate::config::DEFAULT_LOGIN_TIMEOUT_SECS;
use crate::error::AuthError;

/// Per-login inputs a flow may use.
#[derive(Debug, Clone)]
pub struct FlowInput {
    /// API key supplied by the caller (API-key flows only).
    pub api_key: Option<String>,
    /// How long a browser login waits for its redirect.
    pub timeout: Duration,
}

impl Default for FlowInput {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
        }
    }
}

/// The closed set of ways to obtain a credential.
#[derive(Debug, Clone)]
pub enum CredentialFlow {
    Device(DeviceFlow),
    Pkce(PkceFlow),
    ApiKey(ApiKeyFlow),
}

impl CredentialFlow {
    pub async fn authenticate(&self, input: &FlowInput) -> Result<TokenResponse, AuthError> {
        match self {
            Self::Device(flow) => flow.authenticate().await,
            Self::Pkce(flow) => flow.authenticate(input.timeout).await,
            Self::ApiKey(flow) => Ok(flow.authenticate(input.api_key.as_deref()).await?.into()),
        }
    }

    /// The OAuth client this flow authenticates as; `None` for API keys.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Device(flow) => Some(flow.client_id()),
            Self::Pkce(flow) => Some(flow.client_id()),
            Self::ApiKey(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Device(_) => "device",
            Self::Pkce(_) => "pkce",
            Self::ApiKey(_) => "api_key",
        }
    }
}
