//! One external service bound to one credential flow.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ProviderKind;
use crate::auth::flow::oauth;
use crate::auth::flow::{CredentialFlow, FlowInput, KeyFormat};
use crate::auth::interaction::Interaction;
use crate::auth::token::{account_info_from_value, AccountInfo, AuthToken};
use crate::error::AuthError;

/// How an expired credential is renewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// `grant_type=refresh_token` against the token endpoint.
    OAuth {
        token_url: String,
        client_id: String,
        client_secret: Option<String>,
    },
    /// API keys do not rotate; re-validate and keep the same record.
    Revalidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokePolicy {
    /// Nothing to tell the server; forgetting the token locally is enough.
    LocalOnly,
    /// POST `token=<access_token>` to this endpoint.
    Endpoint { url: String },
}

/// The one network check `validate` performs after the expiry check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationCheck {
    /// GET with the token as a bearer credential; 200 means valid.
    /// With a fallback format, transport errors degrade to the format check.
    BearerGet {
        url: String,
        fallback: Option<KeyFormat>,
    },
    /// GET `url?access_token=<token>`; 200 means valid.
    TokenInfo { url: String },
    /// No endpoint; only the key's shape is checked.
    KeyFormat(KeyFormat),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountInfoSource {
    None,
    /// GET with bearer auth, body used as-is.
    BearerJson { url: String },
    /// GET a model list with bearer auth and summarize it.
    ModelCatalog { url: String },
}

/// Everything provider-specific, expressed as data.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    pub default_scopes: Vec<String>,
    pub refresh: RefreshPolicy,
    pub revoke: RevokePolicy,
    pub validation: ValidationCheck,
    pub account_info: AccountInfoSource,
}

/// Inputs the provider builders need, resolved by the registry.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// Client id for OAuth providers, API key for key-based ones.
    pub credential: Option<String>,
    pub client_secret: Option<String>,
    /// Replaces the origin of every endpoint (tests, proxies).
    pub base_url: Option<String>,
    pub interaction: Interaction,
    pub http_timeout: Duration,
    pub callback_port: u16,
}

impl AdapterContext {
    /// `default_origin` + `path`, or `base_url` + `path` when overridden.
    pub fn endpoint(&self, default_origin: &str, path: &str) -> String {
        let origin = self.base_url.as_deref().unwrap_or(default_origin);
        format!("{}{}", origin.trim_end_matches('/'), path)
    }
}

/// A provider's login, refresh, logout, validation, and account lookup.
///
/// Only one login runs per adapter at a time; a second concurrent call fails
/// with [`AuthError::FlowInProgress`] instead of queuing behind the first.
#[derive(Debug)]
pub struct ProviderAdapter {
    profile: ProviderProfile,
    flow: CredentialFlow,
    client: reqwest::Client,
    login_guard: Mutex<()>,
}

impl ProviderAdapter {
    pub fn new(profile: ProviderProfile, flow: CredentialFlow, http_timeout: Duration) -> Self {
        Self {
            profile,
            flow,
            client: oauth::http_client(http_timeout),
            login_guard: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.profile.kind
    }

    pub fn name(&self) -> &'static str {
        self.profile.kind.as_str()
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn flow(&self) -> &CredentialFlow {
        &self.flow
    }

    /// Run the bound flow and turn its result into a storable token.
    pub async fn login(&self, input: &FlowInput) -> Result<AuthToken, AuthError> {
        let _guard = self
            .login_guard
            .try_lock()
            .map_err(|_| AuthError::FlowInProgress(self.name().to_string()))?;

        info!(provider = self.name(), flow = self.flow.name(), "starting login");
        let response = self.flow.authenticate(input).await?;
        let mut token = response.into_token(self.name(), &self.profile.default_scopes);
        token.client_id = self.flow.client_id().map(str::to_string);

        // The account endpoint's view supersedes whatever validation returned.
        if let Some(info) = self.get_account_info(&token).await {
            token.account_info = Some(info);
        }
        Ok(token)
    }

    pub async fn refresh(&self, token: &AuthToken) -> Result<AuthToken, AuthError> {
        match &self.profile.refresh {
            RefreshPolicy::Revalidate => {
                self.revalidate_key(&token.access_token).await?;
                debug!(provider = self.name(), "api key still accepted");
                Ok(token.clone())
            }
            RefreshPolicy::OAuth {
                token_url,
                client_id,
                client_secret,
            } => {
                let refresh_token = token
                    .refresh_token
                    .as_deref()
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| AuthError::MissingRefreshToken(self.name().to_string()))?;

                let response = oauth::refresh_grant(
                    &self.client,
                    token_url,
                    client_id,
                    client_secret.as_deref(),
                    refresh_token,
                )
                .await?;

                let previous_scopes: Vec<String> = token.scopes.iter().cloned().collect();
                let mut refreshed = response.into_token(self.name(), &previous_scopes);
                if refreshed.refresh_token.is_none() {
                    refreshed.refresh_token = token.refresh_token.clone();
                }
                refreshed.account_info = token.account_info.clone();
                refreshed.client_id = Some(client_id.clone());
                info!(provider = self.name(), "token refreshed");
                Ok(refreshed)
            }
        }
    }

    /// Revoke remotely where supported. `Ok(false)` means the server refused.
    pub async fn logout(&self, token: &AuthToken) -> Result<bool, AuthError> {
        match &self.profile.revoke {
            RevokePolicy::LocalOnly => Ok(true),
            RevokePolicy::Endpoint { url } => {
                let response = self
                    .client
                    .post(url)
                    .form(&[("token", token.access_token.as_str())])
                    .send()
                    .await?;
                let revoked = response.status() == StatusCode::OK;
                debug!(provider = self.name(), status = response.status().as_u16(), "revocation answered");
                Ok(revoked)
            }
        }
    }

    /// Expiry first; only an unexpired token costs a network round trip.
    pub async fn validate(&self, token: &AuthToken) -> Result<bool, AuthError> {
        if token.is_expired() {
            return Ok(false);
        }
        match &self.profile.validation {
            ValidationCheck::KeyFormat(format) => {
                Ok(format.check(self.name(), &token.access_token).is_ok())
            }
            ValidationCheck::TokenInfo { url } => {
                let response = self
                    .client
                    .get(url)
                    .query(&[("access_token", token.access_token.as_str())])
                    .send()
                    .await?;
                Ok(response.status() == StatusCode::OK)
            }
            ValidationCheck::BearerGet { url, fallback } => {
                match self
                    .client
                    .get(url)
                    .bearer_auth(&token.access_token)
                    .send()
                    .await
                {
                    Ok(response) => Ok(response.status() == StatusCode::OK),
                    Err(err) => match fallback {
                        Some(format) => {
                            warn!(provider = self.name(), error = %err, "validation request failed; checking key format");
                            Ok(format.check(self.name(), &token.access_token).is_ok())
                        }
                        None => Err(err.into()),
                    },
                }
            }
        }
    }

    /// Identity metadata, or `None` when unsupported or unavailable.
    pub async fn get_account_info(&self, token: &AuthToken) -> Option<AccountInfo> {
        let (url, summarize) = match &self.profile.account_info {
            AccountInfoSource::None => return None,
            AccountInfoSource::BearerJson { url } => (url, false),
            AccountInfoSource::ModelCatalog { url } => (url, true),
        };

        let response = match self
            .client
            .get(url)
            .bearer_auth(&token.access_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(provider = self.name(), error = %err, "account info request failed");
                return None;
            }
        };
        if response.status() != StatusCode::OK {
            debug!(provider = self.name(), status = response.status().as_u16(), "account info unavailable");
            return None;
        }
        let body: Value = response.json().await.ok()?;
        Some(if summarize {
            summarize_model_catalog(&body)
        } else {
            account_info_from_value(body)
        })
    }

    async fn revalidate_key(&self, api_key: &str) -> Result<(), AuthError> {
        match &self.flow {
            CredentialFlow::ApiKey(flow) => flow.validate_api_key(api_key).await.map(|_| ()),
            _ => Err(AuthError::Configuration(format!(
                "{} cannot re-validate a non API key credential",
                self.name()
            ))),
        }
    }
}

fn summarize_model_catalog(body: &Value) -> AccountInfo {
    let available = body
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    account_info_from_value(json!({
        "status": "active",
        "available_models": available,
        "subscription": "Poe API",
    }))
}
