use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use strum::IntoEnumIterator;
use tracing::{info, warn};

use super::flow::FlowInput;
use super::store::{FileTokenStore, TokenStore};
use super::token::AuthToken;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::provider::{ProviderKind, ProviderRegistry};

/// Options for [`AuthService::login`].
///
/// ```
/// use ai_auth::auth::LoginOptions;
///
/// let options = LoginOptions::builder().api_key("sk-example").force(true).build();
/// assert!(options.force);
/// ```
#[derive(Debug, Clone, Default, Builder)]
pub struct LoginOptions {
    /// API key for key-based providers; skips the prompt.
    #[builder(into)]
    pub api_key: Option<String>,
    /// OAuth client id overriding configuration.
    #[builder(into)]
    pub client_id: Option<String>,
    /// Log in again even if a valid token is stored.
    #[builder(default)]
    pub force: bool,
    /// Browser-login wait; defaults to the configured login timeout.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Expired,
    Absent,
}

/// One row of [`AuthService::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub kind: ProviderKind,
    pub state: TokenState,
    pub account: Option<String>,
    /// `None` for absent or non-expiring tokens.
    pub expires_in_days: Option<i64>,
}

/// Login facade: registry for adapters, store for persistence.
///
/// All console output belongs to the caller; this only returns typed results.
///
/// # Example
/// ```no_run
/// use ai_auth::auth::{AuthService, LoginOptions};
/// use ai_auth::config::AuthConfig;
///
/// # async fn run() -> Result<(), ai_auth::error::AuthError> {
/// let service = AuthService::from_config(AuthConfig::from_env());
/// let token = service.login("openai", &LoginOptions::default()).await?;
/// println!("{}", token.authorization_header());
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    registry: ProviderRegistry,
    store: Arc<dyn TokenStore>,
}

impl AuthService {
    pub fn new(registry: ProviderRegistry, store: Arc<dyn TokenStore>) -> Self {
        Self { registry, store }
    }

    /// File-backed store at the configured token path.
    pub fn from_config(config: AuthConfig) -> Self {
        let store = Arc::new(FileTokenStore::new(config.token_path()));
        Self::new(ProviderRegistry::new(config), store)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Return the stored token if still valid, otherwise run the provider's flow and save.
    pub async fn login(
        &self,
        provider: &str,
        options: &LoginOptions,
    ) -> Result<AuthToken, AuthError> {
        let kind = parse_kind(provider)?;
        if !options.force {
            if let Some(token) = self.store.get_valid_token(kind.as_str()) {
                info!(provider = kind.as_str(), "already logged in");
                return Ok(token);
            }
        }

        let credential = if kind.uses_api_key() {
            options.api_key.as_deref()
        } else {
            options.client_id.as_deref()
        };
        let adapter = self.registry.get_kind(kind, credential)?;
        let input = FlowInput {
            api_key: options.api_key.clone(),
            timeout: options
                .timeout
                .unwrap_or_else(|| self.registry.config().login_timeout()),
        };

        let token = adapter.login(&input).await?;
        self.store.save(&token)?;
        info!(provider = kind.as_str(), "login complete");
        Ok(token)
    }

    /// A usable token, refreshing an expired one when it carries a refresh token.
    ///
    /// A failed refresh is logged and reported as `None`.
    pub async fn get_valid_token(&self, provider: &str) -> Result<Option<AuthToken>, AuthError> {
        let kind = parse_kind(provider)?;
        let Some(token) = self.store.load(kind.as_str()) else {
            return Ok(None);
        };
        if !token.is_expired() {
            return Ok(Some(token));
        }
        if !token.has_refresh_token() {
            return Ok(None);
        }
        match self.refresh_token(kind, &token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(err @ AuthError::Storage(_)) => Err(err),
            Err(err) => {
                warn!(provider = kind.as_str(), error = %err, "automatic refresh failed");
                Ok(None)
            }
        }
    }

    pub async fn refresh(&self, provider: &str) -> Result<AuthToken, AuthError> {
        let kind = parse_kind(provider)?;
        let token = self
            .store
            .load(kind.as_str())
            .ok_or_else(|| AuthError::NotLoggedIn(kind.as_str().to_string()))?;
        self.refresh_token(kind, &token).await
    }

    /// Revoke (where supported) and forget the stored token.
    ///
    /// Returns `false` when nothing was stored. Revocation problems are logged;
    /// the local record is removed regardless.
    pub async fn logout(&self, provider: &str) -> Result<bool, AuthError> {
        let kind = parse_kind(provider)?;
        let Some(token) = self.store.load(kind.as_str()) else {
            return Ok(false);
        };

        match self.registry.get_kind(kind, issued_client(kind, &token)) {
            Ok(adapter) => match adapter.logout(&token).await {
                Ok(true) => {}
                Ok(false) => warn!(provider = kind.as_str(), "server did not confirm revocation"),
                Err(err) => warn!(provider = kind.as_str(), error = %err, "revocation failed"),
            },
            Err(err) => warn!(provider = kind.as_str(), error = %err, "no adapter for revocation"),
        }

        let deleted = self.store.delete(kind.as_str())?;
        info!(provider = kind.as_str(), "logged out");
        Ok(deleted)
    }

    /// Log out of every stored provider and drop all cached adapters.
    pub async fn logout_all(&self) -> Result<Vec<String>, AuthError> {
        let mut logged_out = Vec::new();
        for name in self.store.list_all() {
            match name.parse::<ProviderKind>() {
                Ok(_) => {
                    if self.logout(&name).await? {
                        logged_out.push(name);
                    }
                }
                Err(_) => {
                    if self.store.delete(&name)? {
                        logged_out.push(name);
                    }
                }
            }
        }
        self.registry.clear();
        Ok(logged_out)
    }

    /// Local view of every known provider; no network calls.
    pub fn status(&self) -> Vec<ProviderStatus> {
        ProviderKind::iter()
            .map(|kind| match self.store.load(kind.as_str()) {
                None => ProviderStatus {
                    kind,
                    state: TokenState::Absent,
                    account: None,
                    expires_in_days: None,
                },
                Some(token) => ProviderStatus {
                    kind,
                    state: if token.is_valid() {
                        TokenState::Active
                    } else {
                        TokenState::Expired
                    },
                    account: token.account_label(),
                    expires_in_days: token.expires_in_days(),
                },
            })
            .collect()
    }

    async fn refresh_token(
        &self,
        kind: ProviderKind,
        token: &AuthToken,
    ) -> Result<AuthToken, AuthError> {
        let adapter = self.registry.get_kind(kind, issued_client(kind, token))?;
        let refreshed = adapter.refresh(token).await?;
        self.store.save(&refreshed)?;
        Ok(refreshed)
    }
}

/// Client id recorded at login; API-key providers resolve their key from configuration.
fn issued_client(kind: ProviderKind, token: &AuthToken) -> Option<&str> {
    if kind.uses_api_key() {
        None
    } else {
        token.client_id.as_deref()
    }
}

fn parse_kind(provider: &str) -> Result<ProviderKind, AuthError> {
    provider
        .trim()
        .parse()
        .map_err(|_| AuthError::UnknownProvider(provider.to_string()))
}
