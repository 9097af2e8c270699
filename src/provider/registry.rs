//! Name → adapter resolution with a per-credential cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::adapter::{AdapterContext, ProviderAdapter};
use super::ProviderKind;
use crate::auth::interaction::Interaction;
use crate::config::AuthConfig;
use crate::error::AuthError;

type CacheKey = (ProviderKind, Option<String>);

/// Resolves provider names to adapters, one cached instance per
/// `(provider, credential)` pair.
///
/// The registry is an ordinary value owned by the caller; [`clear`](Self::clear)
/// drops every cached adapter (done on logout-all).
///
/// # Example
/// ```no_run
/// use ai_auth::config::AuthConfig;
/// use ai_auth::provider::ProviderRegistry;
///
/// let registry = ProviderRegistry::new(AuthConfig::from_env());
/// let poe = registry.get("poe", Some("sk-example-key-0123456789"))?;
/// assert_eq!(poe.name(), "poe");
/// # Ok::<(), ai_auth::error::AuthError>(())
/// ```
#[derive(Debug)]
pub struct ProviderRegistry {
    config: AuthConfig,
    interaction: Interaction,
    cache: Mutex<HashMap<CacheKey, Arc<ProviderAdapter>>>,
}

impl ProviderRegistry {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_interaction(config, Interaction::default())
    }

    pub fn with_interaction(config: AuthConfig, interaction: Interaction) -> Self {
        Self {
            config,
            interaction,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Adapter for `name`; `credential` (client id or API key) overrides configuration.
    pub fn get(
        &self,
        name: &str,
        credential: Option<&str>,
    ) -> Result<Arc<ProviderAdapter>, AuthError> {
        let kind: ProviderKind = name
            .trim()
            .parse()
            .map_err(|_| AuthError::UnknownProvider(name.to_string()))?;
        self.get_kind(kind, credential)
    }

    pub fn get_kind(
        &self,
        kind: ProviderKind,
        credential: Option<&str>,
    ) -> Result<Arc<ProviderAdapter>, AuthError> {
        let credential = credential
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.config.credential(kind))
            .map(str::to_string);
        let key = (kind, credential);

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| AuthError::Configuration("provider cache poisoned".to_string()))?;
        if let Some(adapter) = cache.get(&key) {
            return Ok(Arc::clone(adapter));
        }

        let ctx = AdapterContext {
            credential: key.1.clone(),
            client_secret: self.config.client_secret(kind).map(str::to_string),
            base_url: self.config.base_url(kind).map(str::to_string),
            interaction: self.interaction.clone(),
            http_timeout: self.config.http_timeout(),
            callback_port: self.config.callback_port(),
        };
        let adapter = Arc::new(build_adapter(kind, &ctx)?);
        debug!(provider = kind.as_str(), "adapter created");
        cache.insert(key, Arc::clone(&adapter));
        Ok(adapter)
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

fn build_adapter(kind: ProviderKind, ctx: &AdapterContext) -> Result<ProviderAdapter, AuthError> {
    match kind {
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => super::openai::adapter(ctx),
        #[cfg(feature = "google")]
        ProviderKind::Google => super::google::adapter(ctx),
        #[cfg(feature = "poe")]
        ProviderKind::Poe => super::poe::adapter(ctx),
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => super::anthropic::adapter(ctx),
        #[allow(unreachable_patterns)]
        other => {
            let _ = ctx;
            Err(AuthError::Configuration(format!(
                "support for {other} is not enabled in this build"
            )))
        }
    }
}
