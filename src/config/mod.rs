//! Configuration (layered: explicit setters > environment > built-in defaults).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::provider::ProviderKind;

/// Default local port for the PKCE redirect listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;
/// Default time a PKCE login waits for the browser redirect.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;
/// Default timeout applied to every outbound HTTP request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const TOKEN_FILE_REL_PATH: &str = ".claude/ai-tokens.json";

/// Configuration for provider credentials, endpoints, and timeouts.
///
/// Explicit arguments passed to [`ProviderRegistry::get`](crate::provider::ProviderRegistry::get)
/// still win over anything stored here.
///
/// # Example
/// ```no_run
/// use ai_auth::config::AuthConfig;
/// use ai_auth::provider::ProviderKind;
///
/// let config = AuthConfig::from_env()
///     .with_client_id(ProviderKind::Google, "my-client.apps.googleusercontent.com");
/// assert!(config.client_id(ProviderKind::Google).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct AuthConfig {
    client_ids: HashMap<ProviderKind, String>,
    client_secrets: HashMap<ProviderKind, String>,
    api_keys: HashMap<ProviderKind, String>,
    base_urls: HashMap<ProviderKind, String>,
    token_path: Option<PathBuf>,
    callback_port: u16,
    login_timeout: Duration,
    http_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    /// Create an empty config with built-in defaults.
    pub fn new() -> Self {
        Self {
            client_ids: HashMap::new(),
            client_secrets: HashMap::new(),
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
            token_path: None,
            callback_port: DEFAULT_CALLBACK_PORT,
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Load from environment variables (after reading `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let client_id_mappings = [
            ("OPENAI_CLIENT_ID", ProviderKind::OpenAi),
            ("GOOGLE_CLIENT_ID", ProviderKind::Google),
        ];
        for (env_var, kind) in client_id_mappings {
            if let Some(value) = get(env_var) {
                config.set_client_id(kind, value);
            }
        }

        let secret_mappings = [
            ("OPENAI_CLIENT_SECRET", ProviderKind::OpenAi),
            ("GOOGLE_CLIENT_SECRET", ProviderKind::Google),
        ];
        for (env_var, kind) in secret_mappings {
            if let Some(value) = get(env_var) {
                config.set_client_secret(kind, value);
            }
        }

        let key_mappings = [
            ("POE_API_KEY", ProviderKind::Poe),
            ("ANTHROPIC_API_KEY", ProviderKind::Anthropic),
        ];
        for (env_var, kind) in key_mappings {
            if let Some(value) = get(env_var) {
                config.set_api_key(kind, value);
            }
        }

        if let Some(path) = get("AI_AUTH_TOKEN_PATH") {
            config.token_path = Some(PathBuf::from(path));
        }
        if let Some(port) = get("AI_AUTH_CALLBACK_PORT").and_then(|v| v.trim().parse().ok()) {
            config.callback_port = port;
        }
        if let Some(secs) = get("AI_AUTH_HTTP_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            config.http_timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn set_client_id(&mut self, kind: ProviderKind, value: impl Into<String>) {
        self.client_ids.insert(kind, value.into());
    }

    pub fn set_client_secret(&mut self, kind: ProviderKind, value: impl Into<String>) {
        self.client_secrets.insert(kind, value.into());
    }

    pub fn set_api_key(&mut self, kind: ProviderKind, value: impl Into<String>) {
        self.api_keys.insert(kind, value.into());
    }

    /// Point a provider's endpoints at a different origin (tests, proxies).
    pub fn set_base_url(&mut self, kind: ProviderKind, url: impl Into<String>) {
        self.base_urls.insert(kind, url.into());
    }

    pub fn with_client_id(mut self, kind: ProviderKind, value: impl Into<String>) -> Self {
        self.set_client_id(kind, value);
        self
    }

    pub fn with_client_secret(mut self, kind: ProviderKind, value: impl Into<String>) -> Self {
        self.set_client_secret(kind, value);
        self
    }

    pub fn with_api_key(mut self, kind: ProviderKind, value: impl Into<String>) -> Self {
        self.set_api_key(kind, value);
        self
    }

    pub fn with_base_url(mut self, kind: ProviderKind, url: impl Into<String>) -> Self {
        self.set_base_url(kind, url);
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn client_id(&self, kind: ProviderKind) -> Option<&str> {
        self.client_ids.get(&kind).map(String::as_str)
    }

    pub fn client_secret(&self, kind: ProviderKind) -> Option<&str> {
        self.client_secrets.get(&kind).map(String::as_str)
    }

    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        self.api_keys.get(&kind).map(String::as_str)
    }

    pub fn base_url(&self, kind: ProviderKind) -> Option<&str> {
        self.base_urls.get(&kind).map(String::as_str)
    }

    /// The credential the registry keys adapters by: a client id for OAuth
    /// providers, an API key for key-based ones.
    pub fn credential(&self, kind: ProviderKind) -> Option<&str> {
        if kind.uses_api_key() {
            self.api_key(kind)
        } else {
            self.client_id(kind)
        }
    }

    /// Token file location (`~/.claude/ai-tokens.json` unless overridden).
    pub fn token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(default_token_path)
    }

    pub fn callback_port(&self) -> u16 {
        self.callback_port
    }

    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

/// Default token file path (`<home>/.claude/ai-tokens.json`).
pub fn default_token_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(TOKEN_FILE_REL_PATH))
        .unwrap_or_else(|| PathBuf::from(TOKEN_FILE_REL_PATH))
}
