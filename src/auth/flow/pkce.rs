use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use super::oauth;
use crate::auth::callback::{CallbackListener, CallbackResult};
use crate::auth::interaction::Interaction;
use crate::auth::token::TokenResponse;
use crate::config::{DEFAULT_CALLBACK_PORT, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::error::AuthError;

/// Verifier/challenge pair for one authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    pub const METHOD: &'static str = "S256";

    pub fn generate() -> Self {
        Self::from_verifier(generate_code_verifier())
    }

    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = compute_code_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

/// 32 random bytes, base64url without padding (43 characters).
pub fn generate_code_verifier() -> String {
    let mut buf = [0u8; 32];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

pub fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// 16 random bytes, hex encoded.
pub fn generate_state() -> String {
    let mut buf = [0u8; 16];
    rand::rng().fill_bytes(&mut buf);
    hex_encode(&buf)
}

fn hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Secrets and URL for a single authorization attempt.
#[derive(Debug, Clone)]
pub struct PkceSession {
    pub challenge: PkceChallenge,
    pub state: String,
    pub redirect_uri: String,
    pub authorize_url: String,
}

impl PkceSession {
    /// Verify a captured redirect and hand back the authorization code.
    ///
    /// A missing or different `state` aborts before any token request.
    pub fn verify_callback(&self, result: CallbackResult) -> Result<String, AuthError> {
        match result {
            CallbackResult::Error { error, .. } if error == "access_denied" => {
                Err(AuthError::AuthorizationDenied)
            }
            CallbackResult::Error { error, description } => {
                Err(AuthError::AuthorizationFailed(match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                }))
            }
            CallbackResult::Code { code, state } => {
                if state.as_deref() != Some(self.state.as_str()) {
                    warn!("callback state did not match the authorization request");
                    return Err(AuthError::StateMismatch);
                }
                Ok(code)
            }
        }
    }
}

/// Authorization code grant with PKCE and a localhost redirect.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use ai_auth::auth::flow::PkceFlow;
///
/// # async fn run() -> Result<(), ai_auth::error::AuthError> {
/// let flow = PkceFlow::new(
///     "my-client.apps.googleusercontent.com",
///     "https://accounts.google.com/o/oauth2/v2/auth",
///     "https://oauth2.googleapis.com/token",
/// )
/// .with_scope("openid email");
/// let token = flow.authenticate(Duration::from_secs(300)).await?;
/// # let _ = token;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PkceFlow {
    provider: String,
    client_id: String,
    client_secret: Option<String>,
    authorize_url: String,
    token_url: String,
    scope: String,
    redirect_port: u16,
    client: reqwest::Client,
    interaction: Interaction,
}

impl PkceFlow {
    pub fn new(
        client_id: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: "pkce".to_string(),
            client_id: client_id.into(),
            client_secret: None,
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            scope: String::new(),
            redirect_port: DEFAULT_CALLBACK_PORT,
            client: oauth::http_client(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            interaction: Interaction::default(),
        }
    }

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

    /// Local port for the redirect listener; `0` picks a free one.
    pub fn with_redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = port;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.client = oauth::http_client(timeout);
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn redirect_port(&self) -> u16 {
        self.redirect_port
    }

    /// Fresh verifier, state, and authorization URL for `redirect_uri`.
    pub fn start_session(&self, redirect_uri: &str) -> Result<PkceSession, AuthError> {
        let challenge = PkceChallenge::generate();
        let state = generate_state();

        let mut url = Url::parse(&self.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge.code_challenge)
            .append_pair("code_challenge_method", PkceChallenge::METHOD)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(PkceSession {
            challenge,
            state,
            redirect_uri: redirect_uri.to_string(),
            authorize_url: url.into(),
        })
    }

    /// Trade the authorization code and verifier for tokens.
    pub async fn exchange_code(
        &self,
        session: &PkceSession,
        code: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", session.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", session.challenge.code_verifier.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }
        let (status, body) = oauth::post_form(&self.client, &self.token_url, &params).await?;
        debug!(provider = %self.provider, status = status.as_u16(), "code exchange answered");
        oauth::parse_token_body(status, &body)
    }

    /// Run the browser login and wait up to `timeout` for the redirect.
    ///
    /// The listener is bound before the browser opens and is shut down on every
    /// exit path. A port already held by another login fails with
    /// [`AuthError::PortInUse`].
    pub async fn authenticate(&self, timeout: Duration) -> Result<TokenResponse, AuthError> {
        let mut listener = CallbackListener::bind(self.redirect_port).await?;
        let session = self.start_session(&listener.redirect_uri())?;

        self.interaction
            .notifier
            .authorize_url(&self.provider, &session.authorize_url);
        if let Err(err) = self.interaction.browser.open(&session.authorize_url) {
            warn!(provider = %self.provider, error = %err, "could not open browser");
        }

        let waited = listener.wait(timeout).await;
        listener.shutdown().await;
        let code = session.verify_callback(waited?)?;

        info!(provider = %self.provider, "authorization code received");
        self.exchange_code(&session, &code).await
    }
}

impl std::fmt::Debug for PkceFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceFlow")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("redirect_port", &self.redirect_port)
            .finish_non_exhaustive()
    }
}
