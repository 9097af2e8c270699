//! Error types for credential acquisition.

use thiserror::Error;

/// Primary error type for every login, refresh, validation, and storage operation.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The device code or the PKCE wait window ran out before the user finished.
    #[error("Authorization expired: {0}")]
    AuthorizationExpired(String),

    #[error("Authorization denied by the user")]
    AuthorizationDenied,

    /// The authorization server redirected back with an error.
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("OAuth state mismatch (possible CSRF attack); token exchange aborted")]
    StateMismatch,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Credential validation failed with status {status}")]
    ValidationFailed { status: u16 },

    #[error("No refresh token stored for {0}")]
    MissingRefreshToken(String),

    /// Non-success answer from an OAuth endpoint, carrying the raw server detail.
    #[error("Token endpoint error: {0}")]
    Token(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Callback port {port} is already in use; is another login still running?")]
    PortInUse { port: u16 },

    #[error("A login flow is already running for {0}")]
    FlowInProgress(String),

    #[error("Not logged in to {0}")]
    NotLoggedIn(String),

    #[error("Prompt error: {0}")]
    Prompt(String),
}

/// Broad error kind, one per failure class callers are expected to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthorizationExpired,
    AuthorizationDenied,
    StateMismatch,
    InvalidCredential,
    MissingRefreshToken,
    NetworkOrProtocol,
    Storage,
    Configuration,
    Conflict,
    Cancelled,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    LoginAgain,
    CheckCredentials,
    CheckConfiguration,
    RetryLater,
    WaitForRunningLogin,
    None,
}

impl AuthError {
    /// Classify this error into an [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthorizationExpired(_) => ErrorKind::AuthorizationExpired,
            Self::AuthorizationDenied => ErrorKind::AuthorizationDenied,
            Self::StateMismatch => ErrorKind::StateMismatch,
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::MissingRefreshToken(_) | Self::NotLoggedIn(_) => ErrorKind::MissingRefreshToken,
            Self::AuthorizationFailed(_)
            | Self::ValidationFailed { .. }
            | Self::Token(_)
            | Self::Network(_)
            | Self::Serialization(_) => ErrorKind::NetworkOrProtocol,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Configuration(_) | Self::UnknownProvider(_) => ErrorKind::Configuration,
            Self::PortInUse { .. } | Self::FlowInProgress(_) => ErrorKind::Conflict,
            Self::Prompt(_) => ErrorKind::Cancelled,
        }
    }

    /// Whether repeating the same call later could plausibly succeed.
    ///
    /// Nothing in this crate retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::ValidationFailed { .. }
                | Self::PortInUse { .. }
                | Self::FlowInProgress(_)
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.kind() {
            ErrorKind::AuthorizationExpired
            | ErrorKind::AuthorizationDenied
            | ErrorKind::StateMismatch
            | ErrorKind::MissingRefreshToken => RecoverySuggestion::LoginAgain,
            ErrorKind::InvalidCredential => RecoverySuggestion::CheckCredentials,
            ErrorKind::Configuration | ErrorKind::Storage => RecoverySuggestion::CheckConfiguration,
            ErrorKind::NetworkOrProtocol => RecoverySuggestion::RetryLater,
            ErrorKind::Conflict => RecoverySuggestion::WaitForRunningLogin,
            ErrorKind::Cancelled => RecoverySuggestion::None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        Self::Configuration(format!("invalid URL: {error}"))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;
