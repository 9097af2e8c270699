//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthService, AuthToken, FileTokenStore, LoginOptions, ProviderStatus, TokenState, TokenStore,
};
pub use crate::config::AuthConfig;
pub use crate::error::{AuthError, ErrorKind, Result};
pub use crate::provider::{ProviderKind, ProviderRegistry};
