//! Credential acquisition, persistence, and the login facade.

pub mod callback;
pub mod flow;
pub mod interaction;
pub mod service;
pub mod store;
pub mod token;

pub use callback::{CallbackListener, CallbackResult};
pub use flow::{CredentialFlow, FlowInput};
pub use interaction::{BrowserOpener, FlowNotifier, Interaction, SecretPrompt};
pub use service::{AuthService, LoginOptions, ProviderStatus, TokenState};
pub use store::{FileTokenStore, TokenStore};
pub use token::{AccountInfo, AuthToken, TokenResponse};
