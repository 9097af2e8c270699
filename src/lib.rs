//! ai-auth: credential acquisition for external AI services.
//!
//! Three ways to get a credential sit behind one [`CredentialFlow`](auth::CredentialFlow):
//! the OAuth device grant (OpenAI), authorization code + PKCE with a localhost
//! redirect (Google), and validated API keys (Poe, Anthropic). Tokens persist in
//! a single owner-only JSON file.
//!
//! # Quick Start
//!
//! ```no_run
//! use ai_auth::prelude::*;
//!
//! # async fn example() -> ai_auth::error::Result<()> {
//! let service = AuthService::from_config(AuthConfig::from_env());
//! let token = service.login("google", &LoginOptions::default()).await?;
//! println!("logged in as {:?}", token.account_label());
//!
//! if let Some(token) = service.get_valid_token("google").await? {
//!     println!("{}", token.authorization_header());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;

#[cfg(feature = "cli")]
pub mod cli;
