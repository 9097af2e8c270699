//! Provider catalogue: which service, which flow, which endpoints.

pub mod adapter;
#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "poe")]
pub mod poe;
pub mod registry;

pub use adapter::{
    AccountInfoSource, AdapterContext, ProviderAdapter, ProviderProfile, RefreshPolicy,
    RevokePolicy, ValidationCheck,
};
pub use registry::ProviderRegistry;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Supported external AI services.
///
/// Parsing is case-insensitive and accepts a few common aliases.
///
/// ```
/// use ai_auth::provider::ProviderKind;
///
/// assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
/// assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ProviderKind {
    #[strum(
        to_string = "openai",
        serialize = "chatgpt",
        serialize = "codex",
        serialize = "gpt"
    )]
    OpenAi,
    #[strum(to_string = "google", serialize = "gemini")]
    Google,
    #[strum(to_string = "poe")]
    Poe,
    #[strum(to_string = "anthropic", serialize = "claude")]
    Anthropic,
}

impl ProviderKind {
    /// Canonical key used in the token file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Poe => "poe",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI (ChatGPT)",
            Self::Google => "Google (Gemini)",
            Self::Poe => "Poe",
            Self::Anthropic => "Anthropic (Claude)",
        }
    }

    /// Whether the credential is a user-supplied API key rather than an OAuth client id.
    pub fn uses_api_key(&self) -> bool {
        matches!(self, Self::Poe | Self::Anthropic)
    }
}
