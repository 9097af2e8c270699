//! Poe: API key checked against its OpenAI-compatible model list.

use super::adapter::{
    AccountInfoSource, AdapterContext, ProviderAdapter, ProviderProfile, RefreshPolicy,
    RevokePolicy, ValidationCheck,
};
use super::ProviderKind;
use crate::auth::flow::{ApiKeyFlow, CredentialFlow, KeyFormat};
use crate::error::AuthError;

const API_ORIGIN: &str = "https://api.poe.com";
pub const MODELS_PATH: &str = "/openai/v1/models";

pub fn key_format() -> KeyFormat {
    KeyFormat::new(Some("sk-"), 20)
}

pub(crate) fn adapter(ctx: &AdapterContext) -> Result<ProviderAdapter, AuthError> {
    let models_url = ctx.endpoint(API_ORIGIN, MODELS_PATH);

    let mut flow = ApiKeyFlow::new(ProviderKind::Poe.as_str())
        .with_validation_endpoint(models_url.clone())
        .with_format(key_format())
        .with_format_fallback(true)
        .with_http_timeout(ctx.http_timeout)
        .with_prompt(ctx.interaction.prompt.clone());
    if let Some(key) = ctx.credential.as_deref() {
        flow = flow.with_api_key(key);
    }

    let profile = ProviderProfile {
        kind: ProviderKind::Poe,
        default_scopes: vec!["chat".to_string(), "models".to_string()],
        refresh: RefreshPolicy::Revalidate,
        revoke: RevokePolicy::LocalOnly,
        validation: ValidationCheck::BearerGet {
            url: models_url.clone(),
            fallback: Some(key_format()),
        },
        account_info: AccountInfoSource::ModelCatalog { url: models_url },
    };

    Ok(ProviderAdapter::new(
        profile,
        CredentialFlow::ApiKey(flow),
        ctx.http_timeout,
    ))
}
