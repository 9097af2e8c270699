//! Anthropic: API key, format-checked only.

use super::adapter::{
    AccountInfoSource, AdapterContext, ProviderAdapter, ProviderProfile, RefreshPolicy,
    RevokePolicy, ValidationCheck,
};
use super::ProviderKind;
use crate::auth::flow::{ApiKeyFlow, CredentialFlow, KeyFormat};
use crate::error::AuthError;

pub fn key_format() -> KeyFormat {
    KeyFormat::new(Some("sk-ant-"), 50)
}

pub(crate) fn adapter(ctx: &AdapterContext) -> Result<ProviderAdapter, AuthError> {
    let mut flow = ApiKeyFlow::new(ProviderKind::Anthropic.as_str())
        .with_format(key_format())
        .with_http_timeout(ctx.http_timeout)
        .with_prompt(ctx.interaction.prompt.clone());
    if let Some(key) = ctx.credential.as_deref() {
        flow = flow.with_api_key(key);
    }

    let profile = ProviderProfile {
        kind: ProviderKind::Anthropic,
        default_scopes: Vec::new(),
        refresh: RefreshPolicy::Revalidate,
        revoke: RevokePolicy::LocalOnly,
        validation: ValidationCheck::KeyFormat(key_format()),
        account_info: AccountInfoSource::None,
    };

    Ok(ProviderAdapter::new(
        profile,
        CredentialFlow::ApiKey(flow),
        ctx.http_timeout,
    ))
}
