//! OpenAI: device authorization grant against `auth.openai.com`.

use super::adapter::{
    AccountInfoSource, AdapterContext, ProviderAdapter, ProviderProfile, RefreshPolicy,
    RevokePolicy, ValidationCheck,
};
use super::ProviderKind;
use crate::auth::flow::{CredentialFlow, DeviceFlow};
use crate::error::AuthError;

pub const DEFAULT_CLIENT_ID: &str = "codex-cli";
pub const SCOPE: &str = "chat models";

const AUTH_ORIGIN: &str = "https://auth.openai.com";
const API_ORIGIN: &str = "https://api.openai.com";

pub const DEVICE_CODE_PATH: &str = "/oauth/device/code";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const MODELS_PATH: &str = "/v1/models";
pub const ACCOUNT_PATH: &str = "/v1/me";

pub(crate) fn adapter(ctx: &AdapterContext) -> Result<ProviderAdapter, AuthError> {
    let client_id = ctx
        .credential
        .clone()
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
    let token_url = ctx.endpoint(AUTH_ORIGIN, TOKEN_PATH);

    let mut flow = DeviceFlow::new(
        client_id.clone(),
        ctx.endpoint(AUTH_ORIGIN, DEVICE_CODE_PATH),
        token_url.clone(),
    )
    .with_provider(ProviderKind::OpenAi.as_str())
    .with_scope(SCOPE)
    .with_http_timeout(ctx.http_timeout)
    .with_notifier(ctx.interaction.notifier.clone());
    if let Some(secret) = ctx.client_secret.as_deref() {
        flow = flow.with_client_secret(secret);
    }

    let profile = ProviderProfile {
        kind: ProviderKind::OpenAi,
        default_scopes: SCOPE.split_whitespace().map(str::to_string).collect(),
        refresh: RefreshPolicy::OAuth {
            token_url,
            client_id,
            client_secret: ctx.client_secret.clone(),
        },
        // No public revocation endpoint.
        revoke: RevokePolicy::LocalOnly,
        validation: ValidationCheck::BearerGet {
            url: ctx.endpoint(API_ORIGIN, MODELS_PATH),
            fallback: None,
        },
        account_info: AccountInfoSource::BearerJson {
            url: ctx.endpoint(API_ORIGIN, ACCOUNT_PATH),
        },
    };

    Ok(ProviderAdapter::new(
        profile,
        CredentialFlow::Device(flow),
        ctx.http_timeout,
    ))
}
