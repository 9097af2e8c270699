//! Google (Gemini): authorization code + PKCE with a localhost redirect.

use super::adapter::{
    AccountInfoSource, AdapterContext, ProviderAdapter, ProviderProfile, RefreshPolicy,
    RevokePolicy, ValidationCheck,
};
use super::ProviderKind;
use crate::auth::flow::{CredentialFlow, PkceFlow};
use crate::error::AuthError;

pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/generative-language.retriever",
    "openid",
    "email",
];

const ACCOUNTS_ORIGIN: &str = "https://accounts.google.com";
const OAUTH_ORIGIN: &str = "https://oauth2.googleapis.com";
const API_ORIGIN: &str = "https://www.googleapis.com";

pub const AUTHORIZE_PATH: &str = "/o/oauth2/v2/auth";
pub const TOKEN_PATH: &str = "/token";
pub const REVOKE_PATH: &str = "/revoke";
pub const TOKENINFO_PATH: &str = "/oauth2/v3/tokeninfo";
pub const USERINFO_PATH: &str = "/oauth2/v3/userinfo";

pub(crate) fn adapter(ctx: &AdapterContext) -> Result<ProviderAdapter, AuthError> {
    let client_id = ctx.credential.clone().ok_or_else(|| {
        AuthError::Configuration(
            "Google login needs an OAuth client id (set GOOGLE_CLIENT_ID)".to_string(),
        )
    })?;
    let token_url = ctx.endpoint(OAUTH_ORIGIN, TOKEN_PATH);

    let mut flow = PkceFlow::new(
        client_id.clone(),
        ctx.endpoint(ACCOUNTS_ORIGIN, AUTHORIZE_PATH),
        token_url.clone(),
    )
    .with_provider(ProviderKind::Google.as_str())
    .with_scope(SCOPES.join(" "))
    .with_redirect_port(ctx.callback_port)
    .with_http_timeout(ctx.http_timeout)
    .with_interaction(ctx.interaction.clone());
    if let Some(secret) = ctx.client_secret.as_deref() {
        flow = flow.with_client_secret(secret);
    }

    let profile = ProviderProfile {
        kind: ProviderKind::Google,
        default_scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        refresh: RefreshPolicy::OAuth {
            token_url,
            client_id,
            client_secret: ctx.client_secret.clone(),
        },
        revoke: RevokePolicy::Endpoint {
            url: ctx.endpoint(OAUTH_ORIGIN, REVOKE_PATH),
        },
        validation: ValidationCheck::TokenInfo {
            url: ctx.endpoint(API_ORIGIN, TOKENINFO_PATH),
        },
        account_info: AccountInfoSource::BearerJson {
            url: ctx.endpoint(API_ORIGIN, USERINFO_PATH),
        },
    };

    Ok(ProviderAdapter::new(
        profile,
        CredentialFlow::Pkce(flow),
        ctx.http_timeout,
    ))
}
