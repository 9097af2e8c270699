mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use ai_auth::auth::FlowInput;
use ai_auth::config::AuthConfig;
use ai_auth::error::AuthError;
use ai_auth::provider::{ProviderKind, ProviderRegistry};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{expired_token, live_token, quiet_interaction};

fn registry_for(kind: ProviderKind, server: &MockServer) -> ProviderRegistry {
    let config = AuthConfig::new()
        .with_base_url(kind, server.uri())
        .with_client_id(ProviderKind::Google, "google-client")
        .with_callback_port(0);
    ProviderRegistry::with_interaction(config, quiet_interaction())
}

#[tokio::test]
async fn openai_device_login_attaches_account_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .and(body_string_contains("client_id=codex-cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-1",
            "user_code": "ABCD-1234",
            "verification_uri": "https://auth.example.test/device",
            "expires_in": 60,
            "interval": 0
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "oa-access",
            "refresh_token": "oa-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("authorization", "Bearer oa-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "dev@example.com",
            "name": "Dev"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("chatgpt", None).unwrap();
    let token = adapter.login(&FlowInput::default()).await.expect("login");

    assert_eq!(token.provider, "openai");
    assert_eq!(token.client_id.as_deref(), Some("codex-cli"));
    assert_eq!(token.refresh_token.as_deref(), Some("oa-refresh"));
    assert!(token.expires_at.is_some());
    assert!(token.scopes.contains("chat"));
    assert!(token.scopes.contains("models"));
    assert_eq!(token.account_label().as_deref(), Some("dev@example.com"));
}

#[tokio::test]
async fn account_info_failure_does_not_fail_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-1",
            "user_code": "ABCD-1234",
            "verification_uri": "https://auth.example.test/device",
            "interval": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "oa-access"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("openai", None).unwrap();
    let token = adapter.login(&FlowInput::default()).await.expect("login");
    assert_eq!(token.access_token, "oa-access");
    assert_eq!(token.account_info, None);
}

#[tokio::test]
async fn oauth_refresh_keeps_previous_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("openai", None).unwrap();
    let mut info = serde_json::Map::new();
    info.insert("email".to_string(), json!("dev@example.com"));
    let stale = expired_token("openai", "old-access")
        .with_refresh_token("old-refresh")
        .with_scopes(["chat"])
        .with_account_info(info.clone());

    let refreshed = adapter.refresh(&stale).await.expect("refresh");
    assert_eq!(refreshed.access_token, "new-access");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("old-refresh"));
    assert_eq!(refreshed.account_info, Some(info));
    assert!(refreshed.scopes.contains("chat"));
    assert!(!refreshed.is_expired());
}

#[tokio::test]
async fn refresh_without_refresh_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "never"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("openai", None).unwrap();
    let err = adapter
        .refresh(&expired_token("openai", "old-access"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingRefreshToken(name) if name == "openai"));
}

#[tokio::test]
async fn rejected_refresh_token_is_invalid_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::Google, &server);
    let adapter = registry.get("google", None).unwrap();
    let stale = expired_token("google", "ya29.old").with_refresh_token("1//revoked");
    let err = adapter.refresh(&stale).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredential(_)));
}

#[tokio::test]
async fn expired_token_is_invalid_without_network() {
    let server = MockServer::start().await;
    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("openai", None).unwrap();

    let valid = adapter
        .validate(&expired_token("openai", "old"))
        .await
        .unwrap();
    assert!(!valid);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn openai_validation_uses_bearer_model_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer bad"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("openai", None).unwrap();
    assert!(adapter.validate(&live_token("openai", "good")).await.unwrap());
    assert!(!adapter.validate(&live_token("openai", "bad")).await.unwrap());
}

#[tokio::test]
async fn google_validation_uses_tokeninfo() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v3/tokeninfo"))
        .and(query_param("access_token", "ya29.good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "aud": "google-client" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v3/tokeninfo"))
        .and(query_param("access_token", "ya29.bad"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_token" })))
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::Google, &server);
    let adapter = registry.get("google", None).unwrap();
    assert!(adapter.validate(&live_token("google", "ya29.good")).await.unwrap());
    assert!(!adapter.validate(&live_token("google", "ya29.bad")).await.unwrap());
}

#[tokio::test]
async fn poe_validation_falls_back_to_format_when_unreachable() {
    let config = AuthConfig::new()
        .with_base_url(ProviderKind::Poe, "http://127.0.0.1:9")
        .with_http_timeout(Duration::from_secs(2));
    let registry = ProviderRegistry::with_interaction(config, quiet_interaction());
    let adapter = registry.get("poe", None).unwrap();

    assert!(adapter
        .validate(&auth_support::token("poe", "sk-poe-0123456789abcdef"))
        .await
        .unwrap());
    assert!(!adapter
        .validate(&auth_support::token("poe", "pk-nope"))
        .await
        .unwrap());
}

#[tokio::test]
async fn google_revocation_reports_server_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .and(body_string_contains("token=ya29.live"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .and(body_string_contains("token=ya29.unknown"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_token" })))
        .mount(&server)
        .await;

    let registry = registry_for(ProviderKind::Google, &server);
    let adapter = registry.get("google", None).unwrap();
    assert!(adapter.logout(&live_token("google", "ya29.live")).await.unwrap());
    assert!(!adapter.logout(&live_token("google", "ya29.unknown")).await.unwrap());
}

#[tokio::test]
async fn local_only_revocation_always_succeeds() {
    let server = MockServer::start().await;
    let registry = registry_for(ProviderKind::OpenAi, &server);
    let adapter = registry.get("openai", None).unwrap();
    assert!(adapter.logout(&live_token("openai", "x")).await.unwrap());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_login_on_one_adapter_is_rejected() {
    let server = MockServer::start().await;
    let registry = registry_for(ProviderKind::Google, &server);
    let adapter = registry.get("google", None).unwrap();
    let input = FlowInput {
        timeout: Duration::from_millis(300),
        ..FlowInput::default()
    };

    let first = Arc::clone(&adapter);
    let (a, b) = tokio::join!(first.login(&input), adapter.login(&input));

    assert!(matches!(a, Err(AuthError::AuthorizationExpired(_))));
    assert!(matches!(b, Err(AuthError::FlowInProgress(name)) if name == "google"));
}
