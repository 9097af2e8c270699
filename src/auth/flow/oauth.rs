//! Shared OAuth token-endpoint plumbing.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::auth::token::TokenResponse;
use crate::error::AuthError;

/// Lifetime assumed when an OAuth token response omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenEndpointBody {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenEndpointBody {
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub fn error_detail(&self) -> Option<String> {
        let error = self.error.as_deref()?;
        Some(match self.error_description.as_deref() {
            Some(description) if !description.is_empty() => format!("{error}: {description}"),
            _ => error.to_string(),
        })
    }

    pub fn into_token_response(self) -> Option<TokenResponse> {
        let access_token = self.access_token.filter(|value| !value.is_empty())?;
        Some(TokenResponse {
            access_token,
            refresh_token: self.refresh_token,
            token_type: self
                .token_type
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expires_in: Some(self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)),
            scope: self.scope,
            account_info: None,
        })
    }
}

/// POST a form and return the status and raw body.
pub(crate) async fn post_form(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<(StatusCode, String), AuthError> {
    let response = client
        .post(url)
        .header("Accept", "application/json")
        .form(params)
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

/// Interpret a token-endpoint answer; anything but a usable token is an error.
pub(crate) fn parse_token_body(status: StatusCode, body: &str) -> Result<TokenResponse, AuthError> {
    let parsed = TokenEndpointBody::parse(body);
    if let Some(detail) = parsed.error_detail() {
        return Err(AuthError::Token(detail));
    }
    if !status.is_success() {
        return Err(AuthError::Token(format!(
            "status {status}: {}",
            truncate(body, 200)
        )));
    }
    parsed
        .into_token_response()
        .ok_or_else(|| AuthError::Token("response did not include an access_token".to_string()))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_grant(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        params.push(("client_secret", secret));
    }

    let (status, body) = post_form(client, token_url, &params).await?;
    debug!(status = status.as_u16(), "refresh grant answered");
    let parsed = TokenEndpointBody::parse(&body);
    if parsed.error.as_deref() == Some("invalid_grant") {
        return Err(AuthError::InvalidCredential(format!(
            "refresh token rejected: {}",
            parsed.error_detail().unwrap_or_default()
        )));
    }
    parse_token_body(status, &body)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(value)) => Ok(Some(value)),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid u64 string: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_body_defaults_type_and_lifetime() {
        let response = parse_token_body(StatusCode::OK, r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, Some(DEFAULT_TOKEN_LIFETIME_SECS));
        assert_eq!(response.refresh_token, None);
    }

    #[test]
    fn string_lifetimes_are_accepted() {
        let response =
            parse_token_body(StatusCode::OK, r#"{"access_token": "abc", "expires_in": "120"}"#)
                .unwrap();
        assert_eq!(response.expires_in, Some(120));
    }

    #[test]
    fn server_error_detail_is_kept() {
        let err = parse_token_body(
            StatusCode::BAD_REQUEST,
            r#"{"error": "invalid_client", "error_description": "unknown client"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Token(detail) if detail == "invalid_client: unknown client"));
    }

    #[test]
    fn non_json_failure_reports_status() {
        let err = parse_token_body(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, AuthError::Token(detail) if detail.contains("502")));
    }

    #[test]
    fn success_without_access_token_is_rejected() {
        let err = parse_token_body(StatusCode::OK, "{}").unwrap_err();
        assert!(matches!(err, AuthError::Token(_)));
    }
}
