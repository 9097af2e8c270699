use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Provider-specific identity data attached to a token.
pub type AccountInfo = serde_json::Map<String, serde_json::Value>;

/// Durable credential record, one per provider.
///
/// # Example
/// ```
/// use ai_auth::auth::AuthToken;
/// use chrono::{Duration, Utc};
///
/// let token = AuthToken::new("openai", "access")
///     .with_refresh_token("refresh")
///     .with_expires_at(Utc::now() + Duration::hours(1));
/// assert!(!token.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub provider: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// RFC 3339 on write; naive ISO-8601 (local time) is accepted on read.
    #[serde(default, deserialize_with = "deserialize_expires_at")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub account_info: Option<AccountInfo>,
    /// OAuth client the token was issued to; refresh and revocation reuse it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl AuthToken {
    pub fn new(provider: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            token_type: default_token_type(),
            scopes: BTreeSet::new(),
            account_info: None,
            client_id: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_account_info(mut self, account_info: AccountInfo) -> Self {
        self.account_info = Some(account_info);
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Tokens without `expires_at` never expire; otherwise the boundary counts as expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Whole days until expiry (negative once expired), `None` for non-expiring tokens.
    pub fn expires_in_days(&self) -> Option<i64> {
        self.expires_at
            .map(|expires_at| (expires_at - Utc::now()).num_days())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// Value for an HTTP `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Fold account metadata into the token, newer keys winning.
    pub fn merge_account_info(&mut self, info: AccountInfo) {
        match self.account_info.as_mut() {
            Some(existing) => existing.extend(info),
            None => self.account_info = Some(info),
        }
    }

    /// A short human label for the account (email, name, or status).
    pub fn account_label(&self) -> Option<String> {
        let info = self.account_info.as_ref()?;
        ["email", "name", "status"]
            .iter()
            .find_map(|key| info.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }
}

/// Token payload produced by a credential flow before it becomes an [`AuthToken`].
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Lifetime in seconds; `None` means the credential does not expire.
    pub expires_in: Option<u64>,
    /// Space-delimited scope string as reported by the server.
    pub scope: Option<String>,
    pub account_info: Option<AccountInfo>,
}

impl TokenResponse {
    pub fn scopes(&self) -> Option<BTreeSet<String>> {
        let scope = self.scope.as_deref()?.trim();
        if scope.is_empty() {
            return None;
        }
        Some(scope.split_whitespace().map(str::to_string).collect())
    }

    /// Convert into a stored token, stamping `expires_at` relative to now.
    pub fn into_token(self, provider: &str, default_scopes: &[String]) -> AuthToken {
        let scopes = self
            .scopes()
            .unwrap_or_else(|| default_scopes.iter().cloned().collect());
        let expires_at = self.expires_in.map(expiry_from_now);
        AuthToken {
            provider: provider.to_string(),
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|value| !value.is_empty()),
            expires_at,
            token_type: self.token_type,
            scopes,
            account_info: self.account_info,
            client_id: None,
        }
    }
}

/// Wrap an arbitrary JSON payload as account info.
pub fn account_info_from_value(value: serde_json::Value) -> AccountInfo {
    match value {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = AccountInfo::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

/// Longest lifetime honoured from a server; anything larger is clamped.
const MAX_TOKEN_LIFETIME_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn expiry_from_now(secs: u64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs.min(MAX_TOKEN_LIFETIME_SECS) as i64)
}

/// Parse a stored expiry: RFC 3339, else a naive timestamp in local time.
pub fn parse_expires_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    )
}

fn deserialize_expires_at<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_expires_at(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}"))),
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_without_expiry_never_expires() {
        let token = AuthToken::new("poe", "sk-key");
        assert!(!token.is_expired());
        assert!(!token.is_expired_at(Utc::now() + Duration::days(365 * 100)));
        assert_eq!(token.expires_in_days(), None);
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let at = Utc::now();
        let token = AuthToken::new("google", "ya29").with_expires_at(at);
        assert!(token.is_expired_at(at));
        assert!(!token.is_expired_at(at - Duration::seconds(1)));
        assert!(token.is_expired_at(at + Duration::seconds(1)));
    }

    #[test]
    fn past_and_future_expiry() {
        let past = AuthToken::new("openai", "a").with_expires_at(Utc::now() - Duration::minutes(1));
        let future = AuthToken::new("openai", "a").with_expires_at(Utc::now() + Duration::hours(1));
        assert!(past.is_expired());
        assert!(!future.is_expired());
        assert!(future.is_valid());
    }

    #[test]
    fn response_converts_with_lifetime_and_scopes() {
        let response = TokenResponse {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            scope: Some("openid email".to_string()),
            account_info: None,
        };
        let token = response.into_token("google", &[]);
        assert_eq!(token.provider, "google");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
        assert!(token.scopes.contains("openid"));
        assert!(token.scopes.contains("email"));
        let remaining = token.expires_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(59));
    }

    #[test]
    fn response_without_scope_keeps_defaults() {
        let response = TokenResponse {
            access_token: "sk-key".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: None,
            scope: None,
            account_info: None,
        };
        let defaults = vec!["chat".to_string(), "models".to_string()];
        let token = response.into_token("poe", &defaults);
        assert_eq!(token.expires_at, None);
        assert_eq!(token.scopes.len(), 2);
    }

    #[test]
    fn naive_timestamp_reads_as_local_time() {
        let token: AuthToken = serde_json::from_value(json!({
            "provider": "google",
            "access_token": "ya29",
            "expires_at": "2099-01-01T12:00:00.123456"
        }))
        .unwrap();
        let expected = Local
            .with_ymd_and_hms(2099, 1, 1, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let parsed = token.expires_at.unwrap();
        assert_eq!(parsed.timestamp(), expected.timestamp());
        assert!(!token.is_expired());
    }

    #[test]
    fn rfc3339_timestamp_keeps_offset() {
        let parsed = parse_expires_at("2030-06-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2030-06-01T08:00:00+00:00");
        assert_eq!(parse_expires_at("next tuesday"), None);
    }

    #[test]
    fn null_or_empty_expiry_is_absent() {
        let token: AuthToken = serde_json::from_value(json!({
            "provider": "poe",
            "access_token": "sk",
            "expires_at": null
        }))
        .unwrap();
        assert_eq!(token.expires_at, None);
        let token: AuthToken = serde_json::from_value(json!({
            "provider": "poe",
            "access_token": "sk",
            "expires_at": ""
        }))
        .unwrap();
        assert_eq!(token.expires_at, None);
    }

    #[test]
    fn huge_lifetime_is_clamped_and_still_round_trips() {
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: Some(u64::MAX),
            scope: None,
            account_info: None,
        };
        let token = response.into_token("openai", &[]);
        let expires_at = token.expires_at.unwrap();
        assert!(expires_at > Utc::now() + Duration::days(365 * 99));
        let reloaded: AuthToken =
            serde_json::from_value(serde_json::to_value(&token).unwrap()).unwrap();
        assert_eq!(reloaded.expires_at, Some(expires_at));
    }

    #[test]
    fn account_label_prefers_email() {
        let mut token = AuthToken::new("google", "a");
        token.merge_account_info(account_info_from_value(json!({"status": "active"})));
        assert_eq!(token.account_label().as_deref(), Some("active"));
        token.merge_account_info(account_info_from_value(json!({"email": "me@example.com"})));
        assert_eq!(token.account_label().as_deref(), Some("me@example.com"));
    }

    #[test]
    fn non_object_account_payload_is_wrapped() {
        let info = account_info_from_value(json!([1, 2, 3]));
        assert_eq!(info.get("data"), Some(&json!([1, 2, 3])));
    }
}
