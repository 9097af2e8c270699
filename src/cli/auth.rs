//! CLI handlers for login, status, logout, and refresh.

use crate::auth::{AuthService, LoginOptions, TokenState};
use crate::provider::ProviderKind;

/// Handle `ai-auth login <provider>`.
pub async fn handle_login(
    service: &AuthService,
    provider: &str,
    api_key: Option<String>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind: ProviderKind = provider
        .trim()
        .parse()
        .map_err(|_| format!("Unknown provider: {provider}. Supported: openai, google, poe, anthropic"))?;
    if !force {
        if let Some(token) = service.store().get_valid_token(kind.as_str()) {
            println!("⚠️  Already logged in to {}", token.provider);
            println!("   Use --force to log in again.");
            return Ok(());
        }
    }

    println!("🔐 Logging in to {}...", kind.display_name());
    let options = LoginOptions::builder()
        .maybe_api_key(api_key)
        .force(true)
        .build();
    let token = service.login(kind.as_str(), &options).await?;

    println!("✅ {} login successful!", token.provider);
    if let Some(account) = token.account_label() {
        println!("   Account: {account}");
    }
    match token.expires_at {
        Some(expires_at) => println!("   Expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC")),
        None => println!("   Expires: never"),
    }
    Ok(())
}

/// Handle `ai-auth status`.
pub fn handle_status(service: &AuthService) -> Result<(), Box<dyn std::error::Error>> {
    println!("Authentication status:");
    for status in service.status() {
        let marker = match status.state {
            TokenState::Active => "✅ active",
            TokenState::Expired => "❌ expired",
            TokenState::Absent => "➖ not logged in",
        };
        let expiry = match (status.state, status.expires_in_days) {
            (TokenState::Absent, _) => String::new(),
            (_, Some(days)) => format!(" (expires in {days}d)"),
            (_, None) => " (no expiry)".to_string(),
        };
        let account = status
            .account
            .map(|account| format!(" [{account}]"))
            .unwrap_or_default();
        println!(
            "  {:<20} {marker}{account}{expiry}",
            status.kind.display_name()
        );
    }
    Ok(())
}

/// Handle `ai-auth logout [<provider>|--all]`.
pub async fn handle_logout(
    service: &AuthService,
    provider: Option<&str>,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if all {
        let names = service.logout_all().await?;
        for name in &names {
            println!("  ✓ {name} logged out");
        }
        println!("✅ All credentials removed");
        return Ok(());
    }

    let Some(provider) = provider else {
        return Err("Specify a provider or --all".into());
    };
    if service.logout(provider).await? {
        println!("✅ Logged out of {provider}");
    } else {
        println!("Not logged in to {provider}");
    }
    Ok(())
}

/// Handle `ai-auth refresh <provider>`.
pub async fn handle_refresh(
    service: &AuthService,
    provider: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = service
        .refresh(provider)
        .await
        .map_err(|err| format!("Refresh failed: {err}. You may need to log in again."))?;
    println!("✅ {} token refreshed", token.provider);
    Ok(())
}
