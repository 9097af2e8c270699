//! CLI entry point for ai-auth.

pub mod auth;

use clap::{Parser, Subcommand};

/// Credential manager for external AI services
#[derive(Parser, Debug)]
#[command(name = "ai-auth", version, about = "Log in to AI providers and manage stored tokens")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Login to a provider
    Login(LoginArgs),
    /// Show authentication status
    Status,
    /// Logout from one provider or all of them
    Logout(LogoutArgs),
    /// Refresh a stored token
    Refresh(RefreshArgs),
}

/// Arguments for `ai-auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Provider to login to (openai, google, poe, anthropic)
    pub provider: String,

    /// API key for key-based providers (prompted when omitted)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Log in again even if a valid token is stored
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `ai-auth logout`.
#[derive(Parser, Debug)]
pub struct LogoutArgs {
    /// Provider to logout from
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub provider: Option<String>,

    /// Logout from every provider
    #[arg(long)]
    pub all: bool,
}

/// Arguments for `ai-auth refresh`.
#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// Provider whose token to refresh
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_login_with_key() {
        let cli = Cli::try_parse_from(["ai-auth", "login", "poe", "--api-key", "sk-x", "--force"])
            .unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.provider, "poe");
                assert_eq!(args.api_key.as_deref(), Some("sk-x"));
                assert!(args.force);
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_status() {
        let cli = Cli::try_parse_from(["ai-auth", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn parse_logout_all() {
        let cli = Cli::try_parse_from(["ai-auth", "logout", "--all"]).unwrap();
        match cli.command {
            Commands::Logout(args) => {
                assert!(args.all);
                assert!(args.provider.is_none());
            }
            other => panic!("expected Logout, got {other:?}"),
        }
    }

    #[test]
    fn logout_needs_provider_or_all() {
        assert!(Cli::try_parse_from(["ai-auth", "logout"]).is_err());
        assert!(Cli::try_parse_from(["ai-auth", "logout", "google", "--all"]).is_err());
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["ai-auth"]).is_err());
    }
}
