//! ai-auth CLI binary entry point.

use ai_auth::auth::AuthService;
use ai_auth::cli::{Cli, Commands};
use ai_auth::config::AuthConfig;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let service = AuthService::from_config(AuthConfig::from_env());

    let result = match cli.command {
        Commands::Login(args) => {
            ai_auth::cli::auth::handle_login(&service, &args.provider, args.api_key, args.force)
                .await
        }
        Commands::Status => ai_auth::cli::auth::handle_status(&service),
        Commands::Logout(args) => {
            ai_auth::cli::auth::handle_logout(&service, args.provider.as_deref(), args.all).await
        }
        Commands::Refresh(args) => ai_auth::cli::auth::handle_refresh(&service, &args.provider).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
