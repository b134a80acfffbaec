mod chat;
mod cli;
mod config;
mod line;
mod server;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_bot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => server::serve(&config).await,
        Commands::Chat {
            persona,
            message,
            user_name,
            user_id,
            config,
        } => chat::run_once(&config, &persona, &message, &user_name, &user_id).await,
    }
}
