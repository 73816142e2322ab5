mod cli;
mod client;
mod commands;
mod config;
mod error;
mod guard;
mod mcp;
mod notice;
mod orchestrator;
mod page_range;
mod pdf;
mod render;
mod save;
mod selection;
mod viewport;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output and the MCP transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pagepick=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.backend_url {
        Some(url) => Config::with_backend_url(url).context("Invalid --backend-url")?,
        None => Config::from_env().context("Failed to load configuration")?,
    };
    tracing::debug!(backend = %config.backend_url, "Configuration loaded");

    match cli.command {
        Commands::Mcp { output_dir } => {
            mcp::run_server(&config, output_dir).await?;
        }
        Commands::Upload { path } => {
            commands::upload::run(&config, &path).await?;
        }
        Commands::Info { document } => {
            commands::info::run(&config, document.into()).await?;
        }
        Commands::Preview { document, pages } => {
            commands::preview::run(&config, document.into(), &pages).await?;
        }
        Commands::Extract {
            document,
            pages,
            output_dir,
        } => {
            commands::extract::run(&config, document.into(), &pages, output_dir).await?;
        }
        Commands::Session {
            open,
            upload,
            output_dir,
        } => {
            let start = match (open, upload) {
                (Some(document), _) => commands::session::Start::Open(document.into()),
                (None, Some(path)) => commands::session::Start::Upload(path),
                (None, None) => commands::session::Start::Empty,
            };
            commands::session::run(&config, start, output_dir).await?;
        }
    }

    Ok(())
}
