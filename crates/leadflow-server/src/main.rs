//! Leadflow server binary
//!
//! Starts the HTTP server for lead intake and distribution.

use anyhow::Context;
use clap::Parser;
use leadflow_server::config::ServerConfig;
use leadflow_server::start_server;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Lead qualification and distribution server
#[derive(Debug, Parser)]
#[command(name = "leadflow-server", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LEADFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            tracing::warn!("No config file specified, using the built-in test configuration");
            tracing::warn!("Usage: leadflow-server --config <path-to-config.toml>");
            ServerConfig::default_test_config()
        }
    };

    if cli.check {
        println!(
            "Configuration OK: {} pipeline(s), {} form(s)",
            config.pipelines.len(),
            config.forms.len()
        );
        return Ok(());
    }

    start_server(config).await.context("server failed")?;
    Ok(())
}
