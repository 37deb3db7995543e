//! CLI argument parsing with clap derive

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::build_agent;
use crate::application::ports::Transport;
use crate::domain::config::{AgentConfig, DEFAULT_CONFIG_PATH};
use crate::infra::config::load_config;
use crate::infra::transport::ValkeyTransport;

/// websoft9 host agent: runs validated tasks and reports host health
#[derive(Parser)]
#[command(name = "websoft9-agent", version, propagate_version = true)]
pub struct Cli {
    /// Path to the agent configuration file
    #[arg(short, long, global = true, env = "WEBSOFT9_AGENT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to the control plane and run until signalled (default)
    Run,

    /// Load and validate the configuration, then exit
    CheckConfig,

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the agent cannot start.
    pub async fn run(self) -> Result<()> {
        match self.command.unwrap_or(Command::Run) {
            Command::Version => {
                println!("websoft9-agent {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Command::CheckConfig => {
                let config = load_config(&self.config)?;
                println!(
                    "configuration OK: agent {} ({} allowed commands, {} health checks)",
                    config.agent.id,
                    config.security.allowed_commands.len(),
                    config.health_checks.len()
                );
                Ok(())
            }
            Command::Run => {
                let config = load_config(&self.config)?;
                init_tracing(&config);
                info!(audit = true, path = %self.config, "configuration loaded");
                serve(&config).await
            }
        }
    }
}

fn init_tracing(config: &AgentConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();
}

async fn serve(config: &AgentConfig) -> Result<()> {
    info!(agent_id = %config.agent.id, version = env!("CARGO_PKG_VERSION"), "websoft9-agent starting");

    let transport = Arc::new(
        ValkeyTransport::connect(&config.valkey, &config.agent.id, config.agent.heartbeat_interval)
            .await
            .context("failed to initialise Valkey transport")?,
    );
    let shared: Arc<dyn Transport> = transport.clone();
    let agent = build_agent(config, shared)?;

    let shutdown = CancellationToken::new();
    agent.start(&shutdown).await?;

    wait_for_signal().await?;
    info!("shutdown signal received");
    shutdown.cancel();
    agent.stop().await;
    transport.close().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("cannot listen for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for ctrl-c")
}
