//! respkv server entry point.
//!
//! Reads configuration, installs logging, starts the expiry sweeper and
//! serves clients until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use respkv::storage::{ExpiryConfig, ExpirySweeper};
use respkv::{Config, Server};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
respkv v{} - in-memory key-value server (RESP)
──────────────────────────────────────────────
Listening on {}
Use Ctrl+C to shutdown gracefully.
"#,
        respkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG takes precedence over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let server = Server::bind(config.bind_address(), config.server_options())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    print_banner(&config);

    let _sweeper = config.sweep_interval().map(|interval| {
        ExpirySweeper::start(Arc::clone(server.store()), ExpiryConfig { interval })
    });

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await
            }
        }
    };

    server.run_until(shutdown).await;

    info!("Server shutdown complete");
    Ok(())
}
