// Gateway runtime entrypoint.
//
// Loads a JSON module descriptor, builds a `gateway_core::Gateway` against
// the production `libloading`-backed module loader, then blocks waiting for
// a shutdown signal. Dropping the `Gateway` on the way out tears every
// loaded module down in exact reverse creation order.
//
// If you're new to Rust: `#[tokio::main]` starts the async runtime `main`
// runs in. Everything below `Gateway::create` is synchronous, OS-thread
// based code (see `crates/broker`); `tokio` here exists only so we can
// `await` a Ctrl-C signal without busy-polling.
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use config::GatewayConfig;
use gateway_core::Gateway;
use loader::LibloadingModuleLoader;

/// Edge gateway runtime: hosts modules loaded from shared libraries and
/// brokers messages between them over a topic-prefix pub/sub bus.
#[derive(Parser, Debug)]
#[command(name = "gateway", version, about)]
struct Cli {
    /// Path to the JSON gateway descriptor (see `config::GatewayConfig`).
    #[arg(long, value_name = "PATH")]
    config: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gateway exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = GatewayConfig::load(&cli.config)
        .with_context(|| format!("loading gateway config from {}", cli.config))?;
    let descriptor = config
        .descriptor()
        .context("converting gateway config into a module descriptor")?;

    tracing::info!(modules = descriptor.len(), "starting gateway");

    let loader = LibloadingModuleLoader;
    let gateway = Gateway::create(&descriptor, &loader).context("creating gateway")?;

    tracing::info!("gateway running, waiting for shutdown signal");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutdown signal received, tearing down modules");

    // Explicit for readability: `Gateway`'s `Drop` impl does the reverse-
    // order teardown regardless of whether this line is here.
    drop(gateway);
    Ok(())
}
