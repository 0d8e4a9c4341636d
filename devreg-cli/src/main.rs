//! devreg — export and manage end devices sharded across device registries.
//!
//! # Usage
//!
//! ```text
//! devreg export <application-id> <device-id>... [--fields <path>,...]
//! devreg clear-session <application-id> <device-id>
//! devreg delete <application-id> <device-id>
//!
//! global: [--config <path>] [--dry-run] [--export-session] [--delete-source-device]
//! ```
//!
//! Exported devices are printed to stdout as JSON, one per line. Status and
//! log lines go to stderr; set `RUST_LOG` to change the log level.

mod commands;
mod http;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use commands::{
    clear_session::ClearSessionArgs, delete::DeleteArgs, export::ExportArgs, GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "devreg",
    version,
    about = "Export and manage end devices across identity, network, application and join registries",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read devices from every registry and print them as JSON.
    Export(ExportArgs),

    /// Clear sessions and MAC state of a device.
    ClearSession(ClearSessionArgs),

    /// Delete a device from every registry.
    Delete(DeleteArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.global.load_config()?;
    let engine = commands::build_engine(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling outstanding registry calls");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Export(args) => args.run(&engine, &config, &cancel).await,
        Commands::ClearSession(args) => args.run(&engine, &cancel).await,
        Commands::Delete(args) => args.run(&engine, &cancel).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
