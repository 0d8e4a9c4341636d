//! `devreg clear-session` — clear sessions and MAC state of a device.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use devreg_sync::Engine;

use super::{dry_run_prefix, print_skipped, DeviceArgs};

/// Arguments for `devreg clear-session`.
#[derive(Args, Debug)]
pub struct ClearSessionArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

impl ClearSessionArgs {
    pub async fn run(self, engine: &Engine, cancel: &CancellationToken) -> Result<()> {
        let ids = self.device.ids();
        let applied = engine
            .clear_session(&ids, cancel)
            .await
            .with_context(|| format!("failed to clear session of {ids}"))?;

        eprintln!(
            "{}{} cleared session of {ids}",
            dry_run_prefix(engine),
            "✓".green().bold()
        );
        print_skipped(&ids, &applied.skipped);
        Ok(())
    }
}
