//! `devreg delete` — delete a device from every registry.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use devreg_sync::Engine;

use super::{dry_run_prefix, DeviceArgs};

/// Arguments for `devreg delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

impl DeleteArgs {
    pub async fn run(self, engine: &Engine, cancel: &CancellationToken) -> Result<()> {
        let ids = self.device.ids();
        let deleted = engine
            .delete(&ids, cancel)
            .await
            .with_context(|| format!("failed to delete {ids}"))?;

        let registries: Vec<String> = deleted.registries.iter().map(|r| r.to_string()).collect();
        eprintln!(
            "{}{} deleted {ids} from {}",
            dry_run_prefix(engine),
            "✓".green().bold(),
            registries.join(", ")
        );
        for registry in &deleted.skipped {
            eprintln!("  {} {registry} registry disabled, skipped", "!".yellow().bold());
        }
        Ok(())
    }
}
