//! `devreg export` — read devices from every registry and print them.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use devreg_core::{ownership, DeviceIdentifiers, EngineConfig};
use devreg_sync::{export_all, Engine, ExportOptions, ExportResult, SourceAction};

use super::{dry_run_prefix, print_skipped};
use crate::http::to_wire;

/// Arguments for `devreg export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Application the devices belong to.
    pub application_id: String,

    /// Devices to export.
    #[arg(required = true, num_args = 1..)]
    pub device_ids: Vec<String>,

    /// Comma-separated field paths to export (default: every readable field).
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    pub fields: Vec<String>,
}

impl ExportArgs {
    pub async fn run(
        self,
        engine: &Engine,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let devices: Vec<DeviceIdentifiers> = self
            .device_ids
            .iter()
            .map(|dev| DeviceIdentifiers::new(self.application_id.as_str(), dev.as_str()))
            .collect();
        let paths = if self.fields.is_empty() {
            ownership::all_readable()
        } else {
            self.fields.clone()
        };

        let results = export_all(engine, &devices, &paths, ExportOptions::from(config), cancel).await;

        let prefix = dry_run_prefix(engine);
        let mut failed = 0usize;
        for (ids, result) in &results {
            match result {
                Ok(exported) => {
                    print_device(exported)?;
                    eprintln!(
                        "{prefix}{} exported {ids}{}",
                        "✓".green().bold(),
                        describe(exported)
                    );
                    print_skipped(ids, &exported.skipped);
                }
                Err(err) => {
                    failed += 1;
                    eprintln!("{} {ids}: {err}", "✗".red().bold());
                }
            }
        }

        if failed > 0 {
            bail!("{failed} of {} devices failed to export", results.len());
        }
        Ok(())
    }
}

fn print_device(exported: &ExportResult) -> Result<()> {
    let wire = to_wire(&exported.device).context("failed to encode exported device")?;
    let line = serde_json::to_string(&wire).context("failed to encode exported device")?;
    println!("{line}");
    Ok(())
}

fn describe(exported: &ExportResult) -> String {
    let mut notes = Vec::new();
    match exported.source_action {
        SourceAction::Kept => {}
        SourceAction::SessionCleared => notes.push("session cleared on source"),
        SourceAction::Deleted => notes.push("deleted from source"),
    }
    if exported.claim_code_cleared {
        notes.push("claim code cleared on source");
    }
    if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    }
}
