//! Subcommands and the setup they share.

pub mod clear_session;
pub mod delete;
pub mod export;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use devreg_core::{config, DeviceIdentifiers, EngineConfig};
use devreg_sync::{Engine, SkippedRegistry};

use crate::http::HttpDialer;

/// Flags accepted by every subcommand. Each switch can only turn on what
/// the config file leaves off.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Config file to use instead of `~/.devreg/config.yaml`.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log mutations and deletions instead of performing them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Export sessions and MAC state, then clear them on the source.
    #[arg(long, global = true)]
    pub export_session: bool,

    /// Delete exported devices from the source registries.
    #[arg(long, global = true)]
    pub delete_source_device: bool,
}

impl GlobalArgs {
    pub fn load_config(&self) -> Result<EngineConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => config::load().context("failed to load ~/.devreg/config.yaml")?,
        };
        cfg.dry_run |= self.dry_run;
        cfg.export_session |= self.export_session;
        cfg.delete_source_device |= self.delete_source_device;
        Ok(cfg)
    }
}

/// Engine over the HTTP registry client.
pub fn build_engine(cfg: &EngineConfig) -> Result<Engine> {
    if let Some(ca_file) = &cfg.ca_file {
        bail!(
            "ca_file ({}) is not supported by the HTTP client; add the CA to the system trust store",
            ca_file.display()
        );
    }
    let dialer = HttpDialer::new(cfg.api_key.clone(), cfg.insecure);
    Ok(Engine::new(cfg, Arc::new(dialer)))
}

/// Positional `<application-id> <device-id>` pair.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Application the device belongs to.
    pub application_id: String,

    /// Device ID within the application.
    pub device_id: String,
}

impl DeviceArgs {
    pub fn ids(&self) -> DeviceIdentifiers {
        DeviceIdentifiers::new(self.application_id.as_str(), self.device_id.as_str())
    }
}

pub(crate) fn dry_run_prefix(engine: &Engine) -> &'static str {
    if engine.options().dry_run {
        "[dry-run] "
    } else {
        ""
    }
}

pub(crate) fn print_skipped(ids: &DeviceIdentifiers, skipped: &[SkippedRegistry]) {
    for s in skipped {
        eprintln!(
            "  {} {ids}: {} registry disabled, skipped {}",
            "!".yellow().bold(),
            s.registry,
            s.paths.join(", ")
        );
    }
}
