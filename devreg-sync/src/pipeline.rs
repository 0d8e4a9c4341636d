//! Export pipeline shared by the CLI commands.
//!
//! Exporting reads a device and then takes it off the source stack so it
//! never runs on two stacks at once: the device is deleted, or its session
//! is cleared, and any exported claim authentication code is cleared.

use tokio_util::sync::CancellationToken;

use devreg_core::field_path::exclude_fields;
use devreg_core::ownership::{CLAIM_AUTHENTICATION_CODE, NETWORK_SESSION_FIELDS};
use devreg_core::{DeviceIdentifiers, EndDeviceRecord, EngineConfig};

use crate::engine::{Engine, SkippedRegistry};
use crate::error::SyncError;

/// What to do with the source device once it has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOptions {
    /// Include sessions and MAC state, then clear them on the source.
    pub export_session: bool,
    /// Delete the device from every source registry.
    pub delete_source_device: bool,
}

impl From<&EngineConfig> for ExportOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            export_session: config.export_session,
            delete_source_device: config.delete_source_device,
        }
    }
}

/// Change applied to the source device after the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    /// Left as is (apart from a cleared claim code, see
    /// [`ExportResult::claim_code_cleared`]).
    Kept,
    SessionCleared,
    Deleted,
}

/// Outcome for one exported device.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    pub device: EndDeviceRecord,
    pub skipped: Vec<SkippedRegistry>,
    pub source_action: SourceAction,
    pub claim_code_cleared: bool,
}

/// Export one device.
pub async fn export_device(
    engine: &Engine,
    ids: &DeviceIdentifiers,
    paths: &[String],
    options: ExportOptions,
    cancel: &CancellationToken,
) -> Result<ExportResult, SyncError> {
    let paths = if options.export_session {
        paths.to_vec()
    } else {
        exclude_fields(paths, NETWORK_SESSION_FIELDS)
    };
    let fetched = engine.get(ids, &paths, cancel).await?;
    let device = fetched.device;

    let source_action = if options.delete_source_device {
        engine.delete(&device.ids, cancel).await?;
        SourceAction::Deleted
    } else if options.export_session {
        engine.clear_session(&device.ids, cancel).await?;
        SourceAction::SessionCleared
    } else {
        SourceAction::Kept
    };

    let claim_code_cleared = source_action != SourceAction::Deleted
        && device.has_populated(CLAIM_AUTHENTICATION_CODE);
    if claim_code_cleared {
        engine
            .update(
                &EndDeviceRecord::new(device.ids.clone()),
                &[],
                &[CLAIM_AUTHENTICATION_CODE.to_string()],
                cancel,
            )
            .await?;
    }

    tracing::info!(device = %device.ids, ?source_action, claim_code_cleared, "exported device");
    Ok(ExportResult {
        device,
        skipped: fetched.skipped,
        source_action,
        claim_code_cleared,
    })
}

/// Export every device in `devices`, one at a time. A failure is recorded
/// against its device and the batch moves on.
pub async fn export_all(
    engine: &Engine,
    devices: &[DeviceIdentifiers],
    paths: &[String],
    options: ExportOptions,
    cancel: &CancellationToken,
) -> Vec<(DeviceIdentifiers, Result<ExportResult, SyncError>)> {
    let mut results = Vec::with_capacity(devices.len());
    for ids in devices {
        let result = export_device(engine, ids, paths, options, cancel).await;
        if let Err(err) = &result {
            tracing::warn!(device = %ids, error = %err, "export failed");
        }
        results.push((ids.clone(), result));
    }
    results
}
