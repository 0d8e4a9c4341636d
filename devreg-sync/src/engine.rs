//! The engine: configuration, pool and transport shared by every operation.
//!
//! Reads live in [`crate::fetch`], writes and deletions in
//! [`crate::mutate`]. This module holds the pieces both use: address
//! resolution, the three call helpers and the partial-record merge.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use devreg_core::{
    ownership, DeviceIdentifiers, EndDeviceRecord, EngineConfig, Endpoints, Registry,
};

use crate::client::Dialer;
use crate::error::{registry_err, SyncError};
use crate::pool::ConnectionPool;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// A registry left out of an operation because it has no address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRegistry {
    pub registry: Registry,
    /// Paths that were not read or written as a result.
    pub paths: Vec<String>,
}

/// Result of [`Engine::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub device: EndDeviceRecord,
    pub skipped: Vec<SkippedRegistry>,
}

/// Result of [`Engine::set`], [`Engine::update`] and [`Engine::clear_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Merged registry responses (or the scoped views, in dry-run mode).
    pub device: EndDeviceRecord,
    pub skipped: Vec<SkippedRegistry>,
}

/// Result of [`Engine::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    /// Registries the device was deleted from, in call order.
    pub registries: Vec<Registry>,
    pub skipped: Vec<Registry>,
}

/// Behaviour switches taken from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub export_claim_authentication_code: bool,
    pub dry_run: bool,
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            export_claim_authentication_code: config.export_claim_authentication_code,
            dry_run: config.dry_run,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    pub(crate) endpoints: Endpoints,
    pub(crate) options: EngineOptions,
    pool: ConnectionPool,
    transport: Transport,
}

impl Engine {
    pub fn new(config: &EngineConfig, dialer: Arc<dyn Dialer>) -> Self {
        Self::with_pool(config, ConnectionPool::new(dialer))
    }

    pub fn with_pool(config: &EngineConfig, pool: ConnectionPool) -> Self {
        Self {
            endpoints: config.endpoints.resolved(),
            options: EngineOptions::from(config),
            pool,
            transport: Transport::from_config(&config.retry),
        }
    }

    /// Resolved endpoints: every empty address filled from the default.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Call helpers
    // -----------------------------------------------------------------------

    // Every attempt dials through the pool, so dial failures share the retry
    // policy and the cancellation race of the call itself.

    pub(crate) async fn call_get(
        &self,
        registry: Registry,
        address: &str,
        ids: &DeviceIdentifiers,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> Result<EndDeviceRecord, SyncError> {
        let pool = &self.pool;
        tracing::debug!(registry = %registry, address, device = %ids, ?paths, "get");
        self.transport
            .call(cancel, move || async move {
                let client = pool.get_or_dial(address).await?;
                client.get(registry, ids, paths).await
            })
            .await
            .map_err(|e| registry_err(registry, paths, e))
    }

    pub(crate) async fn call_set(
        &self,
        registry: Registry,
        address: &str,
        device: &EndDeviceRecord,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> Result<EndDeviceRecord, SyncError> {
        let pool = &self.pool;
        tracing::debug!(registry = %registry, address, device = %device.ids, ?paths, "set");
        self.transport
            .call(cancel, move || async move {
                let client = pool.get_or_dial(address).await?;
                client.set(registry, device, paths).await
            })
            .await
            .map_err(|e| registry_err(registry, paths, e))
    }

    pub(crate) async fn call_delete(
        &self,
        registry: Registry,
        address: &str,
        ids: &DeviceIdentifiers,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let pool = &self.pool;
        tracing::debug!(registry = %registry, address, device = %ids, "delete");
        self.transport
            .call(cancel, move || async move {
                let client = pool.get_or_dial(address).await?;
                client.delete(registry, ids).await
            })
            .await
            .map_err(|e| registry_err(registry, &[], e))
    }
}

/// Merge one registry's response into `acc`.
///
/// Identifiers are checked before anything is written, so a conflict leaves
/// `acc` untouched. Only populated leaves under `paths` that `registry` owns
/// are copied; timestamps are reconciled.
pub(crate) fn merge_partial(
    acc: &mut EndDeviceRecord,
    registry: Registry,
    response: &EndDeviceRecord,
    paths: &[String],
) -> Result<(), SyncError> {
    acc.ids.check_agreement(&response.ids)?;
    let leaves = ownership::owned_populated_leaves(registry, response, paths);
    acc.ids.merge_from(&response.ids);
    acc.set_fields(response, &leaves);
    acc.reconcile_timestamps(response);
    Ok(())
}
