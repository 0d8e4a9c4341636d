//! Writes and deletions across registries.
//!
//! Mutations are applied registry by registry without a cross-registry
//! transaction: when a later registry fails, earlier writes stay in place.

use tokio_util::sync::CancellationToken;

use devreg_core::field_path::{add_fields, exclude_fields, to_paths};
use devreg_core::ownership::{self, APPLICATION_SESSION_FIELDS, NETWORK_SESSION_FIELDS};
use devreg_core::record::IDS;
use devreg_core::{DeviceIdentifiers, EndDeviceRecord, PathSplit, Registry};

use crate::engine::{merge_partial, Applied, Deleted, Engine, SkippedRegistry};
use crate::error::SyncError;

const SET_ORDER: [Registry; 4] = [
    Registry::Identity,
    Registry::Join,
    Registry::Network,
    Registry::Application,
];

const DELETE_ORDER: [Registry; 4] = [
    Registry::Application,
    Registry::Network,
    Registry::Join,
    Registry::Identity,
];

/// Per-registry field masks for [`Engine::set`], plus the paths to clear.
///
/// A path in `unset` is left out of the value sent to a registry but stays
/// in that registry's mask, so the registry clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetPaths {
    pub identity: Vec<String>,
    pub network: Vec<String>,
    pub application: Vec<String>,
    pub join: Vec<String>,
    pub unset: Vec<String>,
}

impl SetPaths {
    pub fn from_split(split: PathSplit, unset: Vec<String>) -> Self {
        Self {
            identity: split.identity,
            network: split.network,
            application: split.application,
            join: split.join,
            unset,
        }
    }

    pub fn get(&self, registry: Registry) -> &[String] {
        match registry {
            Registry::Identity => &self.identity,
            Registry::Network => &self.network,
            Registry::Application => &self.application,
            Registry::Join => &self.join,
        }
    }
}

impl Engine {
    /// Write `device` to each registry with a non-empty mask in `paths`, in
    /// the order identity, join, network, application.
    ///
    /// Identity is required only when identity paths are given. Other
    /// registries without an address are skipped and reported. The first
    /// failing registry aborts; writes already made are kept.
    pub async fn set(
        &self,
        device: &EndDeviceRecord,
        paths: &SetPaths,
        cancel: &CancellationToken,
    ) -> Result<Applied, SyncError> {
        if !paths.identity.is_empty() && !self.endpoints.is_enabled(Registry::Identity) {
            return Err(SyncError::IdentityRegistryDisabled);
        }

        let mut applied = EndDeviceRecord::new(device.ids.clone());
        let mut skipped = Vec::new();
        for registry in SET_ORDER {
            let mask = paths.get(registry);
            if mask.is_empty() {
                continue;
            }
            let address = self.endpoints.address(registry);
            if address.is_empty() {
                tracing::warn!(
                    registry = %registry,
                    device = %device.ids,
                    paths = ?mask,
                    "registry is disabled, skipping its fields"
                );
                skipped.push(SkippedRegistry {
                    registry,
                    paths: mask.to_vec(),
                });
                continue;
            }

            let view = device.scoped(&add_fields(&exclude_fields(mask, &paths.unset), &[IDS]));
            let response = if self.options.dry_run {
                tracing::info!(
                    registry = %registry,
                    device = %device.ids,
                    paths = ?mask,
                    "[dry-run] would set fields"
                );
                view
            } else {
                self.call_set(registry, address, &view, mask, cancel).await?
            };
            merge_partial(&mut applied, registry, &response, mask)?;
        }

        Ok(Applied {
            device: applied,
            skipped,
        })
    }

    /// Write `paths` and clear `unset`, routing each path to the registries
    /// that can write it.
    pub async fn update(
        &self,
        device: &EndDeviceRecord,
        paths: &[String],
        unset: &[String],
        cancel: &CancellationToken,
    ) -> Result<Applied, SyncError> {
        let split = ownership::split_writable(&add_fields(paths, unset));
        self.set(device, &SetPaths::from_split(split, unset.to_vec()), cancel)
            .await
    }

    /// Clear sessions and MAC state on the network and application
    /// registries. Clearing an already clear device is a no-op.
    pub async fn clear_session(
        &self,
        ids: &DeviceIdentifiers,
        cancel: &CancellationToken,
    ) -> Result<Applied, SyncError> {
        let network = to_paths(NETWORK_SESSION_FIELDS);
        let application = to_paths(APPLICATION_SESSION_FIELDS);
        let unset = add_fields(&network, &application);
        let paths = SetPaths {
            network,
            application,
            unset,
            ..SetPaths::default()
        };
        self.set(&EndDeviceRecord::new(ids.clone()), &paths, cancel)
            .await
    }

    /// Delete the device from application, network, join and identity, in
    /// that order. Registries without an address are skipped. The first
    /// failure aborts.
    pub async fn delete(
        &self,
        ids: &DeviceIdentifiers,
        cancel: &CancellationToken,
    ) -> Result<Deleted, SyncError> {
        if !self.endpoints.is_enabled(Registry::Identity) {
            return Err(SyncError::IdentityRegistryDisabled);
        }

        let mut deleted = Deleted {
            registries: Vec::new(),
            skipped: Vec::new(),
        };
        for registry in DELETE_ORDER {
            let address = self.endpoints.address(registry);
            if address.is_empty() {
                tracing::warn!(registry = %registry, device = %ids, "registry is disabled, skipping delete");
                deleted.skipped.push(registry);
                continue;
            }
            if self.options.dry_run {
                tracing::info!(registry = %registry, device = %ids, "[dry-run] would delete device");
            } else {
                self.call_delete(registry, address, ids, cancel).await?;
            }
            deleted.registries.push(registry);
        }
        Ok(deleted)
    }
}
