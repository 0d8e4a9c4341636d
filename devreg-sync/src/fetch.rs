//! Two-phase device read.
//!
//! 1. [`Engine::resolve_routing`] reads the identity registry, which also
//!    reports where the other registries live.
//! 2. [`Engine::fetch_remaining`] reads join, application and network in
//!    that order and merges each response into the accumulator.

use tokio_util::sync::CancellationToken;

use devreg_core::field_path::{exclude_fields, sort_dedup};
use devreg_core::ownership::{self, CLAIM_AUTHENTICATION_CODE};
use devreg_core::{DeviceIdentifiers, EndDeviceRecord, PathSplit, Registry};

use crate::engine::{merge_partial, Engine, Fetched, SkippedRegistry};
use crate::error::SyncError;

/// Order of the second phase.
const FETCH_ORDER: [Registry; 3] = [Registry::Join, Registry::Application, Registry::Network];

/// Identity fields that only serve routing and never reach the caller.
const ROUTING_FIELDS: [&str; 3] = [
    "application_server_address",
    "join_server_address",
    "network_server_address",
];

impl Engine {
    /// Read the fields at `requested` from every registry that owns some of
    /// them and return the merged record.
    ///
    /// The identity registry is mandatory. Any other registry without an
    /// address is skipped and reported in [`Fetched::skipped`]. Any other
    /// failure aborts the read.
    pub async fn get(
        &self,
        ids: &DeviceIdentifiers,
        requested: &[String],
        cancel: &CancellationToken,
    ) -> Result<Fetched, SyncError> {
        let mut split = ownership::split(requested);
        for registry in FETCH_ORDER {
            if split.get(registry).is_empty() {
                continue;
            }
            if let Some(path) = registry.server_address_path() {
                split.identity.push(path.to_string());
            }
        }
        sort_dedup(&mut split.identity);

        let mut device = self.resolve_routing(ids, &split.identity, cancel).await?;
        self.apply_claim_precedence(&device, &mut split);
        let skipped = self.fetch_remaining(&mut device, &split, cancel).await?;
        device.unset_prefixed(&ROUTING_FIELDS);

        Ok(Fetched { device, skipped })
    }

    /// Read `paths` from the identity registry and seed the accumulator
    /// with the response.
    pub async fn resolve_routing(
        &self,
        ids: &DeviceIdentifiers,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> Result<EndDeviceRecord, SyncError> {
        let address = self.endpoints.address(Registry::Identity);
        if address.is_empty() {
            return Err(SyncError::IdentityRegistryDisabled);
        }
        let response = self
            .call_get(Registry::Identity, address, ids, paths, cancel)
            .await?;
        let mut device = EndDeviceRecord::new(ids.clone());
        merge_partial(&mut device, Registry::Identity, &response, paths)?;
        Ok(device)
    }

    /// Read the non-identity subsets of `split` into `device`.
    pub async fn fetch_remaining(
        &self,
        device: &mut EndDeviceRecord,
        split: &PathSplit,
        cancel: &CancellationToken,
    ) -> Result<Vec<SkippedRegistry>, SyncError> {
        let mut skipped = Vec::new();
        for registry in FETCH_ORDER {
            let paths = split.get(registry);
            if paths.is_empty() {
                continue;
            }
            let Some(address) = self.route(registry, device) else {
                tracing::warn!(
                    registry = %registry,
                    device = %device.ids,
                    ?paths,
                    "registry is disabled, skipping its fields"
                );
                skipped.push(SkippedRegistry {
                    registry,
                    paths: paths.to_vec(),
                });
                continue;
            };
            let mask = ownership::compact_for(registry, paths);
            let response = self
                .call_get(registry, &address, &device.ids, &mask, cancel)
                .await?;
            merge_partial(device, registry, &response, paths)?;
        }
        Ok(skipped)
    }

    /// Address to read `registry` from, or `None` when it is disabled.
    ///
    /// A disabled registry stays disabled whatever the identity registry
    /// reports. Otherwise the reported address wins over the configured one.
    fn route(&self, registry: Registry, device: &EndDeviceRecord) -> Option<String> {
        let configured = self.endpoints.address(registry);
        if configured.is_empty() {
            return None;
        }
        let reported = registry
            .server_address_path()
            .and_then(|path| device.get(path))
            .and_then(|value| value.as_str())
            .filter(|address| !address.is_empty());
        match reported {
            Some(reported) => {
                if reported != configured {
                    tracing::warn!(
                        registry = %registry,
                        device = %device.ids,
                        configured,
                        reported,
                        "registry address differs from configuration, using reported address"
                    );
                }
                Some(reported.to_string())
            }
            None => Some(configured.to_string()),
        }
    }

    /// Drop the claim authentication code from the join subset when the
    /// identity registry already holds one or claim export is disabled.
    fn apply_claim_precedence(&self, identity: &EndDeviceRecord, split: &mut PathSplit) {
        if split.join.is_empty() {
            return;
        }
        let held_by_identity = identity.has_populated(CLAIM_AUTHENTICATION_CODE);
        if held_by_identity || !self.options.export_claim_authentication_code {
            split.join = exclude_fields(&split.join, &[CLAIM_AUTHENTICATION_CODE]);
        }
    }
}
