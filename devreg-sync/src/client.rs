//! The registry RPC surface the engine talks to.
//!
//! One client serves every registry reachable at its address; the
//! [`Registry`] argument selects the service.

use std::sync::Arc;

use async_trait::async_trait;

use devreg_core::{DeviceIdentifiers, EndDeviceRecord, Registry};

use crate::error::CallError;

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch the fields at `paths` of one device.
    async fn get(
        &self,
        registry: Registry,
        ids: &DeviceIdentifiers,
        paths: &[String],
    ) -> Result<EndDeviceRecord, CallError>;

    /// Write the fields at `paths` from `device` and return the stored values.
    async fn set(
        &self,
        registry: Registry,
        device: &EndDeviceRecord,
        paths: &[String],
    ) -> Result<EndDeviceRecord, CallError>;

    async fn delete(&self, registry: Registry, ids: &DeviceIdentifiers) -> Result<(), CallError>;
}

/// Opens clients by address.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, address: &str) -> Result<Arc<dyn RegistryClient>, CallError>;
}
