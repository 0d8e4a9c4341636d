//! In-memory registry backend.
//!
//! Stores one device table per `(address, registry)` pair, records every
//! call, and can inject failures. Used by the engine tests and by anything
//! that wants to exercise the engine without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use devreg_core::{DeviceIdentifiers, EndDeviceRecord, Registry};

use crate::client::{Dialer, RegistryClient};
use crate::error::CallError;

/// Which registry operation a [`CallRecord`] captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Get,
    Set,
    Delete,
}

/// One call observed by the backend, failed attempts included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub address: String,
    pub registry: Registry,
    pub kind: CallKind,
    pub paths: Vec<String>,
}

type TableKey = (String, Registry);

#[derive(Default)]
struct State {
    devices: HashMap<TableKey, HashMap<String, EndDeviceRecord>>,
    failures: HashMap<TableKey, VecDeque<CallError>>,
    dial_failures: HashMap<String, VecDeque<CallError>>,
    unreachable: HashSet<String>,
    calls: Vec<CallRecord>,
    dials: usize,
}

/// Shared handle to the backend state. Clones see the same state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` in `registry` at `address`, replacing any previous copy.
    pub fn put(&self, address: &str, registry: Registry, record: EndDeviceRecord) {
        let key = device_key(&record.ids);
        self.lock()
            .devices
            .entry((address.to_string(), registry))
            .or_default()
            .insert(key, record);
    }

    /// The stored copy of a device, if any.
    pub fn stored(
        &self,
        address: &str,
        registry: Registry,
        ids: &DeviceIdentifiers,
    ) -> Option<EndDeviceRecord> {
        self.lock()
            .devices
            .get(&(address.to_string(), registry))
            .and_then(|table| table.get(&device_key(ids)))
            .cloned()
    }

    /// Fail the next call to `registry` at `address` with `error`. Queued
    /// failures are consumed in order.
    pub fn fail_next(&self, address: &str, registry: Registry, error: CallError) {
        self.lock()
            .failures
            .entry((address.to_string(), registry))
            .or_default()
            .push_back(error);
    }

    /// Fail the next dial of `address` with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next_dial(&self, address: &str, error: CallError) {
        self.lock()
            .dial_failures
            .entry(address.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make dialing `address` fail with a transient error.
    pub fn set_unreachable(&self, address: &str) {
        self.lock().unreachable.insert(address.to_string());
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Registries called, in order, with the given kind.
    pub fn call_order(&self, kind: CallKind) -> Vec<Registry> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.registry)
            .collect()
    }

    pub fn dial_count(&self) -> usize {
        self.lock().dials
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Dialer for MemoryBackend {
    async fn dial(&self, address: &str) -> Result<Arc<dyn RegistryClient>, CallError> {
        let mut state = self.lock();
        state.dials += 1;
        if let Some(error) = state
            .dial_failures
            .get_mut(address)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if state.unreachable.contains(address) {
            return Err(CallError::Unavailable(format!("{address} is unreachable")));
        }
        Ok(Arc::new(MemoryClient {
            address: address.to_string(),
            backend: self.clone(),
        }))
    }
}

/// Client bound to one address of a [`MemoryBackend`].
pub struct MemoryClient {
    address: String,
    backend: MemoryBackend,
}

impl MemoryClient {
    /// Record the call and pop a queued failure, if any.
    fn begin(
        &self,
        state: &mut State,
        registry: Registry,
        kind: CallKind,
        paths: &[String],
    ) -> Result<(), CallError> {
        state.calls.push(CallRecord {
            address: self.address.clone(),
            registry,
            kind,
            paths: paths.to_vec(),
        });
        let key = (self.address.clone(), registry);
        match state.failures.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryClient for MemoryClient {
    async fn get(
        &self,
        registry: Registry,
        ids: &DeviceIdentifiers,
        paths: &[String],
    ) -> Result<EndDeviceRecord, CallError> {
        let mut state = self.backend.lock();
        self.begin(&mut state, registry, CallKind::Get, paths)?;
        let stored = state
            .devices
            .get(&(self.address.clone(), registry))
            .and_then(|table| table.get(&device_key(ids)))
            .ok_or_else(|| CallError::NotFound(format!("{registry} has no device {ids}")))?;
        Ok(response(stored, paths))
    }

    async fn set(
        &self,
        registry: Registry,
        device: &EndDeviceRecord,
        paths: &[String],
    ) -> Result<EndDeviceRecord, CallError> {
        let mut state = self.backend.lock();
        self.begin(&mut state, registry, CallKind::Set, paths)?;
        let table = state
            .devices
            .entry((self.address.clone(), registry))
            .or_default();
        let stored = table
            .entry(device_key(&device.ids))
            .or_insert_with(|| EndDeviceRecord::new(device.ids.clone()));
        stored.ids.merge_from(&device.ids);
        stored.set_fields(device, paths);
        Ok(response(stored, paths))
    }

    async fn delete(&self, registry: Registry, ids: &DeviceIdentifiers) -> Result<(), CallError> {
        let mut state = self.backend.lock();
        self.begin(&mut state, registry, CallKind::Delete, &[])?;
        state
            .devices
            .get_mut(&(self.address.clone(), registry))
            .and_then(|table| table.remove(&device_key(ids)))
            .map(|_| ())
            .ok_or_else(|| CallError::NotFound(format!("{registry} has no device {ids}")))
    }
}

fn device_key(ids: &DeviceIdentifiers) -> String {
    ids.to_string()
}

/// What a registry would answer: identifiers, timestamps and the masked
/// fields.
fn response(stored: &EndDeviceRecord, paths: &[String]) -> EndDeviceRecord {
    let mut out = stored.scoped(paths);
    out.created_at = stored.created_at;
    out.updated_at = stored.updated_at;
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ids() -> DeviceIdentifiers {
        DeviceIdentifiers::new("app1", "d1")
    }

    #[tokio::test]
    async fn get_returns_only_masked_fields() {
        let backend = MemoryBackend::new();
        backend.put(
            "ns:1",
            Registry::Network,
            EndDeviceRecord::new(ids())
                .with("mac_settings.rx1_delay", 3)
                .with("lorawan_version", "MAC_V1_0_3"),
        );
        let client = backend.dial("ns:1").await.expect("dial");
        let got = client
            .get(Registry::Network, &ids(), &["mac_settings".to_string()])
            .await
            .expect("get");
        assert_eq!(got.get("mac_settings.rx1_delay"), Some(&json!(3)));
        assert_eq!(got.get("lorawan_version"), None);
        assert_eq!(got.ids, ids());
    }

    #[tokio::test]
    async fn missing_device_is_not_found() {
        let backend = MemoryBackend::new();
        let client = backend.dial("is:1").await.expect("dial");
        let err = client
            .get(Registry::Identity, &ids(), &[])
            .await
            .expect_err("absent");
        assert!(matches!(err, CallError::NotFound(_)));
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.put("js:1", Registry::Join, EndDeviceRecord::new(ids()));
        backend.fail_next("js:1", Registry::Join, CallError::Unavailable("1".into()));
        backend.fail_next("js:1", Registry::Join, CallError::Rejected("2".into()));
        let client = backend.dial("js:1").await.expect("dial");

        let first = client.get(Registry::Join, &ids(), &[]).await;
        let second = client.get(Registry::Join, &ids(), &[]).await;
        let third = client.get(Registry::Join, &ids(), &[]).await;

        assert_eq!(first, Err(CallError::Unavailable("1".into())));
        assert_eq!(second, Err(CallError::Rejected("2".into())));
        assert!(third.is_ok());
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn set_writes_masked_fields_and_unsets_absent_ones() {
        let backend = MemoryBackend::new();
        backend.put(
            "as:1",
            Registry::Application,
            EndDeviceRecord::new(ids()).with("session.app_s_key", "00"),
        );
        let client = backend.dial("as:1").await.expect("dial");
        let update = EndDeviceRecord::new(ids()).with("formatters.up_formatter", "FORMATTER_JAVASCRIPT");
        client
            .set(
                Registry::Application,
                &update,
                &["formatters".to_string(), "session".to_string()],
            )
            .await
            .expect("set");

        let stored = backend
            .stored("as:1", Registry::Application, &ids())
            .expect("stored");
        assert_eq!(
            stored.get("formatters.up_formatter"),
            Some(&json!("FORMATTER_JAVASCRIPT"))
        );
        assert_eq!(stored.get("session"), None);
    }
}
