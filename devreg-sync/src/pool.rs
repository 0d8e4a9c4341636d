//! Per-address client cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::{Dialer, RegistryClient};
use crate::error::CallError;

/// Holds at most one client per address for the lifetime of the engine.
pub struct ConnectionPool {
    dialer: Arc<dyn Dialer>,
    clients: Mutex<HashMap<String, Arc<dyn RegistryClient>>>,
}

impl ConnectionPool {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Cached client for `address`, dialing on first use. The lock is held
    /// while dialing so concurrent callers never open two clients for one
    /// address. A failed dial is not cached.
    pub async fn get_or_dial(&self, address: &str) -> Result<Arc<dyn RegistryClient>, CallError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(address) {
            return Ok(client.clone());
        }
        tracing::debug!(address, "dialing registry");
        let client = self.dialer.dial(address).await?;
        clients.insert(address.to_string(), client.clone());
        Ok(client)
    }

    /// Number of cached clients.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn one_client_per_address() {
        let backend = MemoryBackend::new();
        let pool = ConnectionPool::new(Arc::new(backend.clone()));
        pool.get_or_dial("is:1").await.expect("dial");
        pool.get_or_dial("is:1").await.expect("cached");
        pool.get_or_dial("ns:1").await.expect("dial");
        assert_eq!(pool.len().await, 2);
        assert_eq!(backend.dial_count(), 2);
    }

    #[tokio::test]
    async fn failed_dial_is_not_cached() {
        let backend = MemoryBackend::new();
        backend.set_unreachable("ns:1");
        let pool = ConnectionPool::new(Arc::new(backend.clone()));
        let err = match pool.get_or_dial("ns:1").await {
            Err(err) => err,
            Ok(_) => panic!("dial should fail"),
        };
        assert!(err.is_transient());
        assert!(pool.is_empty().await);
    }
}
