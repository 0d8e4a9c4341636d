//! Error types for devreg-sync.

use thiserror::Error;

use devreg_core::{error::IdentifierConflict, ConfigError, Registry};

/// Failure of a single registry call, as reported by a [`crate::RegistryClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The backend is overloaded or rate limiting.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The backend is temporarily unreachable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend refused the request (bad mask, permission, validation).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The call could not be encoded, sent or decoded.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("cancelled")]
    Cancelled,
}

impl CallError {
    /// Errors the transport retries with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CallError::ResourceExhausted(_) | CallError::Unavailable(_)
        )
    }
}

/// All errors that can arise from engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Two registries disagree on a non-empty identifier.
    #[error(transparent)]
    IdentifierConflict(#[from] IdentifierConflict),

    /// A registry call failed, after retries for transient errors.
    #[error("{registry} registry call failed for [{}]: {source}", .paths.join(", "))]
    Registry {
        registry: Registry,
        paths: Vec<String>,
        #[source]
        source: CallError,
    },

    /// No identity registry address is configured.
    #[error("identity registry address is not configured")]
    IdentityRegistryDisabled,

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Attach the originating registry and field scope to a [`CallError`].
pub(crate) fn registry_err(registry: Registry, paths: &[String], source: CallError) -> SyncError {
    match source {
        CallError::Cancelled => SyncError::Cancelled,
        source => SyncError::Registry {
            registry,
            paths: paths.to_vec(),
            source,
        },
    }
}
