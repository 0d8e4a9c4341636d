//! # devreg-sync
//!
//! Reads, writes and deletes end devices whose fields are sharded across
//! four registries (identity, network, application, join).
//!
//! Build an [`Engine`] from an [`devreg_core::EngineConfig`] and a
//! [`Dialer`], then call [`Engine::get`], [`Engine::set`],
//! [`Engine::update`], [`Engine::delete`] or [`Engine::clear_session`].
//! [`pipeline`] layers the device export flow on top.

pub mod client;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod memory;
pub mod mutate;
pub mod pipeline;
pub mod pool;
pub mod transport;

pub use client::{Dialer, RegistryClient};
pub use engine::{Applied, Deleted, Engine, EngineOptions, Fetched, SkippedRegistry};
pub use error::{CallError, SyncError};
pub use mutate::SetPaths;
pub use pipeline::{export_all, export_device, ExportOptions, ExportResult, SourceAction};
pub use pool::ConnectionPool;
pub use transport::{RetryPolicy, Transport};
