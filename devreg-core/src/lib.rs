//! devreg core library — identifiers, the unified device record, field
//! ownership tables, field trees and configuration.
//!
//! - [`types`] — identifier newtypes and [`Registry`]
//! - [`record`] — [`EndDeviceRecord`]
//! - [`field_path`] / [`field_tree`] — path helpers and [`FieldTree`]
//! - [`ownership`] — per-registry tables and the path resolver
//! - [`config`] — `~/.devreg/config.yaml`
//! - [`error`] — [`ConfigError`], [`IdentifierConflict`]

pub mod config;
pub mod error;
pub mod field_path;
pub mod field_tree;
pub mod ownership;
pub mod record;
pub mod types;

pub use config::{EngineConfig, Endpoints, RetryConfig};
pub use error::{ConfigError, IdentifierConflict, IdentifierParseError};
pub use field_tree::FieldTree;
pub use ownership::PathSplit;
pub use record::EndDeviceRecord;
pub use types::{ApplicationId, DevAddr, DeviceId, DeviceIdentifiers, Eui64, Registry};
