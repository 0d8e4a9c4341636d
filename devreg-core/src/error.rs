//! Error types for devreg-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can arise while loading or saving the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so `~/.devreg/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// An explicitly named config file does not exist.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },
}

/// A hex-encoded EUI or device address could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdentifierParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Two registries returned different non-empty values for the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identifier `{field}` mismatch: `{left}` != `{right}`")]
pub struct IdentifierConflict {
    pub field: &'static str,
    pub left: String,
    pub right: String,
}
