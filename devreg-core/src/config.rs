//! Engine configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.devreg/
//!   config.yaml   (mode 0600)
//! ```
//!
//! # API pattern
//!
//! Filesystem functions take an explicit home (`load_at`, `save_at`), used in
//! tests with `TempDir`. `load` derives home from `dirs::home_dir()` and
//! delegates to `load_at`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Registry;

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Registry addresses. An empty address disables that registry; a
/// non-empty `default_address` fills every empty one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub default_address: String,
    pub identity_server_address: String,
    pub network_server_address: String,
    pub application_server_address: String,
    pub join_server_address: String,
}

impl Endpoints {
    /// Configured address for `registry`, falling back to `default_address`.
    /// Empty when the registry is disabled.
    pub fn address(&self, registry: Registry) -> &str {
        let own = match registry {
            Registry::Identity => &self.identity_server_address,
            Registry::Network => &self.network_server_address,
            Registry::Application => &self.application_server_address,
            Registry::Join => &self.join_server_address,
        };
        if own.is_empty() {
            &self.default_address
        } else {
            own
        }
    }

    /// Copy with every empty address filled from `default_address`.
    pub fn resolved(&self) -> Endpoints {
        Endpoints {
            default_address: self.default_address.clone(),
            identity_server_address: self.address(Registry::Identity).to_string(),
            network_server_address: self.address(Registry::Network).to_string(),
            application_server_address: self.address(Registry::Application).to_string(),
            join_server_address: self.address(Registry::Join).to_string(),
        }
    }

    pub fn is_enabled(&self, registry: Registry) -> bool {
        !self.address(registry).is_empty()
    }
}

/// Cooldown and retry parameters for registry calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, including the first.
    pub max_retries: u32,
    /// Linear backoff unit: attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
    /// Minimum spacing between calls; `0` disables the cooldown gate.
    pub cooldown_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_ms: 100,
            cooldown_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn cooldown(&self) -> Option<Duration> {
        (self.cooldown_ms > 0).then(|| Duration::from_millis(self.cooldown_ms))
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoints: Endpoints,
    /// Bearer credential sent with every registry call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// CA bundle handed to the transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    /// Talk plain HTTP instead of TLS.
    pub insecure: bool,
    /// Export sessions and MAC state along with the device.
    pub export_session: bool,
    /// Delete the device from every registry after a successful export.
    pub delete_source_device: bool,
    /// Fetch the claim authentication code from the join registry when the
    /// identity registry does not hold one.
    pub export_claim_authentication_code: bool,
    /// Suppress every mutation and deletion.
    pub dry_run: bool,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            api_key: None,
            ca_file: None,
            insecure: false,
            export_session: false,
            delete_source_device: false,
            export_claim_authentication_code: true,
            dry_run: false,
            retry: RetryConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.devreg/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".devreg").join("config.yaml")
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load `<home>/.devreg/config.yaml`, or defaults when the file is absent.
///
/// Returns `ConfigError::Parse` (with path + line context) if malformed.
pub fn load_at(home: &Path) -> Result<EngineConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    load_from(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<EngineConfig, ConfigError> {
    load_at(&home()?)
}

/// Load an explicitly named config file. Unlike [`load_at`], a missing file
/// is an error.
pub fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save `config` to `<home>/.devreg/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &EngineConfig) -> Result<(), ConfigError> {
    let path = config_path_at(home);
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_file_name("config.yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
