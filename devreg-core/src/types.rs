//! Identifier and registry types shared by every devreg crate.
//!
//! EUIs and device addresses are fixed-size byte arrays that travel as
//! upper-case hex strings; application and device IDs are plain strings where
//! the empty string means "not known".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IdentifierConflict, IdentifierParseError};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ApplicationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ApplicationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed device identifier, unique within its application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A 64-bit extended unique identifier (DevEUI, JoinEUI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Eui64(pub [u8; 8]);

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl FromStr for Eui64 {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

/// A 32-bit LoRaWAN device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevAddr(pub [u8; 4]);

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl FromStr for DevAddr {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], IdentifierParseError> {
    let bytes = hex::decode(s.trim())?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| IdentifierParseError::Length {
        expected: N,
        actual,
    })
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Eui64);
hex_serde!(DevAddr);

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// One of the four backends a device record is sharded across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    /// Naming/identifier metadata and the addresses of the other registries.
    Identity,
    /// MAC settings, sessions and radio parameters.
    Network,
    /// Payload formatters and integration settings.
    Application,
    /// Root keys and join state.
    Join,
}

impl Registry {
    pub const ALL: [Registry; 4] = [
        Registry::Identity,
        Registry::Network,
        Registry::Application,
        Registry::Join,
    ];

    /// Identity-registry field that records where this registry lives.
    pub fn server_address_path(self) -> Option<&'static str> {
        match self {
            Registry::Identity => None,
            Registry::Network => Some("network_server_address"),
            Registry::Application => Some("application_server_address"),
            Registry::Join => Some("join_server_address"),
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Registry::Identity => write!(f, "identity"),
            Registry::Network => write!(f, "network"),
            Registry::Application => write!(f, "application"),
            Registry::Join => write!(f, "join"),
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceIdentifiers
// ---------------------------------------------------------------------------

/// Identifiers of one end device. `application_id` + `device_id` anchor
/// identity; the remaining fields are optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceIdentifiers {
    #[serde(default)]
    pub application_id: ApplicationId,
    #[serde(default)]
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_eui: Option<Eui64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_eui: Option<Eui64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_addr: Option<DevAddr>,
}

impl DeviceIdentifiers {
    pub fn new(application_id: impl Into<ApplicationId>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            application_id: application_id.into(),
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn with_dev_eui(mut self, dev_eui: Eui64) -> Self {
        self.dev_eui = Some(dev_eui);
        self
    }

    pub fn with_join_eui(mut self, join_eui: Eui64) -> Self {
        self.join_eui = Some(join_eui);
        self
    }

    pub fn with_dev_addr(mut self, dev_addr: DevAddr) -> Self {
        self.dev_addr = Some(dev_addr);
        self
    }

    /// Check that every identifier either matches `other` or is empty on at
    /// least one side. Fields are checked in declaration order and the first
    /// conflict is reported.
    pub fn check_agreement(&self, other: &DeviceIdentifiers) -> Result<(), IdentifierConflict> {
        compare(
            "application_id",
            non_empty(&self.application_id.0),
            non_empty(&other.application_id.0),
        )?;
        compare(
            "device_id",
            non_empty(&self.device_id.0),
            non_empty(&other.device_id.0),
        )?;
        compare("dev_eui", self.dev_eui.as_ref(), other.dev_eui.as_ref())?;
        compare("join_eui", self.join_eui.as_ref(), other.join_eui.as_ref())?;
        compare("dev_addr", self.dev_addr.as_ref(), other.dev_addr.as_ref())?;
        Ok(())
    }

    /// Fill every empty identifier from `other`. Callers check agreement first.
    pub fn merge_from(&mut self, other: &DeviceIdentifiers) {
        if self.application_id.is_empty() {
            self.application_id = other.application_id.clone();
        }
        if self.device_id.is_empty() {
            self.device_id = other.device_id.clone();
        }
        self.dev_eui = self.dev_eui.or(other.dev_eui);
        self.join_eui = self.join_eui.or(other.join_eui);
        self.dev_addr = self.dev_addr.or(other.dev_addr);
    }

    /// Copy a single named identifier from `source`. Returns `false` when
    /// `name` is not an identifier field.
    pub fn copy_field(&mut self, source: &DeviceIdentifiers, name: &str) -> bool {
        match name {
            "application_id" => self.application_id = source.application_id.clone(),
            "device_id" => self.device_id = source.device_id.clone(),
            "dev_eui" => self.dev_eui = source.dev_eui,
            "join_eui" => self.join_eui = source.join_eui,
            "dev_addr" => self.dev_addr = source.dev_addr,
            _ => return false,
        }
        true
    }
}

impl fmt::Display for DeviceIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.application_id, self.device_id)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn compare<T: PartialEq + fmt::Display + ?Sized>(
    field: &'static str,
    left: Option<&T>,
    right: Option<&T>,
) -> Result<(), IdentifierConflict> {
    match (left, right) {
        (Some(l), Some(r)) if l != r => Err(IdentifierConflict {
            field,
            left: l.to_string(),
            right: r.to_string(),
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
