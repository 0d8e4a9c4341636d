//! Static field ownership tables and the path resolver.
//!
//! Each registry owns a fixed set of readable and writable paths. A path in
//! a table also owns everything below it, so tables list a parent only when
//! the whole subtree belongs to that registry (`mac_settings`, `root_keys`);
//! shared subtrees such as `session` are listed leaf by leaf.

use crate::field_path::{has_prefix, is_descendant, sort_dedup};
use crate::field_tree::{compact, FieldTree};
use crate::record::{CREATED_AT, IDS, UPDATED_AT};
use crate::types::Registry;

const IDENTITY_READ: &[&str] = &[
    "activated_at",
    "application_server_address",
    "attributes",
    "claim_authentication_code",
    "claim_authentication_code.valid_from",
    "claim_authentication_code.valid_to",
    "claim_authentication_code.value",
    "description",
    "join_server_address",
    "last_seen_at",
    "locations",
    "name",
    "network_server_address",
    "picture",
    "serial_number",
    "service_profile_id",
    "version_ids",
    "version_ids.band_id",
    "version_ids.brand_id",
    "version_ids.firmware_version",
    "version_ids.hardware_version",
    "version_ids.model_id",
];

const IDENTITY_WRITE: &[&str] = &[
    "application_server_address",
    "attributes",
    "claim_authentication_code",
    "claim_authentication_code.valid_from",
    "claim_authentication_code.valid_to",
    "claim_authentication_code.value",
    "description",
    "join_server_address",
    "locations",
    "name",
    "network_server_address",
    "picture",
    "serial_number",
    "service_profile_id",
    "version_ids",
    "version_ids.band_id",
    "version_ids.brand_id",
    "version_ids.firmware_version",
    "version_ids.hardware_version",
    "version_ids.model_id",
];

const NETWORK_READ: &[&str] = &[
    "battery_percentage",
    "downlink_margin",
    "frequency_plan_id",
    "last_dev_status_received_at",
    "lorawan_phy_version",
    "lorawan_version",
    "mac_settings",
    "mac_settings.adr_margin",
    "mac_settings.class_b_timeout",
    "mac_settings.class_c_timeout",
    "mac_settings.desired_rx1_delay",
    "mac_settings.factory_preset_frequencies",
    "mac_settings.resets_f_cnt",
    "mac_settings.rx1_data_rate_offset",
    "mac_settings.rx1_delay",
    "mac_settings.rx2_data_rate_index",
    "mac_settings.rx2_frequency",
    "mac_settings.supports_32_bit_f_cnt",
    "mac_state",
    "multicast",
    "pending_mac_state",
    "pending_session.dev_addr",
    "pending_session.keys.f_nwk_s_int_key",
    "pending_session.keys.nwk_s_enc_key",
    "pending_session.keys.s_nwk_s_int_key",
    "power_state",
    "session.dev_addr",
    "session.keys.f_nwk_s_int_key",
    "session.keys.nwk_s_enc_key",
    "session.keys.s_nwk_s_int_key",
    "session.last_conf_f_cnt_down",
    "session.last_f_cnt_up",
    "session.last_n_f_cnt_down",
    "session.started_at",
    "supports_class_b",
    "supports_class_c",
    "supports_join",
    "version_ids",
    "version_ids.band_id",
    "version_ids.brand_id",
    "version_ids.firmware_version",
    "version_ids.hardware_version",
    "version_ids.model_id",
];

const NETWORK_WRITE: &[&str] = &[
    "frequency_plan_id",
    "lorawan_phy_version",
    "lorawan_version",
    "mac_settings",
    "mac_settings.adr_margin",
    "mac_settings.class_b_timeout",
    "mac_settings.class_c_timeout",
    "mac_settings.desired_rx1_delay",
    "mac_settings.factory_preset_frequencies",
    "mac_settings.resets_f_cnt",
    "mac_settings.rx1_data_rate_offset",
    "mac_settings.rx1_delay",
    "mac_settings.rx2_data_rate_index",
    "mac_settings.rx2_frequency",
    "mac_settings.supports_32_bit_f_cnt",
    "mac_state",
    "multicast",
    "pending_mac_state",
    "pending_session.dev_addr",
    "pending_session.keys.f_nwk_s_int_key",
    "pending_session.keys.nwk_s_enc_key",
    "pending_session.keys.s_nwk_s_int_key",
    "session.dev_addr",
    "session.keys.f_nwk_s_int_key",
    "session.keys.nwk_s_enc_key",
    "session.keys.s_nwk_s_int_key",
    "session.last_conf_f_cnt_down",
    "session.last_f_cnt_up",
    "session.last_n_f_cnt_down",
    "session.started_at",
    "supports_class_b",
    "supports_class_c",
    "supports_join",
    "version_ids",
    "version_ids.band_id",
    "version_ids.brand_id",
    "version_ids.firmware_version",
    "version_ids.hardware_version",
    "version_ids.model_id",
];

const APPLICATION_READ: &[&str] = &[
    "formatters",
    "formatters.down_formatter",
    "formatters.down_formatter_parameter",
    "formatters.up_formatter",
    "formatters.up_formatter_parameter",
    "pending_session.dev_addr",
    "pending_session.keys.app_s_key",
    "session.dev_addr",
    "session.keys.app_s_key",
    "session.last_a_f_cnt_down",
    "session.started_at",
    "skip_payload_crypto",
    "skip_payload_crypto_override",
    "version_ids",
    "version_ids.band_id",
    "version_ids.brand_id",
    "version_ids.firmware_version",
    "version_ids.hardware_version",
    "version_ids.model_id",
];

const APPLICATION_WRITE: &[&str] = APPLICATION_READ;

const JOIN_READ: &[&str] = &[
    "application_server_id",
    "application_server_kek_label",
    "claim_authentication_code",
    "claim_authentication_code.valid_from",
    "claim_authentication_code.valid_to",
    "claim_authentication_code.value",
    "last_dev_nonce",
    "last_join_nonce",
    "last_rj_count_0",
    "last_rj_count_1",
    "net_id",
    "network_server_kek_label",
    "provisioner_id",
    "provisioning_data",
    "resets_join_nonces",
    "root_keys",
    "root_keys.app_key.key",
    "root_keys.nwk_key.key",
    "used_dev_nonces",
];

const JOIN_WRITE: &[&str] = JOIN_READ;

/// Fields every registry reports structurally rather than by mask.
pub const IMPLICIT_FIELDS: &[&str] = &[IDS, CREATED_AT, UPDATED_AT];

/// Session, activation and MAC state paths, by registry.
pub const NETWORK_SESSION_FIELDS: &[&str] =
    &["mac_state", "pending_mac_state", "pending_session", "session"];
pub const APPLICATION_SESSION_FIELDS: &[&str] = &["pending_session", "session"];

/// Claim authentication code subtree, readable from identity and join.
pub const CLAIM_AUTHENTICATION_CODE: &str = "claim_authentication_code";

/// Readable paths owned by `registry`.
pub fn readable(registry: Registry) -> &'static [&'static str] {
    match registry {
        Registry::Identity => IDENTITY_READ,
        Registry::Network => NETWORK_READ,
        Registry::Application => APPLICATION_READ,
        Registry::Join => JOIN_READ,
    }
}

/// Writable paths owned by `registry`.
pub fn writable(registry: Registry) -> &'static [&'static str] {
    match registry {
        Registry::Identity => IDENTITY_WRITE,
        Registry::Network => NETWORK_WRITE,
        Registry::Application => APPLICATION_WRITE,
        Registry::Join => JOIN_WRITE,
    }
}

/// Every readable path of every registry, sorted and deduplicated.
pub fn all_readable() -> Vec<String> {
    let mut all: Vec<String> = Registry::ALL
        .iter()
        .flat_map(|r| readable(*r).iter().map(|p| p.to_string()))
        .collect();
    sort_dedup(&mut all);
    all
}

/// The subset of `requested` allowed by `allowed`.
///
/// A requested path is kept when it, or one of its ancestors, is allowed.
/// Allowed paths strictly below a requested path are added, so requesting
/// `session` from a registry that owns `session.dev_addr` yields that leaf.
/// The result is sorted and deduplicated.
pub fn allowed_fields<P: AsRef<str>, A: AsRef<str>>(requested: &[P], allowed: &[A]) -> Vec<String> {
    let mut out = Vec::new();
    for path in requested {
        let path = path.as_ref();
        if allowed.iter().any(|a| has_prefix(path, a.as_ref())) {
            out.push(path.to_string());
        }
        out.extend(
            allowed
                .iter()
                .map(AsRef::as_ref)
                .filter(|a| is_descendant(a, path))
                .map(str::to_string),
        );
    }
    sort_dedup(&mut out);
    out
}

/// Paths with `ids`, `ids.*`, `created_at` and `updated_at` removed.
pub fn strip_implicit<P: AsRef<str>>(paths: &[P]) -> Vec<String> {
    paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !IMPLICIT_FIELDS.iter().any(|i| has_prefix(p, i)))
        .map(str::to_string)
        .collect()
}

/// Requested paths partitioned per registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSplit {
    pub identity: Vec<String>,
    pub network: Vec<String>,
    pub application: Vec<String>,
    pub join: Vec<String>,
}

impl PathSplit {
    pub fn get(&self, registry: Registry) -> &[String] {
        match registry {
            Registry::Identity => &self.identity,
            Registry::Network => &self.network,
            Registry::Application => &self.application,
            Registry::Join => &self.join,
        }
    }

    pub fn get_mut(&mut self, registry: Registry) -> &mut Vec<String> {
        match registry {
            Registry::Identity => &mut self.identity,
            Registry::Network => &mut self.network,
            Registry::Application => &mut self.application,
            Registry::Join => &mut self.join,
        }
    }

    pub fn is_empty(&self) -> bool {
        Registry::ALL.iter().all(|r| self.get(*r).is_empty())
    }

    /// Union of all four subsets, sorted and deduplicated.
    pub fn union(&self) -> Vec<String> {
        let mut all: Vec<String> = Registry::ALL
            .iter()
            .flat_map(|r| self.get(*r).iter().cloned())
            .collect();
        sort_dedup(&mut all);
        all
    }
}

/// Split `paths` across the readable tables.
pub fn split<P: AsRef<str>>(paths: &[P]) -> PathSplit {
    split_with(paths, readable)
}

/// Split `paths` across the writable tables.
pub fn split_writable<P: AsRef<str>>(paths: &[P]) -> PathSplit {
    split_with(paths, writable)
}

fn split_with<P: AsRef<str>>(
    paths: &[P],
    table: fn(Registry) -> &'static [&'static str],
) -> PathSplit {
    let stripped = strip_implicit(paths);
    let mut out = PathSplit::default();
    for registry in Registry::ALL {
        *out.get_mut(registry) = allowed_fields(&stripped, table(registry));
    }
    out
}

/// Leaf paths of `response` under `paths` that `registry` owns and that
/// carry a non-zero value.
pub fn owned_populated_leaves(
    registry: Registry,
    response: &crate::record::EndDeviceRecord,
    paths: &[String],
) -> Vec<String> {
    let table = readable(registry);
    response
        .populated_leaves(paths)
        .into_iter()
        .filter(|leaf| table.iter().any(|a| has_prefix(leaf, a)))
        .collect()
}

/// Collapse `paths` against everything `registry` can serve, so a request
/// covering a whole owned subtree is sent as that subtree's root.
///
/// Paths below a table entry that owns its whole subtree (such as
/// `mac_state.recent_uplinks`) are sent unchanged.
pub fn compact_for(registry: Registry, paths: &[String]) -> Vec<String> {
    let mut reference = FieldTree::from_paths(readable(registry));
    let (mut below_leaf, spelled_out): (Vec<String>, Vec<String>) = paths
        .iter()
        .cloned()
        .partition(|path| reference.is_below_leaf(path));
    reference.add(&spelled_out);
    let mut out = compact(&spelled_out, &reference);
    out.append(&mut below_leaf);
    sort_dedup(&mut out);
    out
}
