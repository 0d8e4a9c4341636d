//! The unified end device record.
//!
//! Identifiers and provenance timestamps are typed; everything else lives in
//! a JSON document addressed by field path, so a record can hold exactly the
//! fields one registry returned and nothing more.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::field_path::{has_prefix, sort_dedup};
use crate::types::DeviceIdentifiers;

/// Paths the record stores outside of its field document.
pub const IDS: &str = "ids";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// One end device, possibly only partially populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndDeviceRecord {
    #[serde(default)]
    pub ids: DeviceIdentifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EndDeviceRecord {
    pub fn new(ids: DeviceIdentifiers) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    /// Builder-style [`EndDeviceRecord::set`].
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set(path, value.into());
        self
    }

    /// Value stored at `path` in the field document.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut components = path.split('.');
        let first = components.next()?;
        let mut current = self.fields.get(first)?;
        for component in components {
            current = current.as_object()?.get(component)?;
        }
        Some(current)
    }

    /// Store `value` at `path`, replacing non-object intermediates.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut components: Vec<&str> = path.split('.').collect();
        let Some(last) = components.pop() else {
            return;
        };
        let mut map = &mut self.fields;
        for component in components {
            let entry = map
                .entry(component.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                unreachable!("entry was just made an object");
            };
            map = next;
        }
        map.insert(last.to_string(), value);
    }

    /// Remove the value at `path` and prune parents left empty.
    pub fn unset(&mut self, path: &str) {
        let components: Vec<&str> = path.split('.').collect();
        remove_path(&mut self.fields, &components);
    }

    /// Copy the values at `paths` from `source`. A path absent in `source`
    /// is unset here. `ids`, `ids.<name>`, `created_at` and `updated_at`
    /// address the typed fields.
    pub fn set_fields<P: AsRef<str>>(&mut self, source: &EndDeviceRecord, paths: &[P]) {
        for path in paths {
            let path = path.as_ref();
            if path == IDS {
                self.ids = source.ids.clone();
                continue;
            }
            if let Some(name) = path.strip_prefix("ids.") {
                self.ids.copy_field(&source.ids, name);
                continue;
            }
            match path {
                CREATED_AT => self.created_at = source.created_at,
                UPDATED_AT => self.updated_at = source.updated_at,
                _ => match source.get(path) {
                    Some(value) => self.set(path, value.clone()),
                    None => self.unset(path),
                },
            }
        }
    }

    /// A copy holding only the identifiers and the values at `paths`.
    pub fn scoped<P: AsRef<str>>(&self, paths: &[P]) -> EndDeviceRecord {
        let mut view = EndDeviceRecord::new(self.ids.clone());
        view.set_fields(self, paths);
        view
    }

    /// Leaf paths under `paths` that hold a non-zero value, sorted.
    ///
    /// Objects are walked; any other value is a leaf. Zero values (`null`,
    /// `false`, `0`, `""`, empty arrays and objects) are skipped so that a
    /// backend's defaults never overwrite data merged from another backend.
    pub fn populated_leaves<P: AsRef<str>>(&self, paths: &[P]) -> Vec<String> {
        let mut out = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if let Some(value) = self.get(path) {
                collect_populated(path, value, &mut out);
            }
        }
        sort_dedup(&mut out);
        out
    }

    /// `true` when any populated leaf lies at or below `prefix`.
    pub fn has_populated(&self, prefix: &str) -> bool {
        self.get(prefix).is_some_and(|value| !is_zero(value))
    }

    /// Keep the earliest `created_at` and the latest `updated_at`.
    pub fn reconcile_timestamps(&mut self, other: &EndDeviceRecord) {
        self.created_at = match (self.created_at, other.created_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.updated_at = match (self.updated_at, other.updated_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Every populated leaf of the field document, sorted.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (key, value) in &self.fields {
            collect_populated(key, value, &mut out);
        }
        out.sort();
        out
    }

    /// Drop every value at or below one of `prefixes`.
    pub fn unset_prefixed(&mut self, prefixes: &[&str]) {
        let doomed: Vec<String> = self
            .fields
            .keys()
            .filter(|k| prefixes.iter().any(|p| has_prefix(k, p)))
            .cloned()
            .collect();
        for key in doomed {
            self.fields.remove(&key);
        }
        for prefix in prefixes.iter().filter(|p| p.contains('.')) {
            self.unset(prefix);
        }
    }
}

/// Zero value in the sense of a backend default.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_zero),
    }
}

fn collect_populated(path: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_populated(&format!("{path}.{key}"), child, out);
            }
        }
        other if !is_zero(other) => out.push(path.to_string()),
        _ => {}
    }
}

fn remove_path(map: &mut Map<String, Value>, components: &[&str]) {
    match components {
        [] => {}
        [last] => {
            map.remove(*last);
        }
        [first, rest @ ..] => {
            let Some(Value::Object(child)) = map.get_mut(*first) else {
                return;
            };
            remove_path(child, rest);
            if child.is_empty() {
                map.remove(*first);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().expect("valid date")
    }

    #[test]
    fn set_and_get_nested_paths() {
        let mut rec = EndDeviceRecord::default();
        rec.set("mac_settings.rx1_delay", json!(3));
        assert_eq!(rec.get("mac_settings.rx1_delay"), Some(&json!(3)));
        assert_eq!(rec.get("mac_settings"), Some(&json!({"rx1_delay": 3})));
        assert_eq!(rec.get("mac_settings.rx2_frequency"), None);
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut rec = EndDeviceRecord::default().with("session", "garbage");
        rec.set("session.dev_addr", json!("26011FAB"));
        assert_eq!(rec.get("session.dev_addr"), Some(&json!("26011FAB")));
    }

    #[test]
    fn unset_prunes_empty_parents() {
        let mut rec = EndDeviceRecord::default().with("session.keys.app_s_key", "00");
        rec.unset("session.keys.app_s_key");
        assert!(rec.fields.is_empty());
    }

    #[test]
    fn set_fields_copies_and_clears() {
        let source = EndDeviceRecord::default().with("name", "sensor");
        let mut target = EndDeviceRecord::default().with("description", "old");
        target.set_fields(&source, &["name", "description"]);
        assert_eq!(target.get("name"), Some(&json!("sensor")));
        assert_eq!(target.get("description"), None);
    }

    #[test]
    fn set_fields_handles_identifiers() {
        let source = EndDeviceRecord::new(DeviceIdentifiers::new("app", "dev"));
        let mut target = EndDeviceRecord::default();
        target.set_fields(&source, &["ids.device_id"]);
        assert_eq!(target.ids.device_id.0, "dev");
        assert!(target.ids.application_id.is_empty());
    }

    #[test]
    fn populated_leaves_skip_zero_values() {
        let rec = EndDeviceRecord::default()
            .with("mac_settings.rx1_delay", 3)
            .with("mac_settings.rx2_data_rate_index", 0)
            .with("supports_join", false)
            .with("name", "");
        assert_eq!(
            rec.populated_leaves(&["mac_settings", "supports_join", "name", "absent"]),
            vec!["mac_settings.rx1_delay".to_string()]
        );
    }

    #[test]
    fn timestamps_reconcile_in_any_order() {
        let created = [None, Some(ts(2020, 1, 1)), Some(ts(2019, 6, 1))];
        let updated = [Some(ts(2021, 1, 1)), None, Some(ts(2022, 1, 1))];
        let partials: Vec<EndDeviceRecord> = created
            .iter()
            .zip(updated.iter())
            .map(|(c, u)| EndDeviceRecord {
                created_at: *c,
                updated_at: *u,
                ..EndDeviceRecord::default()
            })
            .collect();

        for order in [[0, 1, 2], [2, 1, 0], [1, 2, 0], [1, 0, 2]] {
            let mut acc = EndDeviceRecord::default();
            for i in order {
                acc.reconcile_timestamps(&partials[i]);
            }
            assert_eq!(acc.created_at, Some(ts(2019, 6, 1)));
            assert_eq!(acc.updated_at, Some(ts(2022, 1, 1)));
        }
    }

    #[test]
    fn serde_flattens_field_document() {
        let rec = EndDeviceRecord::new(DeviceIdentifiers::new("app", "dev")).with("name", "x");
        let value = serde_json::to_value(&rec).expect("serialize");
        assert_eq!(value["name"], json!("x"));
        assert_eq!(value["ids"]["device_id"], json!("dev"));
        let back: EndDeviceRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, rec);
    }

    #[test]
    fn unset_prefixed_drops_routing_fields() {
        let mut rec = EndDeviceRecord::default()
            .with("network_server_address", "ns:1234")
            .with("name", "keep");
        rec.unset_prefixed(&["network_server_address", "join_server_address"]);
        assert_eq!(rec.leaf_paths(), vec!["name".to_string()]);
    }
}
