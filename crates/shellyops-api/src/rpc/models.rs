// Wire types for the Shelly JSON-RPC API
//
// Schedules, webhooks and components keep unknown fields in a flattened
// `extra` map so a pull/push round trip never drops data newer firmware adds.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Identity ────────────────────────────────────────────────────────

/// Response of `Shelly.GetDeviceInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default, rename = "gen")]
    pub generation: Option<u8>,
    #[serde(default)]
    pub fw_id: Option<String>,
    #[serde(default)]
    pub ver: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub auth_en: bool,
    #[serde(default)]
    pub auth_domain: Option<String>,
}

impl DeviceInfo {
    /// The user-assigned name, or `None` when unset or blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.trim().is_empty())
    }
}

// ── Scripts ─────────────────────────────────────────────────────────

/// One entry of `Script.List`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub running: bool,
}

// ── Schedules ───────────────────────────────────────────────────────

/// A schedule job (`Schedule.List` → `jobs[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub timespec: String,
    #[serde(default)]
    pub calls: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Webhooks ────────────────────────────────────────────────────────

/// A webhook (`Webhook.List` → `hooks[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub cid: i64,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── KVS ─────────────────────────────────────────────────────────────

/// One key-value store item from `KVS.GetMany`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvsEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub value: Value,
}

// ── Components ──────────────────────────────────────────────────────

/// One entry of `Shelly.GetComponents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A component instance key: a type plus an optional numeric id.
///
/// On the wire it is `switch:0` or `sys`; on disk the `:` becomes `-` so
/// the key is usable as a file stem (`switch-0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub kind: String,
    pub id: Option<u32>,
}

impl ComponentKey {
    pub fn new(kind: impl Into<String>, id: Option<u32>) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Parse a wire key such as `switch:0`, `sys` or `bthomesensor:200`.
    ///
    /// A non-numeric suffix is kept as part of the type (`foo:bar` has no id).
    pub fn parse(key: &str) -> Self {
        match key.split_once(':') {
            Some((kind, id)) => match id.parse() {
                Ok(id) => Self::new(kind, Some(id)),
                Err(_) => Self::new(key, None),
            },
            None => Self::new(key, None),
        }
    }

    /// Parse a file stem such as `switch-0` or `sys`.
    ///
    /// Only a numeric suffix after the *last* `-` is an id, so
    /// `plugs_ui` and `ble-gw` stay id-less.
    pub fn from_file_stem(stem: &str) -> Self {
        match stem.rsplit_once('-') {
            Some((kind, id)) if !kind.is_empty() => match id.parse() {
                Ok(id) => Self::new(kind, Some(id)),
                Err(_) => Self::new(stem, None),
            },
            _ => Self::new(stem, None),
        }
    }

    /// File stem used in the repository (`switch-0`).
    pub fn file_stem(&self) -> String {
        match self.id {
            Some(id) => format!("{}-{id}", self.kind),
            None => self.kind.clone(),
        }
    }

    /// RPC namespace for this component type (`switch` → `Switch`).
    pub fn namespace(&self) -> String {
        let mut chars = self.kind.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// `<Namespace>.SetConfig`.
    pub fn set_config_method(&self) -> String {
        format!("{}.SetConfig", self.namespace())
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}:{id}", self.kind),
            None => f.write_str(&self.kind),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn component_key_parses_wire_and_file_forms() {
        assert_eq!(
            ComponentKey::parse("switch:0"),
            ComponentKey::new("switch", Some(0))
        );
        assert_eq!(ComponentKey::parse("sys"), ComponentKey::new("sys", None));
        assert_eq!(
            ComponentKey::from_file_stem("switch-0"),
            ComponentKey::new("switch", Some(0))
        );
        assert_eq!(
            ComponentKey::from_file_stem("plugs_ui"),
            ComponentKey::new("plugs_ui", None)
        );
        assert_eq!(
            ComponentKey::from_file_stem("ble-gw"),
            ComponentKey::new("ble-gw", None)
        );
    }

    #[test]
    fn component_key_method_and_stem() {
        let key = ComponentKey::new("switch", Some(1));
        assert_eq!(key.set_config_method(), "Switch.SetConfig");
        assert_eq!(key.file_stem(), "switch-1");
        assert_eq!(key.to_string(), "switch:1");

        let sys = ComponentKey::new("sys", None);
        assert_eq!(sys.set_config_method(), "Sys.SetConfig");
        assert_eq!(sys.file_stem(), "sys");
    }

    #[test]
    fn schedule_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "id": 3,
            "enable": true,
            "timespec": "0 0 7 * * MON-FRI",
            "calls": [{ "method": "Switch.Set", "params": { "id": 0, "on": true } }],
            "origin": "shelly_app"
        });
        let schedule: Schedule = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(schedule.id, Some(3));
        assert_eq!(schedule.extra.get("origin"), Some(&Value::from("shelly_app")));
        assert_eq!(serde_json::to_value(&schedule).unwrap(), raw);
    }
}
