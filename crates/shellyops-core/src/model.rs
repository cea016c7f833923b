// ── Domain model ──
//
// Registry entries, device identity and the local representation of
// scripts. Schedules and webhooks reuse the wire types from
// `shellyops_api` since they are stored verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

// ── Registry ────────────────────────────────────────────────────────

/// One registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub folder: String,
    pub ip_address: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl Device {
    /// Case-insensitive match against id or name, as used by `--devices`.
    pub fn matches(&self, needle: &str) -> bool {
        self.device_id.eq_ignore_ascii_case(needle) || self.name.eq_ignore_ascii_case(needle)
    }
}

/// Where the registry's devices were discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_url: Option<String>,
}

/// The `manifest.yaml` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<Discovery>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION.into(),
            discovery: None,
            devices: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    pub fn device_mut(&mut self, device_id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.device_id == device_id)
    }
}

/// Folder name for a device: slug of its name plus its id.
///
/// The slug is lowercased, spaces and underscores become `-`, and anything
/// outside `[a-z0-9.-]` is dropped so the result is safe on every
/// filesystem. A name that slugs to nothing yields just the id.
pub fn device_folder(name: &str, device_id: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
        .collect();
    let slug = slug.trim_matches(|c| c == '-' || c == '.');

    if slug.is_empty() {
        device_id.to_owned()
    } else {
        format!("{slug}-{device_id}")
    }
}

// ── Identity ────────────────────────────────────────────────────────

/// The identity fields templates can reference as `.device` and
/// `.devices.<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub name: String,
    pub model: String,
    pub ip_address: String,
    pub mac_address: String,
    pub folder: String,
}

impl From<&Device> for DeviceIdentity {
    fn from(device: &Device) -> Self {
        Self {
            device_id: device.device_id.clone(),
            name: device.name.clone(),
            model: device.model.clone(),
            ip_address: device.ip_address.clone(),
            mac_address: device.mac_address.clone(),
            folder: device.folder.clone(),
        }
    }
}

/// The `device.yaml` written into each device folder on pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFile {
    pub device_id: String,
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub firmware: String,
    pub ip_address: String,
    #[serde(default)]
    pub mac_address: String,
}

// ── Scripts ─────────────────────────────────────────────────────────

/// `scripts/script-<id>.meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMeta {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub enable: bool,
}

/// A script as stored locally: metadata plus source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub meta: ScriptMeta,
    pub code: String,
}
