// ── Sync outcomes ──
//
// One `DeviceOutcome` per targeted device, each holding a `ClassReport` per
// resource class. Record-level failures live inside the report; only
// device-level failures flip `success`.

use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::error::CoreError;
use crate::model::Device;

/// The resource classes reconciled per device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResourceClass {
    Configs,
    Scripts,
    Schedules,
    Webhooks,
    Kvs,
    Components,
}

/// A single record that could not be read, rendered or applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub key: String,
    pub message: String,
}

/// What happened to one resource class on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    pub class: ResourceClass,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// KVS entries whose local template was kept over the remote value.
    pub preserved: usize,
    pub failures: Vec<RecordFailure>,
    /// Non-fatal problems; the records involved still count as applied.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Set when the class was not processed at all, with the reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl ClassReport {
    pub fn new(class: ResourceClass) -> Self {
        Self {
            class,
            created: 0,
            updated: 0,
            deleted: 0,
            preserved: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            skipped: None,
        }
    }

    pub fn skipped(class: ResourceClass, reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::new(class)
        }
    }

    pub fn fail(&mut self, key: impl Into<String>, message: impl ToString) {
        self.failures.push(RecordFailure {
            key: key.into(),
            message: message.to_string(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_changes(&self) -> bool {
        self.created + self.updated + self.deleted + self.preserved > 0 || !self.failures.is_empty()
    }

    /// `configs: 3 updated`, `kvs: 1 created, 1 preserved`, or `None` when
    /// nothing happened.
    pub fn summary(&self) -> Option<String> {
        if !self.has_changes() {
            return None;
        }
        let parts: Vec<String> = [
            (self.created, "created"),
            (self.updated, "updated"),
            (self.deleted, "deleted"),
            (self.preserved, "preserved"),
            (self.failures.len(), "failed"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();
        Some(format!("{}: {}", self.class, parts.join(", ")))
    }
}

/// The result of syncing one device.
#[derive(Debug)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub name: String,
    pub success: bool,
    pub error: Option<CoreError>,
    pub reports: Vec<ClassReport>,
    pub warnings: Vec<String>,
}

impl DeviceOutcome {
    pub fn new(device: &Device) -> Self {
        Self {
            device_id: device.device_id.clone(),
            name: device.name.clone(),
            success: true,
            error: None,
            reports: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failed(device: &Device, error: CoreError) -> Self {
        let mut outcome = Self::new(device);
        outcome.fail(error);
        outcome
    }

    pub fn fail(&mut self, error: CoreError) {
        self.success = false;
        self.error = Some(error);
    }

    pub fn report(&self, class: ResourceClass) -> Option<&ClassReport> {
        self.reports.iter().find(|r| r.class == class)
    }

    /// Number of record-level failures across all classes.
    pub fn record_failures(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }

    /// Human-readable summary of the classes that changed.
    pub fn summary(&self) -> String {
        if let Some(err) = &self.error {
            return format!("failed: {err}");
        }
        let parts: Vec<String> = self.reports.iter().filter_map(ClassReport::summary).collect();
        if parts.is_empty() {
            "no changes".into()
        } else {
            parts.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_only_changed_classes() {
        let device = Device {
            device_id: "shelly1-abc".into(),
            name: "Hallway".into(),
            folder: "hallway-shelly1-abc".into(),
            ip_address: "10.0.0.2".into(),
            mac_address: String::new(),
            model: String::new(),
            last_sync: None,
        };
        let mut outcome = DeviceOutcome::new(&device);
        assert_eq!(outcome.summary(), "no changes");

        let mut configs = ClassReport::new(ResourceClass::Configs);
        configs.updated = 3;
        let mut kvs = ClassReport::new(ResourceClass::Kvs);
        kvs.created = 1;
        kvs.preserved = 1;
        outcome.reports = vec![configs, ClassReport::new(ResourceClass::Scripts), kvs];

        assert_eq!(outcome.summary(), "configs: 3 updated; kvs: 1 created, 1 preserved");
    }
}
