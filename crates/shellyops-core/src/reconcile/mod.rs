// ── Reconciler ──
//
// One module per resource class. Each exposes `pull` (device → files) and,
// where the class is declarative, `push` (files → device). Push first plans
// the create/update/delete actions from the remote and local id sets and
// stops there on a dry run.
//
// Errors returned from these functions are class-level (the listing itself
// failed). Anything scoped to one record is recorded in the `ClassReport`
// and the loop moves on.

pub mod components;
pub mod configs;
pub mod kvs;
pub mod records;
pub mod scripts;

use std::collections::BTreeSet;
use std::fmt::Display;

use shellyops_api::ComponentKey;
use tracing::warn;

use crate::error::CoreError;
use crate::gateway::DeviceGateway;
use crate::model::Device;
use crate::outcome::ClassReport;
use crate::storage::DeviceStore;

/// Component types never synced as configs: `cloud` is managed by the
/// vendor cloud and rejects writes, `script` belongs to the script class.
pub const EXCLUDED_COMPONENTS: &[&str] = &["cloud", "script"];

pub fn is_excluded(key: &ComponentKey) -> bool {
    EXCLUDED_COMPONENTS.contains(&key.kind.as_str())
}

/// Everything a class reconciler needs for one device.
pub struct DeviceScope<'a> {
    pub device: &'a Device,
    pub gateway: &'a dyn DeviceGateway,
    pub store: &'a DeviceStore,
}

impl DeviceScope<'_> {
    pub fn remote(&self, source: shellyops_api::Error) -> CoreError {
        CoreError::remote(&self.device.device_id, source)
    }

    /// Record a record-scoped failure and log it.
    pub(crate) fn fail(&self, report: &mut ClassReport, key: impl Into<String>, error: impl Display) {
        let key = key.into();
        warn!(
            device = %self.device.device_id,
            class = %report.class,
            key = %key,
            error = %error,
            "record failed"
        );
        report.fail(key, error);
    }

    /// Record a problem that leaves the record applied, and log it.
    pub(crate) fn warn(&self, report: &mut ClassReport, key: impl Into<String>, error: impl Display) {
        let key = key.into();
        warn!(
            device = %self.device.device_id,
            class = %report.class,
            key = %key,
            error = %error,
            "record applied with warning"
        );
        report.warn(format!("{key}: {error}"));
    }
}

// ── Planning ────────────────────────────────────────────────────────

/// Create/update/delete decisions for an id-keyed class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPlan {
    pub delete: Vec<u32>,
    pub update: Vec<u32>,
    pub create: Vec<u32>,
}

impl IdPlan {
    /// `valid` are the local records that parsed; `declared` are every id
    /// with a file on disk (a broken file still protects its remote twin
    /// from deletion).
    pub fn new(
        valid: impl IntoIterator<Item = u32>,
        declared: &BTreeSet<u32>,
        remote: &BTreeSet<u32>,
    ) -> Self {
        let valid: BTreeSet<u32> = valid.into_iter().collect();
        Self {
            delete: remote
                .iter()
                .filter(|id| !declared.contains(id) && !valid.contains(id))
                .copied()
                .collect(),
            update: valid.intersection(remote).copied().collect(),
            create: valid.difference(remote).copied().collect(),
        }
    }

    /// Fill `report` with the planned counts, as a dry run reports them.
    pub fn count_into(&self, report: &mut ClassReport) {
        report.deleted = self.delete.len();
        report.updated = self.update.len();
        report.created = self.create.len();
    }
}

/// Ids claimed by records that adopted a device-assigned id during this
/// run. A record moving from `old` to `new` must not delete `old` if some
/// earlier record already claimed it.
#[derive(Debug, Default)]
pub(crate) struct IdClaims {
    claimed: BTreeSet<u32>,
}

impl IdClaims {
    pub(crate) fn claim(&mut self, id: u32) {
        self.claimed.insert(id);
    }

    pub(crate) fn is_claimed(&self, id: u32) -> bool {
        self.claimed.contains(&id)
    }

    /// Whether the file under `old` can be removed after its record moved
    /// to `new`.
    pub(crate) fn releases(&self, old: u32, new: u32) -> bool {
        old != new && !self.is_claimed(old)
    }

    /// An id not used by `taken` nor by any claim.
    pub(crate) fn spare_id<'a>(&self, taken: impl IntoIterator<Item = &'a u32>) -> u32 {
        taken
            .into_iter()
            .copied()
            .chain(self.claimed.iter().copied())
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }
}
