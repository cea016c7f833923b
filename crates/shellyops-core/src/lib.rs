// shellyops-core: Declarative device state, templates and pull/push reconciliation.

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod outcome;
pub mod reconcile;
pub mod registry;
pub mod storage;
pub mod sync;
pub mod template;
pub mod vcs;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SyncConfig;
pub use error::CoreError;
pub use gateway::{DeviceGateway, GatewayFactory, HttpGatewayFactory};
pub use model::{Device, DeviceIdentity, Discovery, Manifest};
pub use outcome::{ClassReport, DeviceOutcome, RecordFailure, ResourceClass};
pub use registry::Registry;
pub use storage::{DeviceStore, LocalStore, StoreError};
pub use sync::{PushOptions, SyncManager};
pub use template::{TemplateContext, TemplateError, Values};
pub use vcs::{GitWorkingCopy, WorkingCopy};
