// ── Sync orchestration ──
//
// `SyncManager` drives pull and push across every registered device. Each
// device runs in its own task; a device failure is recorded in that
// device's outcome and never stops its siblings. Only the cancellation
// token stops the whole run.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use shellyops_api::TransportConfig;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_VALUES, SyncConfig};
use crate::error::CoreError;
use crate::gateway::{GatewayFactory, HttpGatewayFactory};
use crate::model::{Device, DeviceFile, DeviceIdentity, device_folder};
use crate::outcome::{ClassReport, DeviceOutcome, ResourceClass};
use crate::reconcile::records::{self, Schedules, Webhooks};
use crate::reconcile::{DeviceScope, components, configs, kvs, scripts};
use crate::registry::Registry;
use crate::storage::{LocalStore, StoreError};
use crate::template::{TemplateContext, Values};
use crate::vcs::{GitWorkingCopy, WorkingCopy};

/// Class order on push. Components are pull-only.
const PUSH_ORDER: [ResourceClass; 5] = [
    ResourceClass::Configs,
    ResourceClass::Scripts,
    ResourceClass::Schedules,
    ResourceClass::Webhooks,
    ResourceClass::Kvs,
];

/// Options for [`SyncManager::push`].
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Plan every class and report, without any mutating call.
    pub dry_run: bool,
    /// Values file overriding the configured/default one.
    pub values: Option<PathBuf>,
    /// Device ids or names to push; empty means all.
    pub devices: Vec<String>,
}

// ── SyncManager ─────────────────────────────────────────────────────

/// Entry point for sync operations on one repository.
///
/// Cheaply cloneable; clones share the registry and cancellation token.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    config: SyncConfig,
    registry: Registry,
    store: LocalStore,
    gateways: Arc<dyn GatewayFactory>,
    working_copy: Arc<dyn WorkingCopy>,
    cancel: CancellationToken,
}

impl SyncManager {
    /// Open the repository described by `config`, talking to devices over
    /// HTTP and checking the working copy with git.
    pub async fn open(config: SyncConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::with_timeout(config.timeout);
        let gateways = Arc::new(HttpGatewayFactory::new(&transport)?);
        let working_copy = Arc::new(GitWorkingCopy::new(&config.repo));
        Self::with_parts(config, gateways, working_copy).await
    }

    /// Open with explicit collaborators.
    pub async fn with_parts(
        config: SyncConfig,
        gateways: Arc<dyn GatewayFactory>,
        working_copy: Arc<dyn WorkingCopy>,
    ) -> Result<Self, CoreError> {
        let registry = Registry::load(config.manifest_path()).await?;
        let store = LocalStore::new(&config.repo);
        Ok(Self {
            inner: Arc::new(SyncInner {
                config,
                registry,
                store,
                gateways,
                working_copy,
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    /// Token that cancels every in-flight device task when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    // ── Pull ─────────────────────────────────────────────────────────

    /// Snapshot every registered device into the repository.
    ///
    /// Refuses to run over uncommitted local changes.
    pub async fn pull(&self) -> Result<Vec<DeviceOutcome>, CoreError> {
        if self.inner.working_copy.is_dirty().await? {
            return Err(CoreError::DirtyWorkingCopy);
        }
        let devices = self.inner.registry.devices().await;
        info!(devices = devices.len(), "starting pull");
        Ok(self.fan_out(devices, SyncManager::pull_task).await)
    }

    async fn pull_task(self, device: Device) -> DeviceOutcome {
        let mut outcome = DeviceOutcome::new(&device);
        if let Err(e) = self.pull_device(device, &mut outcome).await {
            fail_device(&mut outcome, e);
        }
        outcome
    }

    async fn pull_device(&self, device: Device, outcome: &mut DeviceOutcome) -> Result<(), CoreError> {
        let gateway = self.inner.gateways.gateway(&device)?;
        let info = gateway
            .device_info()
            .await
            .map_err(|e| CoreError::remote(&device.device_id, e))?;

        let device = match info.display_name() {
            Some(name) if name != device.name => self.rename(&device, name).await?,
            _ => device,
        };
        outcome.name.clone_from(&device.name);

        let store = self.inner.store.device(&device.folder);
        store.ensure_layout().await?;
        store
            .write_device_file(&DeviceFile {
                device_id: device.device_id.clone(),
                name: device.name.clone(),
                model: info.model.clone(),
                firmware: info.ver.clone().or_else(|| info.fw_id.clone()).unwrap_or_default(),
                ip_address: device.ip_address.clone(),
                mac_address: info.mac.clone().unwrap_or_else(|| device.mac_address.clone()),
            })
            .await?;

        let scope = DeviceScope {
            device: &device,
            gateway: gateway.as_ref(),
            store: &store,
        };
        for class in ResourceClass::iter() {
            let result = match class {
                ResourceClass::Configs => configs::pull(&scope).await,
                ResourceClass::Scripts => scripts::pull(&scope).await,
                ResourceClass::Schedules => records::pull(&Schedules, &scope).await,
                ResourceClass::Webhooks => records::pull(&Webhooks, &scope).await,
                ResourceClass::Kvs => kvs::pull(&scope).await,
                ResourceClass::Components => components::pull(&scope).await,
            };
            absorb(outcome, class, result)?;
        }

        self.inner
            .registry
            .touch_last_sync(&device.device_id, Utc::now())
            .await?;
        info!(device = %device.device_id, summary = %outcome.summary(), "pulled device");
        Ok(())
    }

    /// Move the device folder to match a new remote name and record it.
    async fn rename(&self, device: &Device, name: &str) -> Result<Device, CoreError> {
        let folder = device_folder(name, &device.device_id);
        if folder != device.folder {
            match self.inner.store.rename_folder(&device.folder, &folder).await {
                Ok(moved) => debug!(device = %device.device_id, moved, "renamed device folder"),
                Err(StoreError::Invalid { path, .. }) => {
                    return Err(CoreError::FolderConflict {
                        device_id: device.device_id.clone(),
                        to: path,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        let renamed = self
            .inner
            .registry
            .rename_device(&device.device_id, name, &folder)
            .await?;
        info!(device = %device.device_id, from = %device.name, to = %name, "device renamed");
        Ok(renamed)
    }

    // ── Push ─────────────────────────────────────────────────────────

    /// Apply the repository's declared state to the selected devices.
    pub async fn push(&self, options: &PushOptions) -> Result<Vec<DeviceOutcome>, CoreError> {
        let values = Arc::new(self.load_values(options.values.as_deref()).await?);
        let all = self.inner.registry.devices().await;
        let selected = select_devices(&all, &options.devices)?;
        let identities: Arc<Vec<DeviceIdentity>> =
            Arc::new(all.iter().map(DeviceIdentity::from).collect());
        let dry_run = options.dry_run;

        info!(devices = selected.len(), dry_run, "starting push");
        Ok(self
            .fan_out(selected, move |manager, device| {
                manager.push_task(device, Arc::clone(&values), Arc::clone(&identities), dry_run)
            })
            .await)
    }

    async fn push_task(
        self,
        device: Device,
        values: Arc<Values>,
        identities: Arc<Vec<DeviceIdentity>>,
        dry_run: bool,
    ) -> DeviceOutcome {
        let mut outcome = DeviceOutcome::new(&device);
        if let Err(e) = self
            .push_device(device, &values, &identities, dry_run, &mut outcome)
            .await
        {
            fail_device(&mut outcome, e);
        }
        outcome
    }

    async fn push_device(
        &self,
        device: Device,
        values: &Values,
        identities: &[DeviceIdentity],
        dry_run: bool,
        outcome: &mut DeviceOutcome,
    ) -> Result<(), CoreError> {
        let store = self.inner.store.device(&device.folder);
        if !store.exists().await {
            return Err(CoreError::FolderMissing {
                device_id: device.device_id.clone(),
                folder: store.dir().to_path_buf(),
            });
        }
        let ctx = TemplateContext::new(values, &DeviceIdentity::from(&device), identities);
        let gateway = self.inner.gateways.gateway(&device)?;
        let scope = DeviceScope {
            device: &device,
            gateway: gateway.as_ref(),
            store: &store,
        };

        for class in PUSH_ORDER {
            let result = match class {
                ResourceClass::Configs => configs::push(&scope, dry_run).await,
                ResourceClass::Scripts => scripts::push(&scope, dry_run).await,
                ResourceClass::Schedules => records::push(&Schedules, &scope, dry_run).await,
                ResourceClass::Webhooks => records::push(&Webhooks, &scope, dry_run).await,
                ResourceClass::Kvs => kvs::push(&scope, &ctx, dry_run).await,
                ResourceClass::Components => continue,
            };
            absorb(outcome, class, result)?;
        }

        info!(
            device = %device.device_id,
            dry_run,
            summary = %outcome.summary(),
            "pushed device"
        );
        Ok(())
    }

    /// The explicit values file, else the configured one, else
    /// `values.yaml` in the repository if present, else no values.
    async fn load_values(&self, explicit: Option<&Path>) -> Result<Values, CoreError> {
        let config = &self.inner.config;
        if let Some(path) = explicit.or(config.values.as_deref()) {
            return Values::load(&config.resolve(path)).await;
        }
        let default = config.repo.join(DEFAULT_VALUES);
        if tokio::fs::try_exists(&default).await.unwrap_or(false) {
            Values::load(&default).await
        } else {
            Ok(Values::default())
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register the device answering at `host` and create its folder.
    pub async fn add_device(&self, host: &str) -> Result<Device, CoreError> {
        let gateway = self.inner.gateways.connect(host)?;
        let info = gateway
            .device_info()
            .await
            .map_err(|e| CoreError::remote(host, e))?;

        let name = info.display_name().unwrap_or(&info.id).to_owned();
        let last_sync = self
            .inner
            .registry
            .device(&info.id)
            .await
            .and_then(|d| d.last_sync);
        let device = Device {
            folder: device_folder(&name, &info.id),
            device_id: info.id.clone(),
            name,
            ip_address: host.to_owned(),
            mac_address: info.mac.clone().unwrap_or_default(),
            model: info.model.clone(),
            last_sync,
        };

        self.inner.registry.upsert_device(device.clone()).await?;
        self.inner
            .store
            .device(&device.folder)
            .ensure_layout()
            .await?;
        info!(device = %device.device_id, folder = %device.folder, "device registered");
        Ok(device)
    }

    /// Drop a device from the registry. Its folder is left in place.
    pub async fn remove_device(&self, device_id: &str) -> Result<Device, CoreError> {
        let removed = self.inner.registry.remove_device(device_id).await?;
        info!(device = %removed.device_id, "device removed");
        Ok(removed)
    }

    // ── Fan-out ──────────────────────────────────────────────────────

    /// Run `work` for every device concurrently, one task each, and
    /// collect the outcomes in device order.
    async fn fan_out<F, Fut>(&self, devices: Vec<Device>, work: F) -> Vec<DeviceOutcome>
    where
        F: Fn(SyncManager, Device) -> Fut,
        Fut: Future<Output = DeviceOutcome> + Send + 'static,
    {
        let handles: Vec<_> = devices
            .into_iter()
            .map(|device| {
                let cancel = self.inner.cancel.clone();
                let task = work(self.clone(), device.clone());
                let slot = device.clone();
                let handle = tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => DeviceOutcome::failed(&slot, CoreError::Cancelled),
                        outcome = task => outcome,
                    }
                });
                (device, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (device, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(device = %device.device_id, error = %e, "device task aborted");
                    DeviceOutcome::failed(&device, CoreError::Internal(format!("device task aborted: {e}")))
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn fail_device(outcome: &mut DeviceOutcome, error: CoreError) {
    warn!(device = %outcome.device_id, error = %error, "device failed");
    outcome.fail(error);
}

/// Fold a class result into the outcome. Listing failures become warnings
/// unless the device is unreachable, which fails the whole device.
fn absorb(
    outcome: &mut DeviceOutcome,
    class: ResourceClass,
    result: Result<ClassReport, CoreError>,
) -> Result<(), CoreError> {
    match result {
        Ok(report) => {
            outcome
                .warnings
                .extend(report.warnings.iter().map(|w| format!("{class}: {w}")));
            outcome.reports.push(report);
        }
        Err(e) if e.is_unreachable() => return Err(e),
        Err(e) => {
            warn!(device = %outcome.device_id, class = %class, error = %e, "resource class skipped");
            outcome.warnings.push(format!("{class}: {e}"));
            outcome.reports.push(ClassReport::skipped(class, e.to_string()));
        }
    }
    Ok(())
}

/// Devices matching any of `filter` (case-insensitive id or name). Every
/// filter term must match at least one device.
pub fn select_devices(devices: &[Device], filter: &[String]) -> Result<Vec<Device>, CoreError> {
    if filter.is_empty() {
        return Ok(devices.to_vec());
    }
    if let Some(unmatched) = filter.iter().find(|n| !devices.iter().any(|d| d.matches(n))) {
        return Err(CoreError::DeviceNotFound {
            identifier: unmatched.clone(),
        });
    }
    Ok(devices
        .iter()
        .filter(|d| filter.iter().any(|n| d.matches(n)))
        .cloned()
        .collect())
}
