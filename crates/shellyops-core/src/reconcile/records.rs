// ── Id-keyed records (schedules, webhooks) ──
//
// Both classes are flat JSON records whose id the device assigns on
// create. The diff-and-apply loop is shared; `RecordOps` supplies the
// class-specific calls.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use shellyops_api::{Error, Schedule, Webhook};

use crate::error::CoreError;
use crate::gateway::DeviceGateway;
use crate::outcome::{ClassReport, ResourceClass};
use crate::storage::{DeviceStore, StoreError, WriteStatus};

use super::{DeviceScope, IdClaims, IdPlan};

type LocalRecords<R> = Vec<Result<(u32, R), StoreError>>;

/// Remote and local operations for one id-keyed class.
#[async_trait]
pub trait RecordOps: Send + Sync {
    type Record: Send + Sync;

    const CLASS: ResourceClass;
    /// File and report key prefix (`schedule-3`).
    const PREFIX: &'static str;

    fn id(record: &Self::Record) -> Option<u32>;

    async fn list_remote(&self, gateway: &dyn DeviceGateway) -> Result<Vec<Self::Record>, Error>;
    async fn create(&self, gateway: &dyn DeviceGateway, record: &Self::Record) -> Result<u32, Error>;
    async fn update(
        &self,
        gateway: &dyn DeviceGateway,
        id: u32,
        record: &Self::Record,
    ) -> Result<(), Error>;
    async fn delete(&self, gateway: &dyn DeviceGateway, id: u32) -> Result<(), Error>;

    async fn list_local(&self, store: &DeviceStore) -> Result<LocalRecords<Self::Record>, StoreError>;
    async fn write_local(
        &self,
        store: &DeviceStore,
        id: u32,
        record: &Self::Record,
    ) -> Result<WriteStatus, StoreError>;
    async fn remove_local(&self, store: &DeviceStore, id: u32) -> Result<bool, StoreError>;
}

fn key<O: RecordOps>(id: u32) -> String {
    format!("{}-{id}", O::PREFIX)
}

// ── Pull ────────────────────────────────────────────────────────────

/// Mirror every remote record locally and drop local files for records
/// the device no longer has.
pub async fn pull<O: RecordOps>(ops: &O, scope: &DeviceScope<'_>) -> Result<ClassReport, CoreError> {
    let mut report = ClassReport::new(O::CLASS);
    let remote = ops
        .list_remote(scope.gateway)
        .await
        .map_err(|e| scope.remote(e))?;

    let mut seen = BTreeSet::new();
    for record in &remote {
        let Some(id) = O::id(record) else {
            scope.fail(&mut report, format!("{}-?", O::PREFIX), "device returned a record without an id");
            continue;
        };
        seen.insert(id);
        match ops.write_local(scope.store, id, record).await {
            Ok(WriteStatus::Created) => report.created += 1,
            Ok(WriteStatus::Updated) => report.updated += 1,
            Ok(WriteStatus::Unchanged) => {}
            Err(e) => scope.fail(&mut report, key::<O>(id), e),
        }
    }

    let local = scope.store.record_ids(O::CLASS).await?;
    for id in local.difference(&seen) {
        match ops.remove_local(scope.store, *id).await {
            Ok(true) => report.deleted += 1,
            Ok(false) => {}
            Err(e) => scope.fail(&mut report, key::<O>(*id), e),
        }
    }
    Ok(report)
}

// ── Push ────────────────────────────────────────────────────────────

/// Make the device's record set match the local one: delete remote-only
/// records, update matching ids, create the rest and adopt their new ids.
pub async fn push<O: RecordOps>(
    ops: &O,
    scope: &DeviceScope<'_>,
    dry_run: bool,
) -> Result<ClassReport, CoreError> {
    let mut report = ClassReport::new(O::CLASS);
    if !scope.store.declares(O::CLASS).await {
        return Ok(ClassReport::skipped(O::CLASS, "not declared locally"));
    }

    let remote: BTreeSet<u32> = ops
        .list_remote(scope.gateway)
        .await
        .map_err(|e| scope.remote(e))?
        .iter()
        .filter_map(O::id)
        .collect();
    let declared = scope.store.record_ids(O::CLASS).await?;

    let mut local: BTreeMap<u32, O::Record> = BTreeMap::new();
    for entry in ops.list_local(scope.store).await? {
        match entry {
            Ok((id, record)) => {
                local.insert(id, record);
            }
            Err(e) => scope.fail(&mut report, e.record_key(), &e),
        }
    }

    let plan = IdPlan::new(local.keys().copied(), &declared, &remote);
    if dry_run {
        plan.count_into(&mut report);
        return Ok(report);
    }

    for id in &plan.delete {
        match ops.delete(scope.gateway, *id).await {
            Ok(()) => report.deleted += 1,
            Err(e) => scope.fail(&mut report, key::<O>(*id), scope.remote(e)),
        }
    }

    let mut claims = IdClaims::default();
    for (id, record) in &local {
        if remote.contains(id) {
            match ops.update(scope.gateway, *id, record).await {
                Ok(()) => report.updated += 1,
                Err(e) => scope.fail(&mut report, key::<O>(*id), scope.remote(e)),
            }
            continue;
        }

        match ops.create(scope.gateway, record).await {
            Ok(new_id) => match adopt(ops, scope, &mut claims, *id, new_id, record).await {
                Ok(()) => report.created += 1,
                Err(e) => scope.fail(
                    &mut report,
                    key::<O>(new_id),
                    format!("created on device but not saved locally: {e}"),
                ),
            },
            Err(e) => {
                let mut message = scope.remote(e).to_string();
                if claims.is_claimed(*id) {
                    // Another record adopted this id and overwrote the file.
                    let taken = declared.iter().chain(&remote).chain(local.keys());
                    let spare = claims.spare_id(taken);
                    match ops.write_local(scope.store, spare, record).await {
                        Ok(_) => {
                            claims.claim(spare);
                            message.push_str(&format!("; kept locally as {}", key::<O>(spare)));
                        }
                        Err(store_err) => {
                            message.push_str(&format!("; local copy lost: {store_err}"));
                        }
                    }
                }
                scope.fail(&mut report, key::<O>(*id), message);
            }
        }
    }
    Ok(report)
}

/// Persist a created record under its device-assigned id.
async fn adopt<O: RecordOps>(
    ops: &O,
    scope: &DeviceScope<'_>,
    claims: &mut IdClaims,
    old: u32,
    new: u32,
    record: &O::Record,
) -> Result<(), StoreError> {
    ops.write_local(scope.store, new, record).await?;
    claims.claim(new);
    if claims.releases(old, new) {
        ops.remove_local(scope.store, old).await?;
    }
    Ok(())
}

// ── Schedules ───────────────────────────────────────────────────────

pub struct Schedules;

#[async_trait]
impl RecordOps for Schedules {
    type Record = Schedule;

    const CLASS: ResourceClass = ResourceClass::Schedules;
    const PREFIX: &'static str = "schedule";

    fn id(record: &Schedule) -> Option<u32> {
        record.id
    }

    async fn list_remote(&self, gateway: &dyn DeviceGateway) -> Result<Vec<Schedule>, Error> {
        gateway.list_schedules().await
    }

    async fn create(&self, gateway: &dyn DeviceGateway, record: &Schedule) -> Result<u32, Error> {
        gateway.create_schedule(record).await
    }

    async fn update(&self, gateway: &dyn DeviceGateway, id: u32, record: &Schedule) -> Result<(), Error> {
        gateway.update_schedule(id, record).await
    }

    async fn delete(&self, gateway: &dyn DeviceGateway, id: u32) -> Result<(), Error> {
        gateway.delete_schedule(id).await
    }

    async fn list_local(&self, store: &DeviceStore) -> Result<LocalRecords<Schedule>, StoreError> {
        store.list_schedules().await
    }

    async fn write_local(
        &self,
        store: &DeviceStore,
        id: u32,
        record: &Schedule,
    ) -> Result<WriteStatus, StoreError> {
        store.write_schedule(id, record).await
    }

    async fn remove_local(&self, store: &DeviceStore, id: u32) -> Result<bool, StoreError> {
        store.remove_schedule(id).await
    }
}

// ── Webhooks ────────────────────────────────────────────────────────

pub struct Webhooks;

#[async_trait]
impl RecordOps for Webhooks {
    type Record = Webhook;

    const CLASS: ResourceClass = ResourceClass::Webhooks;
    const PREFIX: &'static str = "webhook";

    fn id(record: &Webhook) -> Option<u32> {
        record.id
    }

    async fn list_remote(&self, gateway: &dyn DeviceGateway) -> Result<Vec<Webhook>, Error> {
        gateway.list_webhooks().await
    }

    async fn create(&self, gateway: &dyn DeviceGateway, record: &Webhook) -> Result<u32, Error> {
        gateway.create_webhook(record).await
    }

    async fn update(&self, gateway: &dyn DeviceGateway, id: u32, record: &Webhook) -> Result<(), Error> {
        gateway.update_webhook(id, record).await
    }

    async fn delete(&self, gateway: &dyn DeviceGateway, id: u32) -> Result<(), Error> {
        gateway.delete_webhook(id).await
    }

    async fn list_local(&self, store: &DeviceStore) -> Result<LocalRecords<Webhook>, StoreError> {
        store.list_webhooks().await
    }

    async fn write_local(
        &self,
        store: &DeviceStore,
        id: u32,
        record: &Webhook,
    ) -> Result<WriteStatus, StoreError> {
        store.write_webhook(id, record).await
    }

    async fn remove_local(&self, store: &DeviceStore, id: u32) -> Result<bool, StoreError> {
        store.remove_webhook(id).await
    }
}
