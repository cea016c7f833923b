// ── Scripts ──
//
// A script is metadata (`name`, `enable`) plus source. The device only
// accepts code into a stopped script, so every upload is bracketed by
// stop/start.

use std::collections::{BTreeMap, BTreeSet};

use shellyops_api::ScriptInfo;

use crate::error::CoreError;
use crate::model::{ScriptMeta, ScriptRecord};
use crate::outcome::{ClassReport, ResourceClass};
use crate::storage::{StoreError, WriteStatus};

use super::{DeviceScope, IdClaims, IdPlan};

const CLASS: ResourceClass = ResourceClass::Scripts;

fn key(id: u32) -> String {
    format!("script-{id}")
}

/// Mirror every device script and drop local scripts the device lacks.
pub async fn pull(scope: &DeviceScope<'_>) -> Result<ClassReport, CoreError> {
    let mut report = ClassReport::new(CLASS);
    let remote = scope
        .gateway
        .list_scripts()
        .await
        .map_err(|e| scope.remote(e))?;

    let mut seen = BTreeSet::new();
    for info in &remote {
        // Seen even if the download fails, so the local copy survives.
        seen.insert(info.id);
        let code = match scope.gateway.script_code(info.id).await {
            Ok(code) => code,
            Err(e) => {
                scope.fail(&mut report, key(info.id), scope.remote(e));
                continue;
            }
        };
        let record = ScriptRecord {
            meta: ScriptMeta {
                id: info.id,
                name: info.name.clone(),
                enable: info.enable,
            },
            code,
        };
        match scope.store.write_script(&record).await {
            Ok(WriteStatus::Created) => report.created += 1,
            Ok(WriteStatus::Updated) => report.updated += 1,
            Ok(WriteStatus::Unchanged) => {}
            Err(e) => scope.fail(&mut report, key(info.id), e),
        }
    }

    let local = scope.store.record_ids(CLASS).await?;
    for id in local.difference(&seen) {
        match scope.store.remove_script(*id).await {
            Ok(true) => report.deleted += 1,
            Ok(false) => {}
            Err(e) => scope.fail(&mut report, key(*id), e),
        }
    }
    Ok(report)
}

/// Make the device's scripts match the local set.
pub async fn push(scope: &DeviceScope<'_>, dry_run: bool) -> Result<ClassReport, CoreError> {
    if !scope.store.declares(CLASS).await {
        return Ok(ClassReport::skipped(CLASS, "not declared locally"));
    }
    let mut report = ClassReport::new(CLASS);

    let remote: BTreeMap<u32, ScriptInfo> = scope
        .gateway
        .list_scripts()
        .await
        .map_err(|e| scope.remote(e))?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let remote_ids: BTreeSet<u32> = remote.keys().copied().collect();
    let declared = scope.store.record_ids(CLASS).await?;

    let mut local: BTreeMap<u32, ScriptRecord> = BTreeMap::new();
    for entry in scope.store.list_scripts().await? {
        match entry {
            Ok(record) => {
                local.insert(record.meta.id, record);
            }
            Err(e) => scope.fail(&mut report, e.record_key(), &e),
        }
    }

    let plan = IdPlan::new(local.keys().copied(), &declared, &remote_ids);
    if dry_run {
        plan.count_into(&mut report);
        return Ok(report);
    }

    for id in &plan.delete {
        let running = remote.get(id).is_some_and(|s| s.running);
        match delete(scope, *id, running).await {
            Ok(()) => report.deleted += 1,
            Err(e) => scope.fail(&mut report, key(*id), e),
        }
    }

    let mut claims = IdClaims::default();
    for (id, record) in &local {
        if let Some(info) = remote.get(id) {
            match upload(scope, &mut report, *id, record, info.running).await {
                Ok(()) => report.updated += 1,
                Err(e) => scope.fail(&mut report, key(*id), e),
            }
            continue;
        }

        match scope.gateway.create_script(&record.meta.name).await {
            Ok(new_id) => {
                let mut adopted = record.clone();
                adopted.meta.id = new_id;
                if let Err(e) = adopt(scope, &mut claims, *id, &adopted).await {
                    scope.fail(
                        &mut report,
                        key(new_id),
                        format!("created on device but not saved locally: {e}"),
                    );
                    continue;
                }
                match upload(scope, &mut report, new_id, &adopted, false).await {
                    Ok(()) => report.created += 1,
                    Err(e) => scope.fail(&mut report, key(new_id), e),
                }
            }
            Err(e) => {
                let mut message = scope.remote(e).to_string();
                if claims.is_claimed(*id) {
                    let taken = declared.iter().chain(&remote_ids).chain(local.keys());
                    let spare = claims.spare_id(taken);
                    let mut rescued = record.clone();
                    rescued.meta.id = spare;
                    match scope.store.write_script(&rescued).await {
                        Ok(_) => {
                            claims.claim(spare);
                            message.push_str(&format!("; kept locally as {}", key(spare)));
                        }
                        Err(store_err) => {
                            message.push_str(&format!("; local copy lost: {store_err}"));
                        }
                    }
                }
                scope.fail(&mut report, key(*id), message);
            }
        }
    }
    Ok(report)
}

/// Stop if needed, upload the code, apply metadata, start if enabled.
/// A failed start leaves the upload in place and is only a warning.
async fn upload(
    scope: &DeviceScope<'_>,
    report: &mut ClassReport,
    id: u32,
    record: &ScriptRecord,
    running: bool,
) -> Result<(), CoreError> {
    let gateway = scope.gateway;
    if running {
        gateway.stop_script(id).await.map_err(|e| scope.remote(e))?;
    }
    gateway
        .put_script_code(id, &record.code)
        .await
        .map_err(|e| scope.remote(e))?;
    gateway
        .set_script_config(id, &record.meta.name, record.meta.enable)
        .await
        .map_err(|e| scope.remote(e))?;
    if record.meta.enable {
        if let Err(e) = gateway.start_script(id).await {
            scope.warn(report, key(id), format!("uploaded but not started: {}", scope.remote(e)));
        }
    }
    Ok(())
}

async fn delete(scope: &DeviceScope<'_>, id: u32, running: bool) -> Result<(), CoreError> {
    if running {
        scope
            .gateway
            .stop_script(id)
            .await
            .map_err(|e| scope.remote(e))?;
    }
    scope
        .gateway
        .delete_script(id)
        .await
        .map_err(|e| scope.remote(e))
}

async fn adopt(
    scope: &DeviceScope<'_>,
    claims: &mut IdClaims,
    old: u32,
    adopted: &ScriptRecord,
) -> Result<(), StoreError> {
    let new = adopted.meta.id;
    scope.store.write_script(adopted).await?;
    claims.claim(new);
    if claims.releases(old, new) {
        scope.store.remove_script(old).await?;
    }
    Ok(())
}
