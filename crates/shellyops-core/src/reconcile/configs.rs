// ── Component configs ──

use crate::error::CoreError;
use crate::outcome::{ClassReport, ResourceClass};
use crate::storage::WriteStatus;

use super::{DeviceScope, is_excluded};

const CLASS: ResourceClass = ResourceClass::Configs;

/// Write every discovered component config to `configs/`.
pub async fn pull(scope: &DeviceScope<'_>) -> Result<ClassReport, CoreError> {
    let mut report = ClassReport::new(CLASS);
    let configs = scope
        .gateway
        .component_configs()
        .await
        .map_err(|e| scope.remote(e))?;

    for (key, config) in configs.iter().filter(|(key, _)| !is_excluded(key)) {
        match scope.store.write_config(key, config).await {
            Ok(WriteStatus::Created) => report.created += 1,
            Ok(WriteStatus::Updated) => report.updated += 1,
            Ok(WriteStatus::Unchanged) => {}
            Err(e) => scope.fail(&mut report, key.file_stem(), e),
        }
    }
    Ok(report)
}

/// Apply every `configs/*.json` file. Configs are never created or
/// deleted, so each applied file counts as an update.
pub async fn push(scope: &DeviceScope<'_>, dry_run: bool) -> Result<ClassReport, CoreError> {
    if !scope.store.declares(CLASS).await {
        return Ok(ClassReport::skipped(CLASS, "not declared locally"));
    }
    let mut report = ClassReport::new(CLASS);

    for entry in scope.store.list_configs().await? {
        let (key, config) = match entry {
            Ok(pair) => pair,
            Err(e) => {
                scope.fail(&mut report, e.record_key(), &e);
                continue;
            }
        };
        if is_excluded(&key) {
            continue;
        }
        if dry_run {
            report.updated += 1;
            continue;
        }
        match scope.gateway.set_component_config(&key, &config).await {
            Ok(()) => report.updated += 1,
            Err(e) => {
                let e = scope.remote(e);
                // No listing precedes the writes, so this is where a dead
                // device first shows up.
                if e.is_unreachable() {
                    return Err(e);
                }
                scope.fail(&mut report, key.file_stem(), e);
            }
        }
    }
    Ok(report)
}
