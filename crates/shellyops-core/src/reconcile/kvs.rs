// ── Key-value store ──
//
// `kvs/data.json` holds the declared entries. Values may be templates: push
// renders them per device, pull keeps the local template instead of
// overwriting it with the rendered value the device reports.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use shellyops_api::KvsEntry;

use crate::error::CoreError;
use crate::outcome::{ClassReport, ResourceClass};
use crate::template::{TemplateContext, is_templated_value, render_value};

use super::DeviceScope;

const CLASS: ResourceClass = ResourceClass::Kvs;

/// Result of folding remote entries into the local set.
#[derive(Debug, Clone, PartialEq)]
pub struct KvsMerge {
    pub entries: Map<String, Value>,
    pub created: usize,
    pub updated: usize,
    pub preserved: usize,
}

/// Fold `remote` into `local`: templated local values win, other values
/// take the remote side, remote-only keys are added and local-only keys
/// stay as they are.
pub fn merge_pulled(local: Map<String, Value>, remote: &[KvsEntry]) -> KvsMerge {
    let mut merge = KvsMerge {
        entries: local,
        created: 0,
        updated: 0,
        preserved: 0,
    };
    for entry in remote {
        match merge.entries.get(&entry.key) {
            Some(existing) if is_templated_value(existing) => merge.preserved += 1,
            Some(existing) if *existing == entry.value => {}
            Some(_) => {
                merge.entries.insert(entry.key.clone(), entry.value.clone());
                merge.updated += 1;
            }
            None => {
                merge.entries.insert(entry.key.clone(), entry.value.clone());
                merge.created += 1;
            }
        }
    }
    merge
}

pub async fn pull(scope: &DeviceScope<'_>) -> Result<ClassReport, CoreError> {
    let mut report = ClassReport::new(CLASS);
    let remote = scope
        .gateway
        .list_kvs()
        .await
        .map_err(|e| scope.remote(e))?;
    let local = scope.store.load_kvs().await?;
    if local.is_none() && remote.is_empty() {
        // Writing `{}` would declare the class for push.
        return Ok(report);
    }

    let merge = merge_pulled(local.unwrap_or_default(), &remote);
    scope.store.save_kvs(&merge.entries).await?;
    report.created = merge.created;
    report.updated = merge.updated;
    report.preserved = merge.preserved;
    Ok(report)
}

/// Render and write every local entry, then delete remote keys that are
/// not declared locally.
pub async fn push(
    scope: &DeviceScope<'_>,
    ctx: &TemplateContext,
    dry_run: bool,
) -> Result<ClassReport, CoreError> {
    let Some(local) = scope.store.load_kvs().await? else {
        return Ok(ClassReport::skipped(CLASS, "not declared locally"));
    };
    let mut report = ClassReport::new(CLASS);

    let remote: BTreeMap<String, Value> = scope
        .gateway
        .list_kvs()
        .await
        .map_err(|e| scope.remote(e))?
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();

    for (key, value) in &local {
        let rendered = match render_value(value, ctx) {
            Ok(rendered) => rendered.value,
            Err(e) => {
                scope.fail(&mut report, key.as_str(), e);
                continue;
            }
        };
        let exists = remote.contains_key(key);
        if !dry_run {
            if let Err(e) = scope.gateway.kvs_set(key, &rendered).await {
                scope.fail(&mut report, key.as_str(), scope.remote(e));
                continue;
            }
        }
        if exists {
            report.updated += 1;
        } else {
            report.created += 1;
        }
    }

    for key in remote.keys().filter(|k| !local.contains_key(*k)) {
        if !dry_run {
            if let Err(e) = scope.gateway.kvs_delete(key).await {
                scope.fail(&mut report, key.as_str(), scope.remote(e));
                continue;
            }
        }
        report.deleted += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn entry(key: &str, value: Value) -> KvsEntry {
        KvsEntry {
            key: key.into(),
            etag: None,
            value,
        }
    }

    #[test]
    fn pull_keeps_templates_and_takes_remote_literals() {
        let local = json!({
            "api_endpoint": "{{ .api.endpoint }}",
            "device_name": "My Device",
            "update_interval": "300",
        });
        let Value::Object(local) = local else {
            unreachable!()
        };
        let remote = [
            entry("api_endpoint", json!("https://api.example.com")),
            entry("device_name", json!("My Device")),
            entry("update_interval", json!("600")),
            entry("new_key", json!("some value")),
        ];

        let merge = merge_pulled(local, &remote);
        assert_eq!(
            Value::Object(merge.entries),
            json!({
                "api_endpoint": "{{ .api.endpoint }}",
                "device_name": "My Device",
                "update_interval": "600",
                "new_key": "some value",
            })
        );
        assert_eq!((merge.created, merge.updated, merge.preserved), (1, 1, 1));
    }

    #[test]
    fn pull_leaves_local_only_keys() {
        let mut local = Map::new();
        local.insert("only_here".into(), json!(1));
        let merge = merge_pulled(local, &[]);
        assert_eq!(merge.entries.get("only_here"), Some(&json!(1)));
        assert_eq!((merge.created, merge.updated, merge.preserved), (0, 0, 0));
    }
}
