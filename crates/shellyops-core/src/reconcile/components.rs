// ── Virtual components & groups ──
//
// Pull-only: the device reports them through `Shelly.GetComponents` and
// they are snapshotted as-is.

use shellyops_api::{ComponentInfo, ComponentKey};

use crate::error::CoreError;
use crate::outcome::{ClassReport, ResourceClass};
use crate::storage::WriteStatus;

use super::DeviceScope;

const CLASS: ResourceClass = ResourceClass::Components;

/// Component types written to `virtual-components/`.
pub const VIRTUAL_TYPES: &[&str] = &["boolean", "number", "text", "enum", "button"];

pub const GROUP_TYPE: &str = "group";

pub async fn pull(scope: &DeviceScope<'_>) -> Result<ClassReport, CoreError> {
    let mut report = ClassReport::new(CLASS);
    let components = scope
        .gateway
        .list_components()
        .await
        .map_err(|e| scope.remote(e))?;

    for component in components.iter().filter(|c| is_tracked(c)) {
        let key = ComponentKey::parse(&component.key);
        let Some(id) = key.id else {
            scope.fail(&mut report, component.key.as_str(), "component id is not numeric");
            continue;
        };

        let blob = match serde_json::to_value(component) {
            Ok(blob) => blob,
            Err(e) => {
                scope.fail(&mut report, component.key.as_str(), e);
                continue;
            }
        };
        let written = if key.kind == GROUP_TYPE {
            scope.store.write_group(id, &blob).await
        } else {
            scope.store.write_virtual_component(&key, &blob).await
        };
        match written {
            Ok(WriteStatus::Created) => report.created += 1,
            Ok(WriteStatus::Updated) => report.updated += 1,
            Ok(WriteStatus::Unchanged) => {}
            Err(e) => scope.fail(&mut report, component.key.as_str(), e),
        }
    }
    Ok(report)
}

/// Whether `component` is something this class snapshots.
pub fn is_tracked(component: &ComponentInfo) -> bool {
    let kind = component
        .key
        .split_once(':')
        .map_or(component.key.as_str(), |(kind, _)| kind);
    kind == GROUP_TYPE || VIRTUAL_TYPES.contains(&kind)
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn component(key: &str) -> ComponentInfo {
        ComponentInfo {
            key: key.into(),
            status: None,
            config: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn tracks_virtual_types_and_groups() {
        assert!(is_tracked(&component("boolean:200")));
        assert!(is_tracked(&component("group:201")));
        assert!(is_tracked(&component("text:abc")));
        assert!(!is_tracked(&component("switch:0")));
    }
}
