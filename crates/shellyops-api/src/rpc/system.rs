// Shelly namespace: identity, method listing and component configuration
//
// Component discovery is data-driven: every `<Type>.GetConfig` method the
// device advertises marks `<type>` as configurable, and `Shelly.GetConfig`
// supplies the concrete instances. New firmware capabilities therefore show
// up without code changes.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::{ComponentKey, DeviceInfo};

#[derive(Debug, Deserialize)]
struct MethodList {
    #[serde(default)]
    methods: Vec<String>,
}

impl RpcClient {
    /// Device identity.
    ///
    /// `Shelly.GetDeviceInfo`
    pub async fn device_info(&self) -> Result<DeviceInfo, Error> {
        self.call("Shelly.GetDeviceInfo", None).await
    }

    /// Every RPC method the device supports.
    ///
    /// `Shelly.ListMethods`
    pub async fn list_methods(&self) -> Result<Vec<String>, Error> {
        let list: MethodList = self.call("Shelly.ListMethods", None).await?;
        Ok(list.methods)
    }

    /// The full configuration document, keyed by component instance
    /// (`switch:0`, `sys`, `wifi`, ...).
    ///
    /// `Shelly.GetConfig`
    pub async fn shelly_config(&self) -> Result<Map<String, Value>, Error> {
        self.call("Shelly.GetConfig", None).await
    }

    /// Apply a configuration blob to one component instance.
    ///
    /// `<Type>.SetConfig` with `{ id, config }`, or `{ config }` for
    /// singleton components.
    pub async fn set_component_config(
        &self,
        key: &ComponentKey,
        config: &Value,
    ) -> Result<Value, Error> {
        let params = match key.id {
            Some(id) => json!({ "id": id, "config": config }),
            None => json!({ "config": config }),
        };
        debug!(component = %key, "applying component config");
        self.call(&key.set_config_method(), Some(params)).await
    }

    /// Component types with a `<Type>.GetConfig` method, lowercased.
    ///
    /// `Shelly.GetConfig` itself is the aggregate and is not a type.
    pub async fn configurable_types(&self) -> Result<BTreeSet<String>, Error> {
        let methods = self.list_methods().await?;
        Ok(configurable_types_from(&methods))
    }

    /// Discover every configurable component instance with its current
    /// configuration.
    pub async fn component_configs(&self) -> Result<Vec<(ComponentKey, Value)>, Error> {
        let types = self.configurable_types().await?;
        let config = self.shelly_config().await?;

        let mut found: Vec<(ComponentKey, Value)> = config
            .into_iter()
            .map(|(key, value)| (ComponentKey::parse(&key), value))
            .filter(|(key, _)| types.contains(&key.kind))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(count = found.len(), "discovered component configs");
        Ok(found)
    }
}

fn configurable_types_from(methods: &[String]) -> BTreeSet<String> {
    methods
        .iter()
        .filter_map(|m| m.strip_suffix(".GetConfig"))
        .filter(|ns| !ns.eq_ignore_ascii_case("shelly"))
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_config_methods_name_component_types() {
        let methods: Vec<String> = [
            "Shelly.GetConfig",
            "Shelly.ListMethods",
            "Switch.GetConfig",
            "Switch.SetConfig",
            "Sys.GetConfig",
            "Cloud.GetConfig",
            "BTHomeSensor.GetConfig",
            "Script.GetCode",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let types = configurable_types_from(&methods);
        let types: Vec<&str> = types.iter().map(String::as_str).collect();
        assert_eq!(types, ["bthomesensor", "cloud", "switch", "sys"]);
    }
}
