// ── Resource gateway ──
//
// The seam between reconciliation and the device. `DeviceGateway` lists
// the per-class remote operations the reconciler needs; `RpcClient`
// implements it over HTTP, and tests substitute an in-memory device.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shellyops_api::{
    ComponentInfo, ComponentKey, DeviceInfo, Error, KvsEntry, RpcClient, RpcConnector, Schedule,
    ScriptInfo, TransportConfig, Webhook,
};

use crate::error::CoreError;
use crate::model::Device;

/// Remote operations on one device, grouped by resource class.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    // ── Identity & configs ───────────────────────────────────────────
    async fn device_info(&self) -> Result<DeviceInfo, Error>;
    /// Every configurable component instance with its configuration.
    async fn component_configs(&self) -> Result<Vec<(ComponentKey, Value)>, Error>;
    async fn set_component_config(&self, key: &ComponentKey, config: &Value) -> Result<(), Error>;

    // ── Scripts ──────────────────────────────────────────────────────
    async fn list_scripts(&self) -> Result<Vec<ScriptInfo>, Error>;
    async fn script_code(&self, id: u32) -> Result<String, Error>;
    async fn put_script_code(&self, id: u32, code: &str) -> Result<(), Error>;
    async fn create_script(&self, name: &str) -> Result<u32, Error>;
    async fn set_script_config(&self, id: u32, name: &str, enable: bool) -> Result<(), Error>;
    async fn start_script(&self, id: u32) -> Result<(), Error>;
    async fn stop_script(&self, id: u32) -> Result<(), Error>;
    async fn delete_script(&self, id: u32) -> Result<(), Error>;

    // ── Schedules ────────────────────────────────────────────────────
    async fn list_schedules(&self) -> Result<Vec<Schedule>, Error>;
    async fn create_schedule(&self, schedule: &Schedule) -> Result<u32, Error>;
    async fn update_schedule(&self, id: u32, schedule: &Schedule) -> Result<(), Error>;
    async fn delete_schedule(&self, id: u32) -> Result<(), Error>;

    // ── Webhooks ─────────────────────────────────────────────────────
    async fn list_webhooks(&self) -> Result<Vec<Webhook>, Error>;
    async fn create_webhook(&self, hook: &Webhook) -> Result<u32, Error>;
    async fn update_webhook(&self, id: u32, hook: &Webhook) -> Result<(), Error>;
    async fn delete_webhook(&self, id: u32) -> Result<(), Error>;

    // ── KVS ──────────────────────────────────────────────────────────
    async fn list_kvs(&self) -> Result<Vec<KvsEntry>, Error>;
    async fn kvs_set(&self, key: &str, value: &Value) -> Result<(), Error>;
    async fn kvs_delete(&self, key: &str) -> Result<(), Error>;

    // ── Components ───────────────────────────────────────────────────
    async fn list_components(&self) -> Result<Vec<ComponentInfo>, Error>;
}

#[async_trait]
impl DeviceGateway for RpcClient {
    async fn device_info(&self) -> Result<DeviceInfo, Error> {
        RpcClient::device_info(self).await
    }

    async fn component_configs(&self) -> Result<Vec<(ComponentKey, Value)>, Error> {
        RpcClient::component_configs(self).await
    }

    async fn set_component_config(&self, key: &ComponentKey, config: &Value) -> Result<(), Error> {
        RpcClient::set_component_config(self, key, config)
            .await
            .map(|_| ())
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptInfo>, Error> {
        RpcClient::list_scripts(self).await
    }

    async fn script_code(&self, id: u32) -> Result<String, Error> {
        RpcClient::script_code(self, id).await
    }

    async fn put_script_code(&self, id: u32, code: &str) -> Result<(), Error> {
        RpcClient::put_script_code(self, id, code).await
    }

    async fn create_script(&self, name: &str) -> Result<u32, Error> {
        RpcClient::create_script(self, name).await
    }

    async fn set_script_config(&self, id: u32, name: &str, enable: bool) -> Result<(), Error> {
        RpcClient::set_script_config(self, id, name, enable).await
    }

    async fn start_script(&self, id: u32) -> Result<(), Error> {
        RpcClient::start_script(self, id).await
    }

    async fn stop_script(&self, id: u32) -> Result<(), Error> {
        RpcClient::stop_script(self, id).await
    }

    async fn delete_script(&self, id: u32) -> Result<(), Error> {
        RpcClient::delete_script(self, id).await
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, Error> {
        RpcClient::list_schedules(self).await
    }

    async fn create_schedule(&self, schedule: &Schedule) -> Result<u32, Error> {
        RpcClient::create_schedule(self, schedule).await
    }

    async fn update_schedule(&self, id: u32, schedule: &Schedule) -> Result<(), Error> {
        RpcClient::update_schedule(self, id, schedule).await
    }

    async fn delete_schedule(&self, id: u32) -> Result<(), Error> {
        RpcClient::delete_schedule(self, id).await
    }

    async fn list_webhooks(&self) -> Result<Vec<Webhook>, Error> {
        RpcClient::list_webhooks(self).await
    }

    async fn create_webhook(&self, hook: &Webhook) -> Result<u32, Error> {
        RpcClient::create_webhook(self, hook).await
    }

    async fn update_webhook(&self, id: u32, hook: &Webhook) -> Result<(), Error> {
        RpcClient::update_webhook(self, id, hook).await
    }

    async fn delete_webhook(&self, id: u32) -> Result<(), Error> {
        RpcClient::delete_webhook(self, id).await
    }

    async fn list_kvs(&self) -> Result<Vec<KvsEntry>, Error> {
        RpcClient::list_kvs(self).await
    }

    async fn kvs_set(&self, key: &str, value: &Value) -> Result<(), Error> {
        RpcClient::kvs_set(self, key, value).await
    }

    async fn kvs_delete(&self, key: &str) -> Result<(), Error> {
        RpcClient::kvs_delete(self, key).await
    }

    async fn list_components(&self) -> Result<Vec<ComponentInfo>, Error> {
        RpcClient::list_components(self).await
    }
}

// ── Factory ─────────────────────────────────────────────────────────

/// Produces a gateway for a device address. One factory serves a whole
/// sync run.
pub trait GatewayFactory: Send + Sync {
    /// Gateway for a registered device.
    fn gateway(&self, device: &Device) -> Result<Arc<dyn DeviceGateway>, CoreError> {
        self.connect(&device.ip_address)
            .map_err(|e| match e {
                CoreError::Remote { source, .. } => CoreError::remote(&device.device_id, source),
                other => other,
            })
    }

    /// Gateway for a bare host, used when registering a new device.
    fn connect(&self, host: &str) -> Result<Arc<dyn DeviceGateway>, CoreError>;
}

/// HTTP gateways sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpGatewayFactory {
    connector: RpcConnector,
}

impl HttpGatewayFactory {
    pub fn new(transport: &TransportConfig) -> Result<Self, CoreError> {
        let connector = RpcConnector::new(transport).map_err(|e| CoreError::Config {
            message: e.to_string(),
        })?;
        Ok(Self { connector })
    }
}

impl GatewayFactory for HttpGatewayFactory {
    fn connect(&self, host: &str) -> Result<Arc<dyn DeviceGateway>, CoreError> {
        let client = self
            .connector
            .connect(host)
            .map_err(|e| CoreError::remote(host, e))?;
        Ok(Arc::new(client))
    }
}
