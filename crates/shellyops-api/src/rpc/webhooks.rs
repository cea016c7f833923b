// Webhook namespace

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::Webhook;
use crate::rpc::schedules::to_params;

#[derive(Debug, Deserialize)]
struct WebhookList {
    #[serde(default)]
    hooks: Vec<Webhook>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u32,
}

impl RpcClient {
    /// `Webhook.List`
    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>, Error> {
        let list: WebhookList = self.call("Webhook.List", None).await?;
        Ok(list.hooks)
    }

    /// Create a webhook, returning the device-assigned id.
    ///
    /// `Webhook.Create`
    pub async fn create_webhook(&self, hook: &Webhook) -> Result<u32, Error> {
        let mut params = hook.clone();
        params.id = None;
        let created: Created = self
            .call("Webhook.Create", Some(to_params("Webhook.Create", &params)?))
            .await?;
        debug!(id = created.id, event = %hook.event, "created webhook");
        Ok(created.id)
    }

    /// Overwrite the webhook with `id`.
    ///
    /// `Webhook.Update`
    pub async fn update_webhook(&self, id: u32, hook: &Webhook) -> Result<(), Error> {
        let mut params = hook.clone();
        params.id = Some(id);
        let _: Value = self
            .call("Webhook.Update", Some(to_params("Webhook.Update", &params)?))
            .await?;
        Ok(())
    }

    /// `Webhook.Delete`
    pub async fn delete_webhook(&self, id: u32) -> Result<(), Error> {
        let _: Value = self
            .call("Webhook.Delete", Some(json!({ "id": id })))
            .await?;
        Ok(())
    }
}
