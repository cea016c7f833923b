// Component listing (`Shelly.GetComponents`)
//
// Used on pull to capture virtual components and groups, which have no
// dedicated list call of their own.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::ComponentInfo;

#[derive(Debug, Deserialize)]
struct ComponentPage {
    #[serde(default)]
    components: Vec<ComponentInfo>,
    #[serde(default)]
    total: Option<usize>,
}

impl RpcClient {
    /// Every component on the device with its status and config.
    ///
    /// `Shelly.GetComponents` with `{ offset }`, repeated until `total`
    /// components were read or a page comes back empty.
    pub async fn list_components(&self) -> Result<Vec<ComponentInfo>, Error> {
        let mut components: Vec<ComponentInfo> = Vec::new();
        loop {
            let page: ComponentPage = self
                .call(
                    "Shelly.GetComponents",
                    Some(json!({ "offset": components.len() })),
                )
                .await?;

            if page.components.is_empty() {
                break;
            }
            components.extend(page.components);

            match page.total {
                Some(total) if components.len() < total => {}
                _ => break,
            }
        }
        debug!(count = components.len(), "listed components");
        Ok(components)
    }
}
