// KVS namespace
//
// `KVS.GetMany` is paginated and, depending on firmware, returns `items`
// either as an array of `{ key, etag, value }` or as an object keyed by
// name. Both shapes are normalised into `KvsEntry`.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::KvsEntry;

const METHOD_GET_MANY: &str = "KVS.GetMany";

#[derive(Debug, Deserialize)]
struct KvsPage {
    #[serde(default)]
    items: Value,
    #[serde(default)]
    total: Option<usize>,
}

impl RpcClient {
    /// Every key-value pair stored on the device.
    ///
    /// `KVS.GetMany` with `{ match: "*", offset }`, repeated until `total`
    /// items were read.
    pub async fn list_kvs(&self) -> Result<Vec<KvsEntry>, Error> {
        let mut entries: Vec<KvsEntry> = Vec::new();
        loop {
            let page: KvsPage = self
                .call(
                    METHOD_GET_MANY,
                    Some(json!({ "match": "*", "offset": entries.len() })),
                )
                .await?;

            let items = page_items(page.items)?;
            if items.is_empty() {
                break;
            }
            entries.extend(items);

            match page.total {
                Some(total) if entries.len() < total => {}
                _ => break,
            }
        }
        debug!(count = entries.len(), "listed kvs entries");
        Ok(entries)
    }

    /// `KVS.Set`
    pub async fn kvs_set(&self, key: &str, value: &Value) -> Result<(), Error> {
        let _: Value = self
            .call("KVS.Set", Some(json!({ "key": key, "value": value })))
            .await?;
        Ok(())
    }

    /// `KVS.Delete`
    pub async fn kvs_delete(&self, key: &str) -> Result<(), Error> {
        let _: Value = self
            .call("KVS.Delete", Some(json!({ "key": key })))
            .await?;
        Ok(())
    }
}

fn page_items(items: Value) -> Result<Vec<KvsEntry>, Error> {
    let malformed = |message: String, items: &Value| Error::Deserialization {
        method: METHOD_GET_MANY.into(),
        message,
        body: items.to_string(),
    };

    match items {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(items.clone())
            .map_err(|e| malformed(e.to_string(), &items)),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, item)| {
                let etag = item
                    .get("etag")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let value = item.get("value").cloned().unwrap_or(Value::Null);
                KvsEntry { key, etag, value }
            })
            .collect()),
        other => Err(malformed("items is neither array nor object".into(), &other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn object_items_are_normalised() {
        let items = json!({
            "mode": { "etag": "e1", "value": "eco" },
            "limit": { "etag": "e2", "value": 42 }
        });
        let mut entries = page_items(items).unwrap();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(entries[0].key, "limit");
        assert_eq!(entries[0].value, json!(42));
        assert_eq!(entries[1].etag.as_deref(), Some("e1"));
    }

    #[test]
    fn array_items_deserialize_directly() {
        let items = json!([{ "key": "mode", "etag": "e1", "value": "eco" }]);
        let entries = page_items(items).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, json!("eco"));
    }
}
