// JSON-RPC transport client
//
// Wraps `reqwest::Client` with the device's `/rpc` endpoint and the
// `{ id, method, params }` / `{ id, src, result | error }` envelope. All
// namespace modules call through `call()` so error mapping lives here.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for one device's JSON-RPC endpoint.
///
/// Cheap to construct from a shared `reqwest::Client` via [`with_client`],
/// which is how the sync engine builds one per device.
///
/// [`with_client`]: RpcClient::with_client
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: Url,
    host: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Builds [`RpcClient`]s for many devices over one shared connection pool.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    http: reqwest::Client,
}

impl RpcConnector {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// A client for `host` sharing this connector's pool.
    pub fn connect(&self, host: &str) -> Result<RpcClient, Error> {
        RpcClient::with_client(self.http.clone(), host)
    }
}

impl RpcClient {
    /// Create a client for `host` with its own HTTP client.
    ///
    /// `host` is either a bare address (`192.168.1.20`, `shelly.local:8080`)
    /// or a full base URL (`http://192.168.1.20`).
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, host)
    }

    /// Create a client sharing a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, host: &str) -> Result<Self, Error> {
        let base = if host.contains("://") {
            Url::parse(host)?
        } else {
            Url::parse(&format!("http://{host}/"))?
        };
        let endpoint = base.join("rpc")?;
        Ok(Self {
            http,
            endpoint,
            host: host.to_owned(),
        })
    }

    /// The host this client talks to, as given at construction.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The full RPC endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Invoke `method` and deserialize its `result` into `T`.
    ///
    /// Methods that return nothing useful can be called with
    /// `T = serde_json::Value` and the value discarded.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, Error> {
        debug!(host = %self.host, method, "rpc call");

        let mut body = json!({
            "id": 1,
            "src": "shellyops",
            "method": method,
        });
        if let Some(params) = params {
            body["params"] = params;
        }

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|source| Error::Transport {
                method: method.to_owned(),
                source,
            })?;

        self.parse_envelope(method, resp).await
    }

    /// Parse the `{ result, error }` envelope, returning `result` on success
    /// or an `Error::Rpc` when the device reported an error object.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        method: &str,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(|source| Error::Transport {
            method: method.to_owned(),
            source,
        })?;

        let envelope: RpcResponse = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(Error::Http {
                    method: method.to_owned(),
                    status: status.as_u16(),
                });
            }
            Err(e) => {
                return Err(Error::Deserialization {
                    method: method.to_owned(),
                    message: e.to_string(),
                    body,
                });
            }
        };

        if let Some(err) = envelope.error {
            return Err(Error::Rpc {
                method: method.to_owned(),
                code: err.code,
                message: err.message,
            });
        }
        if !status.is_success() {
            return Err(Error::Http {
                method: method.to_owned(),
                status: status.as_u16(),
            });
        }

        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| Error::Deserialization {
            method: method.to_owned(),
            message: e.to_string(),
            body,
        })
    }
}
