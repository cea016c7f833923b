// Shared transport configuration for building reqwest::Client instances.
//
// One client is built per sync run and shared by every device gateway, so
// connection pooling and timeouts are configured in a single place.

use std::time::Duration;

use crate::error::Error;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout applied to every RPC call.
    pub timeout: Duration,
    /// Connect timeout, shorter than `timeout` so unreachable devices fail fast.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Config with the given request timeout and a connect timeout capped at it.
    pub fn with_timeout(timeout: Duration) -> Self {
        let default = Self::default();
        Self {
            timeout,
            connect_timeout: default.connect_timeout.min(timeout),
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("shellyops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}
