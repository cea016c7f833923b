use thiserror::Error;

/// Top-level error type for the `shellyops-api` crate.
///
/// Every variant raised while talking to a device carries the RPC method
/// name, so callers can report *which* call failed. `shellyops-core` wraps
/// these with the device id.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("{method}: HTTP transport error: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-success HTTP status and no RPC error body.
    #[error("{method}: unexpected HTTP status {status}")]
    Http { method: String, status: u16 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── RPC ─────────────────────────────────────────────────────────
    /// Error object returned in the JSON-RPC envelope.
    #[error("{method}: RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// The device replied with something that violates the call's contract
    /// (e.g. an empty script chunk while more data is still pending).
    #[error("{method}: protocol violation: {message}")]
    Protocol { method: String, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("{method}: deserialization error: {message}")]
    Deserialization {
        method: String,
        message: String,
        body: String,
    },
}

impl Error {
    /// The RPC method this error was raised for, if any.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Transport { method, .. }
            | Self::Http { method, .. }
            | Self::Rpc { method, .. }
            | Self::Protocol { method, .. }
            | Self::Deserialization { method, .. } => Some(method),
            Self::InvalidUrl(_) | Self::ClientBuild(_) => None,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the device rejected the method as unknown.
    ///
    /// Shelly firmware answers unsupported namespaces with code 404.
    pub fn is_method_not_found(&self) -> bool {
        match self {
            Self::Rpc { code, .. } => *code == 404 || *code == -32601,
            Self::Http { status, .. } => *status == 404,
            _ => false,
        }
    }
}
