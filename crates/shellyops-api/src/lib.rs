// shellyops-api: Async Rust client for the Shelly Gen2+ JSON-RPC device API

pub mod error;
pub mod rpc;
pub mod transport;

pub use error::Error;
pub use rpc::{RpcClient, RpcConnector};
pub use rpc::models::{
    ComponentInfo, ComponentKey, DeviceInfo, KvsEntry, Schedule, ScriptInfo, Webhook,
};
pub use transport::TransportConfig;
