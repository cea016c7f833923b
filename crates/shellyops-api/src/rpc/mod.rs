// Shelly Gen2+ JSON-RPC client
//
// `client` owns transport mechanics and envelope handling; every device
// namespace (Shelly, Script, Schedule, Webhook, KVS) adds inherent methods
// on `RpcClient` from its own file.

pub mod client;
pub mod components;
pub mod kvs;
pub mod models;
pub mod schedules;
pub mod scripts;
pub mod system;
pub mod webhooks;

pub use client::{RpcClient, RpcConnector};
