// ── Core error types ──
//
// Errors surfaced by the sync engine. Device RPC failures arrive as
// `shellyops_api::Error` and are wrapped with the device id so a report
// always says which device and which method failed.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StoreError;
use crate::template::TemplateError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Pre-flight errors ────────────────────────────────────────────
    #[error("Working copy has uncommitted changes; commit or stash them before pulling")]
    DirtyWorkingCopy,

    #[error("Working copy check failed: {message}")]
    WorkingCopy { message: String },

    #[error("Device registry {}: {message}", path.display())]
    Registry { path: PathBuf, message: String },

    #[error("Values file {}: {message}", path.display())]
    Values { path: PathBuf, message: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device {device_id}: {source}")]
    Remote {
        device_id: String,
        #[source]
        source: shellyops_api::Error,
    },

    #[error("Device {device_id}: folder {} does not exist", folder.display())]
    FolderMissing { device_id: String, folder: PathBuf },

    #[error("Device {device_id}: cannot rename folder to {}: target already exists", to.display())]
    FolderConflict { device_id: String, to: PathBuf },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Local data errors ────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a device RPC failure with the device it came from.
    pub fn remote(device_id: &str, source: shellyops_api::Error) -> Self {
        Self::Remote {
            device_id: device_id.to_owned(),
            source,
        }
    }

    /// Returns `true` if the device could not be reached at all, as opposed
    /// to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                source: shellyops_api::Error::Transport { .. } | shellyops_api::Error::InvalidUrl(_),
                ..
            }
        )
    }

    /// Returns `true` for errors raised before any device was contacted.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::DirtyWorkingCopy
                | Self::WorkingCopy { .. }
                | Self::Registry { .. }
                | Self::Values { .. }
                | Self::DeviceNotFound { .. }
        )
    }
}
