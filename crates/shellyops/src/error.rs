//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text, and each error into a process exit code.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use shellyops_config::ConfigError;
use shellyops_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const PREFLIGHT: i32 = 3;
    pub const DEVICE_FAILURES: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Pre-flight ───────────────────────────────────────────────────
    #[error("Working copy has uncommitted changes")]
    #[diagnostic(
        code(shellyops::dirty_working_copy),
        help("Commit or stash local changes first so a pull never overwrites unsaved work.")
    )]
    DirtyWorkingCopy,

    #[error("Could not check the working copy: {message}")]
    #[diagnostic(
        code(shellyops::working_copy),
        help("The repository must be a git checkout and `git` must be on PATH.")
    )]
    WorkingCopy { message: String },

    #[error("Device '{identifier}' is not registered")]
    #[diagnostic(
        code(shellyops::device_not_found),
        help("Run: shellyops devices list")
    )]
    DeviceNotFound { identifier: String },

    #[error("Device registry {}: {message}", path.display())]
    #[diagnostic(code(shellyops::registry), help("Check the manifest YAML syntax."))]
    Registry { path: PathBuf, message: String },

    #[error("Values file {}: {message}", path.display())]
    #[diagnostic(
        code(shellyops::values),
        help("Pass a readable YAML mapping with --values, or remove the setting.")
    )]
    Values { path: PathBuf, message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("{failed} of {total} devices failed")]
    #[diagnostic(
        code(shellyops::device_failures),
        help("Per-device errors are listed above; rerun with -v for details.")
    )]
    DeviceFailures { failed: usize, total: usize },

    #[error("Could not reach device: {message}")]
    #[diagnostic(
        code(shellyops::unreachable),
        help("Check that the device is powered and reachable, or raise --timeout.")
    )]
    Unreachable { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(shellyops::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(shellyops::config),
        help("Check the config file (`shellyops config path`) and SHELLYOPS_* environment variables.")
    )]
    Config(Box<ConfigError>),

    // ── Everything else ──────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(shellyops::sync))]
    Core(Box<CoreError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DirtyWorkingCopy
            | Self::WorkingCopy { .. }
            | Self::DeviceNotFound { .. }
            | Self::Registry { .. }
            | Self::Values { .. } => exit_code::PREFLIGHT,
            Self::DeviceFailures { .. } | Self::Unreachable { .. } => exit_code::DEVICE_FAILURES,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_unreachable() {
            return Self::Unreachable {
                message: err.to_string(),
            };
        }
        match err {
            CoreError::DirtyWorkingCopy => Self::DirtyWorkingCopy,
            CoreError::WorkingCopy { message } => Self::WorkingCopy { message },
            CoreError::DeviceNotFound { identifier } => Self::DeviceNotFound { identifier },
            CoreError::Registry { path, message } => Self::Registry { path, message },
            CoreError::Values { path, message } => Self::Values { path, message },
            other => Self::Core(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_errors_exit_with_three() {
        let err = CliError::from(CoreError::DeviceNotFound {
            identifier: "ghost".into(),
        });
        assert_eq!(err.exit_code(), exit_code::PREFLIGHT);
        assert_eq!(CliError::from(CoreError::DirtyWorkingCopy).exit_code(), exit_code::PREFLIGHT);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least one second".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn device_failures_exit_with_four() {
        let err = CliError::DeviceFailures { failed: 1, total: 3 };
        assert_eq!(err.exit_code(), exit_code::DEVICE_FAILURES);
        assert_eq!(err.to_string(), "1 of 3 devices failed");
        assert_eq!(CliError::from(CoreError::Cancelled).exit_code(), exit_code::GENERAL);
    }
}
