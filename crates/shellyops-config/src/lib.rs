//! Configuration for the shellyops CLI.
//!
//! A TOML file in the platform config directory, overridden by
//! `SHELLYOPS_*` environment variables, and finally by command-line flags.
//! The result is translated into a `shellyops_core::SyncConfig`; core never
//! reads configuration itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shellyops_core::SyncConfig;
use shellyops_core::config::DEFAULT_MANIFEST;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "SHELLYOPS_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Default repository root when `--repo` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<PathBuf>,

    /// Manifest file, relative to the repository.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Values file used by push, relative to the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<PathBuf>,

    /// Per-request device timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Default output format: `table`, `json` or `yaml`.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: None,
            manifest: default_manifest(),
            values: None,
            timeout: default_timeout(),
            output: default_output(),
        }
    }
}

impl Config {
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST)
}
fn default_timeout() -> u64 {
    30
}
fn default_output() -> String {
    "table".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "shellyops", "shellyops").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("shellyops");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the default path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` plus environment. A missing file is not an
/// error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    figment(path).extract().map_err(ConfigError::from)
}

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
}

// ── Translation ─────────────────────────────────────────────────────

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub repo: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub values: Option<PathBuf>,
}

/// Build the core sync configuration. The repository defaults to the
/// current directory.
pub fn to_sync_config(config: &Config, overrides: &Overrides) -> Result<SyncConfig, ConfigError> {
    let repo = overrides
        .repo
        .clone()
        .or_else(|| config.repo.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let timeout = overrides.timeout.unwrap_or(config.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least one second".into(),
        });
    }
    if config.manifest.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            field: "manifest".into(),
            reason: "must not be empty".into(),
        });
    }

    Ok(SyncConfig {
        repo,
        manifest: config.manifest.clone(),
        timeout: Duration::from_secs(timeout),
        values: overrides.values.clone().or_else(|| config.values.clone()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        // Only the file layer: the host environment may carry SHELLYOPS_*.
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(tmp.path().join("config.toml")))
            .extract()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "repo = \"/srv/fleet\"\ntimeout = 5\noutput = \"json\"\n").unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();
        assert_eq!(config.repo, Some(PathBuf::from("/srv/fleet")));
        assert_eq!(config.timeout, 5);
        assert_eq!(config.output, "json");
        assert_eq!(config.manifest, PathBuf::from("manifest.yaml"));
    }

    #[test]
    fn overrides_win_over_config() {
        let config = Config {
            repo: Some("/srv/fleet".into()),
            values: Some("values.yaml".into()),
            ..Config::default()
        };
        let overrides = Overrides {
            repo: Some("/tmp/other".into()),
            timeout: Some(3),
            values: Some("staging.yaml".into()),
        };
        let sync = to_sync_config(&config, &overrides).unwrap();
        assert_eq!(sync.repo, PathBuf::from("/tmp/other"));
        assert_eq!(sync.timeout, Duration::from_secs(3));
        assert_eq!(sync.values, Some(PathBuf::from("staging.yaml")));

        let sync = to_sync_config(&config, &Overrides::default()).unwrap();
        assert_eq!(sync.repo, PathBuf::from("/srv/fleet"));
        assert_eq!(sync.timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let overrides = Overrides {
            timeout: Some(0),
            ..Overrides::default()
        };
        assert!(matches!(
            to_sync_config(&Config::default(), &overrides),
            Err(ConfigError::Validation { field, .. }) if field == "timeout"
        ));
    }

    #[test]
    fn renders_as_toml() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("timeout = 30"));
        assert!(!text.contains("repo"));
    }
}
