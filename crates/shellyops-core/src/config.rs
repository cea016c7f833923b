// ── Runtime sync configuration ──
//
// Describes *where* the declarative repository lives and how to talk to
// devices. The CLI builds a `SyncConfig` from its config file and flags and
// hands it in; core never reads config files.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default registry file name inside the repository.
pub const DEFAULT_MANIFEST: &str = "manifest.yaml";

/// Default values file consulted on push when none is given.
pub const DEFAULT_VALUES: &str = "values.yaml";

/// Configuration for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Repository root holding the manifest and device folders.
    pub repo: PathBuf,
    /// Manifest path, relative to `repo` unless absolute.
    pub manifest: PathBuf,
    /// Per-request device timeout.
    pub timeout: Duration,
    /// Values file for push, relative to `repo` unless absolute.
    pub values: Option<PathBuf>,
}

impl SyncConfig {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            timeout: Duration::from_secs(30),
            values: None,
        }
    }

    /// Absolute (or repo-joined) path of the manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest)
    }

    /// Join `path` onto the repository root unless it is already absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo.join(path)
        }
    }
}
