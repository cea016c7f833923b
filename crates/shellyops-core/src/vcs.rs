// ── Working copy check ──
//
// Pull refuses to overwrite uncommitted local edits. The only question
// asked of the revision-control system is whether the working copy is
// dirty.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::CoreError;

#[async_trait]
pub trait WorkingCopy: Send + Sync {
    /// `true` when there are uncommitted modifications or untracked files.
    async fn is_dirty(&self) -> Result<bool, CoreError>;
}

/// A git checkout, queried through `git status --porcelain`.
#[derive(Debug, Clone)]
pub struct GitWorkingCopy {
    root: PathBuf,
}

impl GitWorkingCopy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl WorkingCopy for GitWorkingCopy {
    async fn is_dirty(&self) -> Result<bool, CoreError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["status", "--porcelain"])
            .output()
            .await
            .map_err(|e| CoreError::WorkingCopy {
                message: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            return Err(CoreError::WorkingCopy {
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let dirty = !output.stdout.iter().all(u8::is_ascii_whitespace);
        debug!(root = %self.root.display(), dirty, "checked working copy");
        Ok(dirty)
    }
}
