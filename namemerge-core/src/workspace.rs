//! Per-request scratch directory.
//!
//! Every request gets its own uniquely named directory under the configured
//! root; the raw input tempfile, both intermediates, sort chunks and the
//! staged merge output all live inside it. The directory is removed on every
//! exit path - normal completion, error, cancellation, or unwinding - via
//! `Drop`, with [`Workspace::release`] available for explicit (idempotent)
//! cleanup. The workspace never interprets its contents.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{MergeError, Result};

pub struct Workspace {
    // `None` after release; `TempDir` removes recursively on drop.
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Allocate a fresh scratch directory under `root`, creating `root`
    /// itself if needed. The unique suffix prevents collisions between
    /// concurrent requests sharing one root.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| MergeError::workspace(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix("combine-")
            .tempdir_in(root)
            .map_err(|e| MergeError::workspace(root, e))?;
        let path = dir.path().to_path_buf();
        debug!(workspace = %path.display(), "workspace created");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw request body, persisted before the pipeline starts.
    pub fn input_path(&self) -> PathBuf {
        self.path.join("input.json")
    }

    /// Unsorted intermediate for one side.
    pub fn raw_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}.ndjson"))
    }

    /// Sorted counterpart of [`Workspace::raw_path`].
    pub fn sorted_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}.sorted.ndjson"))
    }

    /// Transient sort run, deleted as soon as the merge drains it.
    pub fn chunk_path(&self, key: &str, index: usize) -> PathBuf {
        self.path.join(format!("chunk_{key}_{index:04}.ndjson"))
    }

    /// Staged paired output awaiting envelope replay.
    pub fn paired_path(&self) -> PathBuf {
        self.path.join("full_names.ndjson")
    }

    /// Staged unpaired output awaiting envelope replay.
    pub fn unpaired_path(&self) -> PathBuf {
        self.path.join("unpaired.ndjson")
    }

    /// Remove the directory and everything in it. Safe to call more than
    /// once; later calls are no-ops.
    pub fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = self.path.clone();
            if let Err(e) = dir.close() {
                // Drop already tried its best; leftover directories under a
                // temp root are harmless but worth a log line.
                warn!(workspace = %path.display(), error = %e, "workspace cleanup failed");
            } else {
                debug!(workspace = %path.display(), "workspace released");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("path", &self.path)
            .field("released", &self.dir.is_none())
            .finish()
    }
}
