//! Pipeline tuning knobs.

use std::path::PathBuf;

/// Configuration shared by every stage of the pipeline.
///
/// The defaults favour small-memory operation and match the sizes the
/// service has always shipped with; production deployments should raise
/// `sort_batch_size` well past 100.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory request workspaces are created under.
    pub workspace_root: PathBuf,
    /// Records held in RAM while generating a sort run.
    pub sort_batch_size: usize,
    /// Lines grouped into one downstream chunk, amortising syscalls.
    pub emit_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            sort_batch_size: 100,
            emit_batch_size: 100,
        }
    }
}

impl PipelineConfig {
    /// Zero-sized batches would stall the pipeline; clamp them to 1.
    pub fn normalized(mut self) -> Self {
        self.sort_batch_size = self.sort_batch_size.max(1);
        self.emit_batch_size = self.emit_batch_size.max(1);
        self
    }
}
