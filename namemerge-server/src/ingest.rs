//! Request-body ingestion: sink the streamed body into the workspace's
//! input tempfile while the structural validator chews on every chunk.
//!
//! Validation failures surface before a single response byte exists, so
//! they can still map to a clean 400. Disk failures map to 500. Either way
//! the caller owns the workspace and its cleanup.

use std::io;

use axum::body::Body;
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use namemerge_core::{MergeError, Result, StreamingValidator, Workspace};

/// Persist `body` to `workspace`'s input file, validating incrementally.
pub async fn save_body(workspace: &Workspace, body: Body) -> Result<()> {
    let file = tokio::fs::File::create(workspace.input_path()).await?;
    let mut writer = BufWriter::new(file);
    let mut validator = StreamingValidator::new();
    let mut stream = body.into_data_stream();
    let mut bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            MergeError::from(io::Error::new(io::ErrorKind::UnexpectedEof, e))
        })?;
        validator.feed(&chunk)?;
        writer.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }

    validator.finish()?;
    writer.flush().await?;
    debug!(bytes, input = %workspace.input_path().display(), "request body persisted");
    Ok(())
}
