//! One-shot pipeline run over a local file.
//!
//! Exercises exactly the path a request takes - validation, workspace,
//! split, sort, merge, envelope - without a server in front, writing the
//! response bytes to stdout or a file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use namemerge_core::{validate_file, CombineStream, PipelineConfig, Workspace};

/// Arguments for the combine command
#[derive(Parser, Debug)]
pub struct CombineArgs {
    /// Input JSON document with first_names / last_names lists
    pub input: PathBuf,

    /// Write the merged output here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Root directory for the scratch workspace (default: OS temp dir)
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Records held in memory while generating a sort run
    #[arg(long, default_value_t = 100)]
    pub sort_batch_size: usize,

    /// Lines grouped into one output chunk
    #[arg(long, default_value_t = 100)]
    pub emit_batch_size: usize,
}

/// Run the merge pipeline over a local JSON file
pub fn run_combine(args: CombineArgs) -> Result<()> {
    validate_file(&args.input)
        .with_context(|| format!("invalid input document {:?}", args.input))?;

    let config = PipelineConfig {
        workspace_root: args
            .workspace_root
            .unwrap_or_else(std::env::temp_dir),
        sort_batch_size: args.sort_batch_size,
        emit_batch_size: args.emit_batch_size,
    };

    let workspace = Workspace::create(&config.workspace_root)?;
    std::fs::copy(&args.input, workspace.input_path())
        .with_context(|| format!("failed to stage {:?}", args.input))?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {path:?}"))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let mut chunks = 0usize;
    for chunk in CombineStream::new(workspace, config)? {
        out.write_all(&chunk?)?;
        chunks += 1;
    }
    out.flush()?;

    info!(chunks, input = %args.input.display(), "combine complete");
    Ok(())
}
