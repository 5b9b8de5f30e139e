//! HTTP server command
//!
//! Runs the namemerge HTTP server with the /combine-names and /health
//! routes.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use namemerge_core::PipelineConfig;
use namemerge_server::{run_server, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default: 127.0.0.1:3030)
    #[arg(long, short = 'b', default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    /// Root directory for per-request scratch workspaces (default: OS temp dir)
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Records held in memory while generating a sort run; raise this in
    /// production
    #[arg(long, default_value_t = 100)]
    pub sort_batch_size: usize,

    /// Lines grouped into one streamed response chunk
    #[arg(long, default_value_t = 100)]
    pub emit_batch_size: usize,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let pipeline = PipelineConfig {
        workspace_root: args
            .workspace_root
            .unwrap_or_else(std::env::temp_dir),
        sort_batch_size: args.sort_batch_size,
        emit_batch_size: args.emit_batch_size,
    };

    tracing::info!("Starting namemerge server on {}", args.bind);

    let config = ServerConfig {
        bind_addr: args.bind,
    };

    // Run server (blocks until shutdown)
    run_server(config, pipeline)
        .await
        .context("Server error")?;

    Ok(())
}
