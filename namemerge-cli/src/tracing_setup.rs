//! Tracing setup for the namemerge CLI
//!
//! Usage:
//!   namemerge --debug ...              # Debug logging to console
//!   RUST_LOG=namemerge=debug namemerge # Fine-grained log control

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets RUST_LOG=debug if not already set)
    pub debug: bool,
}

/// Initialize tracing with console output.
///
/// Safe to call once per process; later calls fail, which main never does.
pub fn init(config: &TracingConfig) -> Result<()> {
    let filter = if config.debug {
        // Debug mode: set debug level unless RUST_LOG is explicitly set
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug) // Show targets in debug mode
        .compact()
        .try_init()
        .map_err(|e| anyhow::Error::msg(e.to_string()))
        .context("failed to initialize tracing subscriber")
}
