//! namemerge CLI - streaming name-list merging over HTTP or local files
//!
//! This is the main entry point for the namemerge command-line tool, which
//! provides:
//! - The HTTP server exposing `POST /combine-names` (`serve` subcommand)
//! - Local one-shot pipeline runs over a JSON file (`combine` subcommand)
//! - Synthetic payload generation for load testing (`gen` subcommand)

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "namemerge",
    author,
    version,
    about = "Merge two id-tagged name lists of unbounded size with bounded memory",
    long_about = "Pairs first-name and last-name records that share a numeric id, \
                  streaming the result while keeping peak memory independent of \
                  input size. Runs as an HTTP service or as a one-shot file tool."
)]
struct Cli {
    /// Enable debug logging (or set RUST_LOG for fine-grained control)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(commands::serve::ServeArgs),
    /// Run the merge pipeline over a local JSON file
    Combine(commands::combine::CombineArgs),
    /// Generate synthetic request payloads for load testing
    Gen(commands::gen::GenArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug })?;

    match cli.command {
        Commands::Serve(args) => commands::serve::run_serve(args).await,
        Commands::Combine(args) => commands::combine::run_combine(args),
        Commands::Gen(args) => commands::gen::run_gen(args),
    }
}
