//! # namemerge-server
//!
//! HTTP layer over the synchronous pipeline in `namemerge-core`:
//! - `POST /combine-names` - stream-merge two name lists by id
//! - `GET /health` - liveness probe
//!
//! ## Architecture
//!
//! ```text
//! namemerge-server/
//! ├── ingest/      # request body → workspace tempfile, validated per chunk
//! ├── adapter/     # sync pipeline → async body stream (blocking pool)
//! └── http/        # Axum server, routes, error mapping
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use namemerge_core::PipelineConfig;
//! use namemerge_server::{run_server, ServerConfig};
//!
//! run_server(ServerConfig::default(), PipelineConfig::default()).await?;
//! ```

pub mod adapter;
pub mod http;
pub mod ingest;

// Re-exports for convenience
pub use http::{run_server, ServerConfig};
