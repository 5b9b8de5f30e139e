//! # namemerge-core
//!
//! Streaming pipeline that merges two id-tagged name lists of unbounded
//! size with bounded memory.
//!
//! ## Architecture
//!
//! ```text
//! input.json ──▶ split ──▶ first.ndjson / last.ndjson
//!                              │
//!                        external sort (runs + k-way merge)
//!                              │
//!                  first.sorted.ndjson / last.sorted.ndjson
//!                              │
//!                      lock-step merge (staged)
//!                              │
//!              full_names.ndjson / unpaired.ndjson
//!                              │
//!                      envelope emitter ──▶ response bytes
//! ```
//!
//! Everything on-disk lives in a per-request [`Workspace`] that is removed
//! on every exit path. [`CombineStream`] composes the stages into one lazy
//! iterator of byte chunks; [`StreamingValidator`] checks the document
//! grammar while the body is still arriving, before any of this starts.
//!
//! The crate is deliberately synchronous - it is disk- and CPU-bound, and
//! async callers bridge it onto a worker pool (see `namemerge-server`).

pub mod config;
pub mod envelope;
pub mod error;
pub mod merge;
pub mod ndjson;
pub mod pipeline;
pub mod record;
pub mod sort;
pub mod split;
pub mod validate;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{MergeError, Result};
pub use pipeline::CombineStream;
pub use record::{NameRecord, PairedRecord, Side, UnpairedRecord};
pub use validate::{validate_file, validate_reader, StreamingValidator};
pub use workspace::Workspace;
