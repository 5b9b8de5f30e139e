//! POST /combine-names - the streaming merge endpoint.
//!
//! The handler does three things in order: allocate a request workspace,
//! sink the body into it while validating incrementally, then hand the
//! workspace to the pipeline and stream its chunks back. Any failure
//! before the first chunk maps to a clean status; a failure after that
//! truncates the body, since the headers are long gone.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use tracing::debug;

use namemerge_core::{CombineStream, Workspace};

use crate::adapter;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::ingest;

/// Legacy content type, kept for wire compatibility: the body opens with
/// NDJSON echo lines even though the envelope that follows is one JSON
/// object.
const CONTENT_TYPE: &str = "application/x-ndjson";

/// POST /combine-names
async fn combine_names(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    let workspace = Workspace::create(&state.pipeline.workspace_root)?;
    debug!(workspace = %workspace.path().display(), "request accepted");

    ingest::save_body(&workspace, request.into_body()).await?;

    let pipeline = CombineStream::new(workspace, state.pipeline.clone())?;
    let stream = adapter::spawn_pipeline(pipeline);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .body(Body::from_stream(stream))
        .unwrap())
}

/// Combine routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/combine-names", post(combine_names))
}
