//! API error types with IntoResponse.
//!
//! The wire contract for failures is a short plain-text message: 400 for
//! anything the request body caused, 500 for anything the server caused.
//! Diagnostic detail goes to the logs, never to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use namemerge_core::MergeError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Input violated the grammar (400)
    InvalidInput { message: String },

    /// Anything on our side of the line (500, logged at source)
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInput { message } => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal processing error".to_string(),
            )
                .into_response(),
        }
    }
}

impl From<MergeError> for ApiError {
    fn from(e: MergeError) -> Self {
        match &e {
            MergeError::InvalidInput { message, detail } => {
                tracing::warn!(detail = %detail, "invalid input rejected");
                Self::InvalidInput {
                    message: message.clone(),
                }
            }
            MergeError::Cancelled => {
                // The client is already gone; nobody will read this.
                tracing::info!("request cancelled");
                Self::Internal
            }
            other => {
                tracing::error!(error = %other, "request failed");
                Self::Internal
            }
        }
    }
}
