/// Structured error types for namemerge-core.
///
/// Uses `thiserror` for better API surface and error composition.
/// Binary crates (namemerge-cli) can still use `anyhow` for convenience,
/// but library consumers get structured, composable errors.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum MergeError {
    /// Input violated the accepted document grammar.
    ///
    /// `message` is safe to show a client; `detail` is for logs only and
    /// may reference internal positions or parser state.
    #[error("invalid input: {message}")]
    InvalidInput { message: String, detail: String },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Scratch directory could not be created or removed
    #[error("workspace error at {path:?}: {source}")]
    Workspace { path: PathBuf, source: io::Error },

    /// The consumer went away; nothing left to produce for.
    #[error("request cancelled by consumer")]
    Cancelled,
}

/// Result type alias for namemerge-core operations
pub type Result<T> = std::result::Result<T, MergeError>;

impl MergeError {
    /// Create an invalid-input error with a client-safe message and a
    /// diagnostic payload kept out of responses.
    pub fn invalid_input(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            detail: detail.into(),
        }
    }

    /// Create a workspace error
    pub fn workspace(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    /// Short message safe to put in a response body.
    ///
    /// Never echoes input bytes; `InvalidInput.detail` stays in the logs.
    pub fn client_message(&self) -> &str {
        match self {
            Self::InvalidInput { message, .. } => message,
            Self::Io { .. } | Self::Workspace { .. } => "internal processing error",
            Self::Cancelled => "request cancelled",
        }
    }

    /// True for errors caused by the request body rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display_uses_safe_message() {
        let err = MergeError::invalid_input("malformed JSON input", "byte 14: expected ':'");
        assert_eq!(err.to_string(), "invalid input: malformed JSON input");
        assert!(err.is_client_error());
        assert_eq!(err.client_message(), "malformed JSON input");
    }

    #[test]
    fn io_error_conversion_is_not_client_facing() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: MergeError = io_err.into();

        assert!(matches!(err, MergeError::Io { .. }));
        assert!(!err.is_client_error());
        assert_eq!(err.client_message(), "internal processing error");
    }
}
