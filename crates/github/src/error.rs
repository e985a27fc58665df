//! Errors raised by the GitHub adapter.

use pipeline::MirrorError;
use thiserror::Error;

/// A failed GitHub API call.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The request never produced a response (DNS, TLS, connection reset) or
    /// the response body could not be decoded.
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("{operation}: GitHub responded {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The client could not be constructed from the configuration.
    #[error("invalid client configuration: {0}")]
    Setup(String),
}

impl GithubError {
    /// Returns `true` for a validation failure reporting that the resource
    /// already exists (GitHub answers these with 422 and an `already_exists`
    /// error code).
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Status { status: 422, message, .. } if message.contains("already_exists"))
    }
}

impl From<GithubError> for MirrorError {
    fn from(error: GithubError) -> Self {
        let operation = match &error {
            GithubError::Transport { operation, .. } | GithubError::Status { operation, .. } => {
                *operation
            }
            GithubError::Setup(_) => "configure GitHub client",
        };
        MirrorError::api(operation, error)
    }
}
