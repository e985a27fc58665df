//! Top-level error type for the mirroring domain.
//!
//! [`MirrorError`] covers both the decision failures of the reconciliation
//! procedure (invalid version, missing upstream release, duplicate downstream
//! release, rejected upload) and the failures reported by the ports. Each
//! infrastructure crate defines its own error enum and converts it into one
//! of the port variants at the trait boundary, so nothing above the ports ever
//! sees an HTTP status or a process exit code.
//!
//! There is no retry classification: every error is terminal for the
//! invocation that produced it.

use thiserror::Error;

use crate::{RepositoryId, Version};

/// Errors produced while resolving, reconciling or publishing a release.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The requested version is not a well-formed semantic version.
    #[error("'{input}' is not a valid version of the form X.Y.Z or vX.Y.Z: {reason}")]
    InvalidVersion {
        /// The raw input as supplied by the caller.
        input: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The upstream library has no release for the requested version.
    #[error("Release with version {version} does not exist in {repository}")]
    UpstreamReleaseMissing {
        version: Version,
        repository: RepositoryId,
    },

    /// A downstream release for the requested version already exists.
    ///
    /// Produced by the strict policy at the existence check and by the
    /// release API when a concurrent run created the release first.
    #[error("Release with version {version} already exists in {repository}")]
    DownstreamReleaseAlreadyExists {
        version: Version,
        repository: RepositoryId,
    },

    /// An operation required an existing downstream release that is absent.
    #[error("Release with version {version} does not exist in {repository}; create it first")]
    DownstreamReleaseMissing {
        version: Version,
        repository: RepositoryId,
    },

    /// The release API rejected an asset upload (e.g. a duplicate asset name).
    #[error("Upload of asset '{asset}' failed: {reason}")]
    UploadFailed {
        /// Asset file name.
        asset: String,
        /// Reason reported by the API or the local file system.
        reason: String,
    },

    /// A release or issue API call failed.
    #[error("{operation} failed: {message}")]
    Api {
        /// Short description of the call (e.g. `"get release by tag"`).
        operation: String,
        message: String,
    },

    /// A version-control operation failed.
    #[error("Version control operation failed: {message}")]
    Vcs { message: String },

    /// Installing, bundling or archiving the artifact failed.
    #[error("Artifact build failed: {message}")]
    Build { message: String },

    /// The version marker file could not be read or written.
    #[error("Version marker file '{path}' could not be accessed: {message}")]
    Marker { path: String, message: String },

    /// Configuration supplied at start-up is incomplete or malformed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl MirrorError {
    /// Shorthand for an [`MirrorError::Api`] error.
    pub fn api(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}
