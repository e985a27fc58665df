//! Run configuration.
//!
//! [`MirrorConfig`] is built exactly once by the composition root and passed
//! by reference to every component that needs repository identity,
//! credentials, or artifact options. Nothing below the `cli` crate reads the
//! process environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ArtifactOptions, CommitIdentity, MirrorError, Namespace, RepositoryId};

/// Default GitHub REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Default file holding the currently mirrored version.
pub const DEFAULT_MARKER_PATH: &str = "VERSION";

/// A GitHub access token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a token, returning `None` for an empty string.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Returns the secret for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Everything a run needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// This project's repository, where mirrored releases are created.
    pub downstream: RepositoryId,
    /// The library repository being mirrored.
    pub upstream: RepositoryId,
    pub token: AccessToken,
    /// Base URL of the GitHub REST API, without a trailing slash.
    pub api_base_url: String,
    /// The version marker file, relative to the working directory.
    pub marker_path: PathBuf,
    pub identity: CommitIdentity,
    pub artifact: ArtifactOptions,
}

impl MirrorConfig {
    /// Creates a configuration mirroring `plotly/plotly.js` into `downstream`
    /// with every other setting at its default.
    pub fn new(downstream: RepositoryId, token: AccessToken) -> Self {
        Self {
            downstream,
            upstream: RepositoryId::plotly_js(),
            token,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            marker_path: PathBuf::from(DEFAULT_MARKER_PATH),
            identity: CommitIdentity::default(),
            artifact: ArtifactOptions::default(),
        }
    }

    /// Builds a configuration from raw `owner`, `repo` and `token` values as
    /// they arrive from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Configuration`] if any value is missing or
    /// malformed.
    pub fn from_parts(owner: &str, repo: &str, token: &str) -> Result<Self, MirrorError> {
        let downstream = RepositoryId::new(owner, repo).ok_or_else(|| MirrorError::Configuration {
            message: format!("'{owner}/{repo}' is not a valid downstream repository"),
        })?;
        let token = AccessToken::new(token).ok_or_else(|| MirrorError::Configuration {
            message: "the access token is empty".to_string(),
        })?;
        Ok(Self::new(downstream, token))
    }

    #[must_use]
    pub fn with_upstream(mut self, upstream: RepositoryId) -> Self {
        self.upstream = upstream;
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_marker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.marker_path = path.into();
        self
    }

    #[must_use]
    pub fn with_artifact(mut self, artifact: ArtifactOptions) -> Self {
        self.artifact = artifact;
        self
    }

    /// Resolves a namespace to the repository that backs it.
    pub fn repository(&self, namespace: Namespace) -> &RepositoryId {
        match namespace {
            Namespace::Upstream => &self.upstream,
            Namespace::Downstream => &self.downstream,
        }
    }
}
