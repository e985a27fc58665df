//! Core domain for plotly-mirror.
//!
//! This crate contains every domain concept, identifier, value type and error
//! type used to mirror upstream plotly.js releases into a downstream
//! repository, plus the port traits the infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`version`] | Version parsing, coercion and ordering |
//! | [`identifiers`] | Newtype identifiers (`ReleaseId`, `RepositoryId`, etc.) |
//! | [`types`] | Releases, requests, artifact options |
//! | [`config`] | The run configuration built once at start-up |
//! | [`ports`] | Traits implemented by `github` and `toolchain` |
//! | [`scanner`] | Upstream versions not yet mirrored |
//! | [`trigger`] | Release requests encoded in issue titles |
//! | [`errors`] | The domain error type |

pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod scanner;
pub mod trigger;
pub mod types;
pub mod version;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{AccessToken, MirrorConfig};
pub use errors::MirrorError;
pub use identifiers::{AssetId, IssueNumber, ReleaseId, RepositoryId, RunId};
pub use scanner::ScanStrategy;
pub use trigger::requested_version;
pub use types::{
    marker_commit_message, ArtifactOptions, AssetUpload, BuiltArtifact, CommitIdentity,
    IssueEvent, MakeLatest, Namespace, NewRelease, Release, ReleaseAsset, ReleaseBundle,
    ReleasePage, ReleaseQuery, Request, Strictness, UnreleasedScan,
};
pub use version::{compare, normalize, TagVersion, Version};
