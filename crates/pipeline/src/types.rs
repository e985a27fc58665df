//! Shared value types for the mirroring domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the data that flows between the ports and the reconciliation procedure:
//! releases and their assets, reconciliation requests, and artifact options.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AssetId, IssueNumber, ReleaseId, TagVersion, Version};

// ---------------------------------------------------------------------------
// Release namespaces
// ---------------------------------------------------------------------------

/// Which of the two release lists an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// The mirrored library's releases. Read-only.
    Upstream,
    /// This project's own releases. Read-write.
    Downstream,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream => f.write_str("upstream"),
            Self::Downstream => f.write_str("downstream"),
        }
    }
}

/// Selects a single release within a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseQuery {
    /// The release whose tag is exactly this version.
    Tag(Version),
    /// The release the namespace currently marks as latest.
    Latest,
}

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

/// A published release in either namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub tag_name: String,
    /// Display name; GitHub allows it to be empty.
    pub name: Option<String>,
    pub body: Option<String>,
    /// Web page of the release.
    pub html_url: String,
    /// Asset upload endpoint, with any URI-template suffix already removed.
    pub upload_url: String,
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Parses the tag for ordering; `None` for tags that are not semantic
    /// versions (e.g. `nightly`).
    pub fn tag_version(&self) -> Option<TagVersion> {
        TagVersion::parse(&self.tag_name)
    }

    /// Returns `true` if an asset with this file name is attached.
    pub fn has_asset(&self, name: &str) -> bool {
        self.assets.iter().any(|a| a.name == name)
    }
}

/// A file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: AssetId,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub browser_download_url: String,
}

/// One page of a newest-first release listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReleasePage {
    pub releases: Vec<Release>,
    /// Number of the following page, or `None` if this was the last.
    pub next_page: Option<u32>,
}

/// How a newly created release competes for the "latest" badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MakeLatest {
    True,
    False,
    /// Latest is decided by semantic version and creation date, so releases
    /// mirrored out of order still rank by version.
    Legacy,
}

impl MakeLatest {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Legacy => "legacy",
        }
    }
}

/// Parameters for creating a downstream release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    /// Branch or commit to tag; `None` uses the repository default branch.
    pub target_commitish: Option<String>,
    pub make_latest: MakeLatest,
}

impl NewRelease {
    /// Builds the mirror release for `version`, linking back to the upstream
    /// release page.
    pub fn mirroring(version: &Version, upstream: &Release) -> Self {
        Self {
            tag_name: version.to_string(),
            name: version.to_string(),
            body: format!("[plotly.js release]({})", upstream.html_url),
            target_commitish: None,
            make_latest: MakeLatest::Legacy,
        }
    }
}

/// A file to attach to a release.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for AssetUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetUpload")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Reconciliation requests
// ---------------------------------------------------------------------------

/// Everything the reconciliation procedure needs to know about one version,
/// fetched up front.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseBundle {
    pub version: Version,
    /// The downstream release for `version`, if one exists.
    pub downstream: Option<Release>,
    /// The upstream release for `version`, if one exists.
    pub upstream: Option<Release>,
    /// Whether the downstream repository already has the tag, with or
    /// without a release wrapping it.
    pub has_tag: bool,
}

/// Input to the reconciliation procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// A raw, not yet validated version string.
    ByVersion(String),
    /// A pre-fetched bundle; no further lookups are made.
    ByBundle(ReleaseBundle),
}

impl From<ReleaseBundle> for Request {
    fn from(bundle: ReleaseBundle) -> Self {
        Self::ByBundle(bundle)
    }
}

/// How the procedure treats a missing upstream release or an existing
/// downstream release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Both conditions abort the run with an error.
    Strict,
    /// Both conditions are logged and the run ends successfully.
    #[default]
    Lenient,
}

/// Result of scanning upstream for versions not yet mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnreleasedScan {
    /// The smallest upstream version greater than the downstream latest.
    pub earliest: Option<Version>,
    /// How many upstream versions are greater than the downstream latest.
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// The part of an `issues` event the mirror acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEvent {
    pub number: IssueNumber,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Artifacts and version control
// ---------------------------------------------------------------------------

/// Recognized options for building and uploading the bundle artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactOptions {
    /// File name of the minified bundle. Default `plotly-esm-min.mjs`.
    pub bundle_name: String,
    /// Directory the bundle and its marker file are written to. Default `./out`.
    pub output_dir: PathBuf,
    /// File name of the gzip-compressed tar archive. Default `plotly-esm-min.tar.gz`.
    pub archive_name: String,
    /// Whether to install the matching package version first. Default `true`.
    pub install: bool,
    /// Entry file handed to the bundler. Default `./plotly_esm.ts`.
    pub entrypoint: PathBuf,
    /// Published package providing the library. Default `plotly.js-dist-min`.
    pub package: String,
    /// Whether the bundle is uploaded as its own asset next to the archive.
    /// Default `true`.
    pub upload_bundle: bool,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            bundle_name: "plotly-esm-min.mjs".to_string(),
            output_dir: PathBuf::from("./out"),
            archive_name: "plotly-esm-min.tar.gz".to_string(),
            install: true,
            entrypoint: PathBuf::from("./plotly_esm.ts"),
            package: "plotly.js-dist-min".to_string(),
            upload_bundle: true,
        }
    }
}

impl ArtifactOptions {
    /// Path of the bundle inside the output directory.
    pub fn bundle_path(&self) -> PathBuf {
        self.output_dir.join(&self.bundle_name)
    }

    /// Names of the assets a complete release carries, archive first.
    pub fn asset_names(&self) -> Vec<&str> {
        let mut names = vec![self.archive_name.as_str()];
        if self.upload_bundle {
            names.push(self.bundle_name.as_str());
        }
        names
    }
}

/// Files produced by a successful artifact build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    pub version: Version,
    pub archive_path: PathBuf,
    pub bundle_path: PathBuf,
}

/// Committer identity used for marker file commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "Add Plotly Version".to_string(),
            email: "add_plotly_version@email.com".to_string(),
        }
    }
}

/// Returns the commit message recorded when the marker moves to `version`.
pub fn marker_commit_message(version: &Version) -> String {
    format!("add plotly.js version {version}")
}
