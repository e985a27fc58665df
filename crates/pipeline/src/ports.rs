//! Port traits implemented by the infrastructure crates.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`ReleaseRepository`] | `github::GithubClient` |
//! | [`IssueTracker`] | `github::GithubClient` |
//! | [`VersionControl`] | `toolchain::SystemGit` |
//! | [`MarkerStore`] | `toolchain::FileMarker` |
//! | [`ArtifactBuilder`] | `toolchain::BunBuilder` |
//!
//! All traits are object safe so the orchestration layer can hold them as
//! `&dyn Trait` and tests can substitute the fakes in [`crate::testing`].

use std::path::Path;

use async_trait::async_trait;

use crate::{
    ArtifactOptions, AssetUpload, BuiltArtifact, CommitIdentity, IssueNumber, MirrorError,
    Namespace, NewRelease, Release, ReleaseAsset, ReleaseId, ReleasePage, ReleaseQuery, Version,
};

/// Content type used when uploading the compressed archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// Content type used when uploading the bundle itself.
pub const BUNDLE_CONTENT_TYPE: &str = "text/javascript";

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

/// Read access to both release namespaces and write access to the downstream
/// one.
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Fetches a release by tag, or the latest one.
    ///
    /// A release that does not exist is `Ok(None)`, never an error.
    async fn get_release(
        &self,
        namespace: Namespace,
        query: &ReleaseQuery,
    ) -> Result<Option<Release>, MirrorError>;

    /// Returns `true` if the tag exists, whether or not a release wraps it.
    async fn has_tag(&self, namespace: Namespace, version: &Version) -> Result<bool, MirrorError>;

    /// Fetches one page (1-based) of the newest-first release listing.
    async fn list_releases(&self, namespace: Namespace, page: u32)
        -> Result<ReleasePage, MirrorError>;

    /// Creates a downstream release.
    ///
    /// Fails with [`MirrorError::DownstreamReleaseAlreadyExists`] when the
    /// release exists already.
    async fn create_release(&self, release: &NewRelease) -> Result<Release, MirrorError>;

    /// Lists the assets currently attached to a downstream release.
    async fn list_assets(&self, release: ReleaseId) -> Result<Vec<ReleaseAsset>, MirrorError>;

    /// Attaches a file to a downstream release.
    ///
    /// Fails with [`MirrorError::UploadFailed`] when the upload is rejected.
    async fn upload_asset(
        &self,
        release: &Release,
        asset: AssetUpload,
    ) -> Result<ReleaseAsset, MirrorError>;
}

/// Lazily walks a newest-first release listing one page at a time.
///
/// The next page is requested only once the current one is exhausted, and
/// dropping the pager stops the walk. Each pager starts again from page 1.
pub struct ReleasePager<'a> {
    repository: &'a dyn ReleaseRepository,
    namespace: Namespace,
    buffered: std::vec::IntoIter<Release>,
    next_page: Option<u32>,
    pages_fetched: u32,
}

impl<'a> ReleasePager<'a> {
    pub fn new(repository: &'a dyn ReleaseRepository, namespace: Namespace) -> Self {
        Self {
            repository,
            namespace,
            buffered: Vec::new().into_iter(),
            next_page: Some(1),
            pages_fetched: 0,
        }
    }

    /// Returns the next release, fetching another page when needed.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`ReleaseRepository::list_releases`].
    pub async fn next(&mut self) -> Result<Option<Release>, MirrorError> {
        loop {
            if let Some(release) = self.buffered.next() {
                return Ok(Some(release));
            }
            let Some(page) = self.next_page else {
                return Ok(None);
            };

            let fetched = self.repository.list_releases(self.namespace, page).await?;
            self.pages_fetched += 1;
            tracing::debug!(
                namespace = %self.namespace,
                page,
                count = fetched.releases.len(),
                "fetched release page"
            );
            // A next page that does not move forward would loop forever.
            self.next_page = fetched.next_page.filter(|next| *next > page);
            self.buffered = fetched.releases.into_iter();
        }
    }

    /// Number of pages requested so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Write access to the downstream repository's issues.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn comment(&self, issue: IssueNumber, body: &str) -> Result<(), MirrorError>;

    async fn close(&self, issue: IssueNumber) -> Result<(), MirrorError>;
}

// ---------------------------------------------------------------------------
// Local working copy
// ---------------------------------------------------------------------------

/// The version-control operations needed to publish a marker change.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn configure_identity(&self, identity: &CommitIdentity) -> Result<(), MirrorError>;

    async fn stage(&self, path: &Path) -> Result<(), MirrorError>;

    async fn commit(&self, message: &str) -> Result<(), MirrorError>;

    /// Pushes the current branch to its upstream.
    async fn push(&self) -> Result<(), MirrorError>;
}

/// The single-line version marker file.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Path of the marker file, as staged in version control.
    fn path(&self) -> &Path;

    /// Returns the raw contents, or `None` if the file does not exist.
    async fn read(&self) -> Result<Option<String>, MirrorError>;

    async fn write(&self, version: &Version) -> Result<(), MirrorError>;
}

/// Produces the bundle artifact for a version.
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Installs, bundles and archives `version` according to `options`.
    async fn build(
        &self,
        version: &Version,
        options: &ArtifactOptions,
    ) -> Result<BuiltArtifact, MirrorError>;

    /// Reads a produced file so it can be uploaded.
    async fn read_output(&self, path: &Path) -> Result<Vec<u8>, MirrorError>;
}
