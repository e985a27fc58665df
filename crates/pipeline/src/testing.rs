//! In-memory implementations of every port, for tests.
//!
//! Available to this crate's own tests and, through the `testing` feature, to
//! the tests of downstream crates.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{ArtifactBuilder, IssueTracker, MarkerStore, ReleaseRepository, VersionControl};
use crate::{
    ArtifactOptions, AssetId, AssetUpload, BuiltArtifact, CommitIdentity, IssueNumber,
    MirrorError, Namespace, NewRelease, Release, ReleaseAsset, ReleaseId, ReleasePage,
    ReleaseQuery, RepositoryId, Version,
};

/// Downstream repository used by the fakes.
pub fn downstream_repository() -> RepositoryId {
    RepositoryId::new("owner", "plotly-mirror").expect("valid repository id")
}

/// Upstream repository used by the fakes.
pub fn upstream_repository() -> RepositoryId {
    RepositoryId::new("plotly", "plotly.js").expect("valid repository id")
}

/// Builds a release with predictable URLs.
pub fn release_fixture(id: u64, repository: &RepositoryId, tag: &str) -> Release {
    Release {
        id: ReleaseId::new(id),
        tag_name: tag.to_string(),
        name: Some(tag.to_string()),
        body: None,
        html_url: format!("https://github.com/{repository}/releases/tag/{tag}"),
        upload_url: format!("https://uploads.github.com/repos/{repository}/releases/{id}/assets"),
        prerelease: false,
        published_at: None,
        assets: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ReleaseState {
    upstream: Vec<Release>,
    downstream: Vec<Release>,
    downstream_tags: Vec<String>,
    next_id: u64,
    created: Vec<NewRelease>,
    uploads: Vec<(String, AssetUpload)>,
    pages_requested: Vec<(Namespace, u32)>,
    reject_uploads: bool,
}

/// A release repository holding both namespaces in memory.
///
/// Listings are returned in insertion order, `page_size` releases at a time.
/// The downstream "latest" release is the one with the highest version.
pub struct InMemoryReleases {
    state: Mutex<ReleaseState>,
    page_size: usize,
}

impl Default for InMemoryReleases {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReleases {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReleaseState {
                next_id: 1,
                ..ReleaseState::default()
            }),
            page_size: 100,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Adds upstream releases, listed in the given order.
    #[must_use]
    pub fn with_upstream(self, tags: &[&str]) -> Self {
        {
            let mut state = self.lock();
            for tag in tags {
                let id = state.bump_id();
                state.upstream.push(release_fixture(id, &upstream_repository(), tag));
            }
        }
        self
    }

    #[must_use]
    pub fn with_upstream_release(self, release: Release) -> Self {
        self.lock().upstream.push(release);
        self
    }

    /// Adds a downstream release (and its tag).
    #[must_use]
    pub fn with_downstream_release(self, tag: &str) -> Self {
        {
            let mut state = self.lock();
            let id = state.bump_id();
            state.downstream.push(release_fixture(id, &downstream_repository(), tag));
            state.downstream_tags.push(tag.to_string());
        }
        self
    }

    /// Adds a downstream tag that no release wraps.
    #[must_use]
    pub fn with_downstream_tag(self, tag: &str) -> Self {
        self.lock().downstream_tags.push(tag.to_string());
        self
    }

    /// Makes every asset upload fail.
    #[must_use]
    pub fn rejecting_uploads(self) -> Self {
        self.lock().reject_uploads = true;
        self
    }

    /// Releases created through [`ReleaseRepository::create_release`].
    pub fn created(&self) -> Vec<NewRelease> {
        self.lock().created.clone()
    }

    /// `(release tag, upload)` pairs, in upload order.
    pub fn uploads(&self) -> Vec<(String, AssetUpload)> {
        self.lock().uploads.clone()
    }

    /// Pages requested for a namespace, in request order.
    pub fn pages_requested(&self, namespace: Namespace) -> Vec<u32> {
        self.lock()
            .pages_requested
            .iter()
            .filter(|(ns, _)| *ns == namespace)
            .map(|(_, page)| *page)
            .collect()
    }

    /// Current state of a downstream release.
    pub fn downstream_release(&self, tag: &str) -> Option<Release> {
        self.lock().downstream.iter().find(|r| r.tag_name == tag).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReleaseState> {
        self.state.lock().expect("release state lock poisoned")
    }
}

impl ReleaseState {
    fn bump_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn releases(&self, namespace: Namespace) -> &[Release] {
        match namespace {
            Namespace::Upstream => &self.upstream,
            Namespace::Downstream => &self.downstream,
        }
    }
}

#[async_trait]
impl ReleaseRepository for InMemoryReleases {
    async fn get_release(
        &self,
        namespace: Namespace,
        query: &ReleaseQuery,
    ) -> Result<Option<Release>, MirrorError> {
        let state = self.lock();
        let releases = state.releases(namespace);
        let found = match query {
            ReleaseQuery::Tag(version) => {
                let tag = version.to_string();
                releases.iter().find(|r| r.tag_name == tag).cloned()
            }
            ReleaseQuery::Latest => match namespace {
                Namespace::Upstream => releases.first().cloned(),
                Namespace::Downstream => releases.iter().max_by_key(|r| r.tag_version()).cloned(),
            },
        };
        Ok(found)
    }

    async fn has_tag(&self, namespace: Namespace, version: &Version) -> Result<bool, MirrorError> {
        let state = self.lock();
        let wanted = version.to_string();
        let exists = match namespace {
            Namespace::Upstream => state.upstream.iter().any(|r| r.tag_name == wanted),
            Namespace::Downstream => state.downstream_tags.iter().any(|tag| *tag == wanted),
        };
        Ok(exists)
    }

    async fn list_releases(
        &self,
        namespace: Namespace,
        page: u32,
    ) -> Result<ReleasePage, MirrorError> {
        let mut state = self.lock();
        state.pages_requested.push((namespace, page));
        let releases = state.releases(namespace);
        let start = (page.saturating_sub(1) as usize) * self.page_size;
        let end = (start + self.page_size).min(releases.len());
        let slice = releases.get(start..end).unwrap_or_default().to_vec();
        let next_page = (end < releases.len()).then_some(page + 1);
        Ok(ReleasePage {
            releases: slice,
            next_page,
        })
    }

    async fn create_release(&self, release: &NewRelease) -> Result<Release, MirrorError> {
        let mut state = self.lock();
        if state.downstream.iter().any(|r| r.tag_name == release.tag_name) {
            return Err(MirrorError::DownstreamReleaseAlreadyExists {
                version: Version::parse_strict(&release.tag_name)?,
                repository: downstream_repository(),
            });
        }
        let id = state.bump_id();
        let mut created = release_fixture(id, &downstream_repository(), &release.tag_name);
        created.name = Some(release.name.clone());
        created.body = Some(release.body.clone());
        state.created.push(release.clone());
        state.downstream.push(created.clone());
        if !state.downstream_tags.contains(&release.tag_name) {
            state.downstream_tags.push(release.tag_name.clone());
        }
        Ok(created)
    }

    async fn list_assets(&self, release: ReleaseId) -> Result<Vec<ReleaseAsset>, MirrorError> {
        self.lock()
            .downstream
            .iter()
            .find(|r| r.id == release)
            .map(|r| r.assets.clone())
            .ok_or_else(|| MirrorError::api("list release assets", format!("release {release} not found")))
    }

    async fn upload_asset(
        &self,
        release: &Release,
        asset: AssetUpload,
    ) -> Result<ReleaseAsset, MirrorError> {
        let mut state = self.lock();
        if state.reject_uploads {
            return Err(MirrorError::UploadFailed {
                asset: asset.name,
                reason: "uploads are rejected".to_string(),
            });
        }
        let id = state.bump_id();
        let target = state
            .downstream
            .iter_mut()
            .find(|r| r.id == release.id)
            .ok_or_else(|| MirrorError::api("upload release asset", "release not found"))?;
        if target.has_asset(&asset.name) {
            return Err(MirrorError::UploadFailed {
                asset: asset.name,
                reason: "an asset with this name already exists".to_string(),
            });
        }
        let uploaded = ReleaseAsset {
            id: AssetId::new(id),
            name: asset.name.clone(),
            content_type: asset.content_type.clone(),
            size: asset.data.len() as u64,
            browser_download_url: format!("{}/{}", target.html_url, asset.name),
        };
        target.assets.push(uploaded.clone());
        let tag = target.tag_name.clone();
        state.uploads.push((tag, asset));
        Ok(uploaded)
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// A call made against [`RecordingIssues`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueCall {
    Comment(IssueNumber, String),
    Close(IssueNumber),
}

/// Records issue comments and closures.
#[derive(Default)]
pub struct RecordingIssues {
    calls: Mutex<Vec<IssueCall>>,
}

impl RecordingIssues {
    pub fn calls(&self) -> Vec<IssueCall> {
        self.calls.lock().expect("issue lock poisoned").clone()
    }
}

#[async_trait]
impl IssueTracker for RecordingIssues {
    async fn comment(&self, issue: IssueNumber, body: &str) -> Result<(), MirrorError> {
        self.calls
            .lock()
            .expect("issue lock poisoned")
            .push(IssueCall::Comment(issue, body.to_string()));
        Ok(())
    }

    async fn close(&self, issue: IssueNumber) -> Result<(), MirrorError> {
        self.calls
            .lock()
            .expect("issue lock poisoned")
            .push(IssueCall::Close(issue));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Version control and marker file
// ---------------------------------------------------------------------------

/// A call made against [`RecordingVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    ConfigureIdentity(CommitIdentity),
    Stage(PathBuf),
    Commit(String),
    Push,
}

/// Records version-control calls without touching a repository.
#[derive(Default)]
pub struct RecordingVcs {
    calls: Mutex<Vec<VcsCall>>,
}

impl RecordingVcs {
    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().expect("vcs lock poisoned").clone()
    }

    /// Messages of every commit made so far.
    pub fn commits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VcsCall::Commit(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: VcsCall) {
        self.calls.lock().expect("vcs lock poisoned").push(call);
    }
}

#[async_trait]
impl VersionControl for RecordingVcs {
    async fn configure_identity(&self, identity: &CommitIdentity) -> Result<(), MirrorError> {
        self.record(VcsCall::ConfigureIdentity(identity.clone()));
        Ok(())
    }

    async fn stage(&self, path: &Path) -> Result<(), MirrorError> {
        self.record(VcsCall::Stage(path.to_path_buf()));
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<(), MirrorError> {
        self.record(VcsCall::Commit(message.to_string()));
        Ok(())
    }

    async fn push(&self) -> Result<(), MirrorError> {
        self.record(VcsCall::Push);
        Ok(())
    }
}

/// A marker file held in memory.
pub struct InMemoryMarker {
    path: PathBuf,
    contents: Mutex<Option<String>>,
    writes: Mutex<u32>,
}

impl Default for InMemoryMarker {
    fn default() -> Self {
        Self::absent()
    }
}

impl InMemoryMarker {
    /// A marker file that does not exist yet.
    pub fn absent() -> Self {
        Self {
            path: PathBuf::from("VERSION"),
            contents: Mutex::new(None),
            writes: Mutex::new(0),
        }
    }

    /// A marker file holding `contents` verbatim.
    pub fn containing(contents: &str) -> Self {
        let marker = Self::absent();
        *marker.contents.lock().expect("marker lock poisoned") = Some(contents.to_string());
        marker
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().expect("marker lock poisoned").clone()
    }

    /// Number of writes performed through the port.
    pub fn writes(&self) -> u32 {
        *self.writes.lock().expect("marker lock poisoned")
    }
}

#[async_trait]
impl MarkerStore for InMemoryMarker {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Option<String>, MirrorError> {
        Ok(self.contents())
    }

    async fn write(&self, version: &Version) -> Result<(), MirrorError> {
        *self.contents.lock().expect("marker lock poisoned") = Some(version.to_string());
        *self.writes.lock().expect("marker lock poisoned") += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Pretends to build artifacts; file contents are derived from their paths.
#[derive(Default)]
pub struct FakeBuilder {
    builds: Mutex<Vec<Version>>,
    fail: bool,
}

impl FakeBuilder {
    /// A builder whose every build fails.
    pub fn failing() -> Self {
        Self {
            builds: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn builds(&self) -> Vec<Version> {
        self.builds.lock().expect("builder lock poisoned").clone()
    }
}

#[async_trait]
impl ArtifactBuilder for FakeBuilder {
    async fn build(
        &self,
        version: &Version,
        options: &ArtifactOptions,
    ) -> Result<BuiltArtifact, MirrorError> {
        if self.fail {
            return Err(MirrorError::Build {
                message: "bundler exited with status 1".to_string(),
            });
        }
        self.builds
            .lock()
            .expect("builder lock poisoned")
            .push(version.clone());
        Ok(BuiltArtifact {
            version: version.clone(),
            archive_path: PathBuf::from(&options.archive_name),
            bundle_path: options.bundle_path(),
        })
    }

    async fn read_output(&self, path: &Path) -> Result<Vec<u8>, MirrorError> {
        Ok(format!("contents of {}", path.display()).into_bytes())
    }
}
