//! The release reconciliation procedure.
//!
//! One invocation walks a fixed sequence of stages:
//!
//! ```text
//! Validate → CheckExisting → CommitMarker → CreateRelease → BuildArtifact → UploadArtifact → Done
//! ```
//!
//! Nothing is rolled back when a later stage fails. Instead every stage can
//! tell when its work is already done (an existing release, an existing tag,
//! a marker that already holds the version), so re-running the procedure with
//! the same version completes what an interrupted run left behind.

use std::path::Path;

use pipeline::ports::{
    ArtifactBuilder, MarkerStore, ReleaseRepository, VersionControl, ARCHIVE_CONTENT_TYPE,
    BUNDLE_CONTENT_TYPE,
};
use pipeline::{
    marker_commit_message, AssetUpload, BuiltArtifact, MirrorConfig, MirrorError, Namespace,
    NewRelease, Release, ReleaseAsset, ReleaseBundle, ReleaseQuery, Request, Strictness, Version,
};
use tracing::{debug, info, instrument, warn};

/// The stages of one reconciliation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validate,
    CheckExisting,
    CommitMarker,
    CreateRelease,
    BuildArtifact,
    UploadArtifact,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::CheckExisting => "check_existing",
            Self::CommitMarker => "commit_marker",
            Self::CreateRelease => "create_release",
            Self::BuildArtifact => "build_artifact",
            Self::UploadArtifact => "upload_artifact",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a reconciliation run ended successfully.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new downstream release was created and its assets uploaded.
    Released(Release),
    /// The downstream release already existed; nothing was changed.
    /// Only produced under [`Strictness::Lenient`].
    AlreadyReleased(Release),
    /// Upstream has no release for the version; nothing was changed.
    /// Only produced under [`Strictness::Lenient`].
    UpstreamMissing(Version),
}

/// What the CommitMarker stage did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOutcome {
    /// The downstream tag already exists; the tag is authoritative.
    TagExists,
    /// The marker already held the version.
    AlreadyCurrent,
    /// The marker was rewritten, committed and pushed.
    Committed,
}

/// The ports a reconciliation run needs.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub releases: &'a dyn ReleaseRepository,
    pub vcs: &'a dyn VersionControl,
    pub marker: &'a dyn MarkerStore,
    pub builder: &'a dyn ArtifactBuilder,
}

/// Drives the reconciliation procedure against a set of ports.
pub struct Reconciler<'a> {
    config: &'a MirrorConfig,
    ports: Ports<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a MirrorConfig, ports: Ports<'a>) -> Self {
        Self { config, ports }
    }

    pub fn config(&self) -> &MirrorConfig {
        self.config
    }

    pub fn releases(&self) -> &'a dyn ReleaseRepository {
        self.ports.releases
    }

    /// Ensures a downstream release exists for the requested version.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::InvalidVersion`] if a raw version is malformed.
    /// - [`MirrorError::UpstreamReleaseMissing`] and
    ///   [`MirrorError::DownstreamReleaseAlreadyExists`] under
    ///   [`Strictness::Strict`].
    /// - [`MirrorError::UploadFailed`] if an asset upload is rejected.
    /// - Any port error, unchanged.
    #[instrument(skip(self, request))]
    pub async fn reconcile(
        &self,
        request: Request,
        strictness: Strictness,
    ) -> Result<Outcome, MirrorError> {
        enter(Stage::Validate);
        let bundle = self.resolve(request).await?;
        let version = bundle.version;

        enter(Stage::CheckExisting);
        let Some(upstream) = bundle.upstream else {
            let missing = MirrorError::UpstreamReleaseMissing {
                version: version.clone(),
                repository: self.config.upstream.clone(),
            };
            return match strictness {
                Strictness::Strict => Err(missing),
                Strictness::Lenient => {
                    warn!(%version, "{missing}; nothing to mirror");
                    Ok(Outcome::UpstreamMissing(version))
                }
            };
        };
        if let Some(existing) = bundle.downstream {
            return match strictness {
                Strictness::Strict => Err(MirrorError::DownstreamReleaseAlreadyExists {
                    version,
                    repository: self.config.downstream.clone(),
                }),
                Strictness::Lenient => {
                    info!(%version, url = %existing.html_url, "release already exists; nothing to do");
                    Ok(Outcome::AlreadyReleased(existing))
                }
            };
        }

        info!(%version, published_at = ?upstream.published_at, "creating new release");
        enter(Stage::CommitMarker);
        self.commit_marker(&version, bundle.has_tag).await?;

        enter(Stage::CreateRelease);
        let mut release = self
            .ports
            .releases
            .create_release(&NewRelease::mirroring(&version, &upstream))
            .await?;
        info!(%version, url = %release.html_url, "created downstream release");

        enter(Stage::BuildArtifact);
        let built = self.ports.builder.build(&version, &self.config.artifact).await?;

        enter(Stage::UploadArtifact);
        let uploaded = self.upload(&release, &built, |_| true).await?;
        release.assets.extend(uploaded);

        enter(Stage::Done);
        Ok(Outcome::Released(release))
    }

    /// Validates a raw request and fetches everything the procedure needs to
    /// decide. A pre-fetched bundle is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidVersion`] for a malformed raw version,
    /// and propagates repository errors.
    pub async fn resolve(&self, request: Request) -> Result<ReleaseBundle, MirrorError> {
        match request {
            Request::ByVersion(raw) => {
                let version = Version::parse_strict(&raw)?;
                self.fetch_bundle(version).await
            }
            Request::ByBundle(bundle) => Ok(bundle),
        }
    }

    /// Looks up the downstream release, the downstream tag and the upstream
    /// release for `version`.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn fetch_bundle(&self, version: Version) -> Result<ReleaseBundle, MirrorError> {
        let query = ReleaseQuery::Tag(version.clone());
        let releases = self.ports.releases;

        let downstream = releases.get_release(Namespace::Downstream, &query).await?;
        let has_tag = releases.has_tag(Namespace::Downstream, &version).await?;
        let upstream = releases.get_release(Namespace::Upstream, &query).await?;
        debug!(
            %version,
            downstream = downstream.is_some(),
            has_tag,
            upstream = upstream.is_some(),
            "resolved release bundle"
        );

        Ok(ReleaseBundle {
            version,
            downstream,
            upstream,
            has_tag,
        })
    }

    /// Moves the marker file to `version` and publishes the change, unless
    /// the tag already exists or the marker is already current.
    ///
    /// # Errors
    ///
    /// Propagates marker and version-control errors.
    #[instrument(skip(self, version), fields(version = %version))]
    pub async fn commit_marker(
        &self,
        version: &Version,
        has_tag: bool,
    ) -> Result<MarkerOutcome, MirrorError> {
        if has_tag {
            info!("tag exists without a release; leaving the marker file untouched");
            return Ok(MarkerOutcome::TagExists);
        }

        let expected = version.to_string();
        let marker = self.ports.marker;
        if marker.read().await?.is_some_and(|current| current.trim() == expected) {
            info!(path = %marker.path().display(), "marker file already holds this version");
            return Ok(MarkerOutcome::AlreadyCurrent);
        }

        marker.write(version).await?;

        let vcs = self.ports.vcs;
        vcs.configure_identity(&self.config.identity).await?;
        vcs.stage(marker.path()).await?;
        vcs.commit(&marker_commit_message(version)).await?;
        vcs.push().await?;
        info!(path = %marker.path().display(), "committed and pushed marker file");

        Ok(MarkerOutcome::Committed)
    }

    /// Builds and uploads whichever configured assets an existing downstream
    /// release is missing. Returns the uploaded assets; empty when the
    /// release was already complete.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::InvalidVersion`] if `raw` is malformed.
    /// - [`MirrorError::DownstreamReleaseMissing`] if there is no release.
    /// - [`MirrorError::UploadFailed`] if an upload is rejected.
    #[instrument(skip(self))]
    pub async fn upload_missing_assets(&self, raw: &str) -> Result<Vec<ReleaseAsset>, MirrorError> {
        let version = Version::parse_strict(raw)?;
        let releases = self.ports.releases;

        let Some(mut release) = releases
            .get_release(Namespace::Downstream, &ReleaseQuery::Tag(version.clone()))
            .await?
        else {
            return Err(MirrorError::DownstreamReleaseMissing {
                version,
                repository: self.config.downstream.clone(),
            });
        };
        release.assets = releases.list_assets(release.id).await?;

        let missing: Vec<&str> = self
            .config
            .artifact
            .asset_names()
            .into_iter()
            .filter(|name| !release.has_asset(name))
            .collect();
        if missing.is_empty() {
            info!(%version, "release already carries every asset");
            return Ok(Vec::new());
        }
        info!(%version, ?missing, "uploading missing assets");

        let built = self.ports.builder.build(&version, &self.config.artifact).await?;
        self.upload(&release, &built, |name| missing.iter().any(|m| *m == name))
            .await
    }

    async fn upload(
        &self,
        release: &Release,
        built: &BuiltArtifact,
        wanted: impl Fn(&str) -> bool,
    ) -> Result<Vec<ReleaseAsset>, MirrorError> {
        let options = &self.config.artifact;
        let mut plan: Vec<(&str, &Path, &str)> = vec![(
            options.archive_name.as_str(),
            built.archive_path.as_path(),
            ARCHIVE_CONTENT_TYPE,
        )];
        if options.upload_bundle {
            plan.push((
                options.bundle_name.as_str(),
                built.bundle_path.as_path(),
                BUNDLE_CONTENT_TYPE,
            ));
        }

        let mut uploaded = Vec::with_capacity(plan.len());
        for (name, path, content_type) in plan.into_iter().filter(|(name, _, _)| wanted(*name)) {
            let data = self.ports.builder.read_output(path).await?;
            let asset = self
                .ports
                .releases
                .upload_asset(
                    release,
                    AssetUpload {
                        name: name.to_string(),
                        content_type: content_type.to_string(),
                        data,
                    },
                )
                .await?;
            info!(asset = %asset.name, size = asset.size, "uploaded release asset");
            uploaded.push(asset);
        }
        Ok(uploaded)
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "entering stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::testing::{
        downstream_repository, release_fixture, upstream_repository, FakeBuilder,
        InMemoryMarker, InMemoryReleases, RecordingVcs, VcsCall,
    };
    use pipeline::{AccessToken, CommitIdentity, MakeLatest};

    struct Fixture {
        config: MirrorConfig,
        releases: InMemoryReleases,
        vcs: RecordingVcs,
        marker: InMemoryMarker,
        builder: FakeBuilder,
    }

    impl Fixture {
        fn new(releases: InMemoryReleases) -> Self {
            Self {
                config: MirrorConfig::new(
                    downstream_repository(),
                    AccessToken::new("token").unwrap(),
                ),
                releases,
                vcs: RecordingVcs::default(),
                marker: InMemoryMarker::absent(),
                builder: FakeBuilder::default(),
            }
        }

        fn with_marker(mut self, marker: InMemoryMarker) -> Self {
            self.marker = marker;
            self
        }

        fn with_builder(mut self, builder: FakeBuilder) -> Self {
            self.builder = builder;
            self
        }

        fn reconciler(&self) -> Reconciler<'_> {
            Reconciler::new(
                &self.config,
                Ports {
                    releases: &self.releases,
                    vcs: &self.vcs,
                    marker: &self.marker,
                    builder: &self.builder,
                },
            )
        }
    }

    fn upstream_with_url(tag: &str, url: &str) -> Release {
        let mut release = release_fixture(900, &upstream_repository(), tag);
        release.html_url = url.to_string();
        release
    }

    #[tokio::test]
    async fn prerelease_request_is_normalized_to_its_final_release() {
        let fixture = Fixture::new(
            InMemoryReleases::new()
                .with_upstream(&["v3.0.0", "v3.0.0-rc.1"]),
        );

        let outcome = fixture
            .reconciler()
            .reconcile(Request::ByVersion("3.0.0-rc.1".to_string()), Strictness::Strict)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Released(ref r) if r.tag_name == "v3.0.0"));
        assert_eq!(fixture.releases.created()[0].tag_name, "v3.0.0");
        assert_eq!(fixture.marker.contents().as_deref(), Some("v3.0.0"));
        assert_eq!(fixture.builder.builds(), vec![Version::new(3, 0, 0)]);
    }

    #[tokio::test]
    async fn mirrors_a_new_version_end_to_end() {
        let fixture = Fixture::new(
            InMemoryReleases::new()
                .with_upstream_release(upstream_with_url("v2.5.0", "https://x/releases/v2.5.0")),
        );

        let outcome = fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap();

        assert_eq!(fixture.marker.contents().as_deref(), Some("v2.5.0"));
        assert_eq!(
            fixture.vcs.calls(),
            vec![
                VcsCall::ConfigureIdentity(CommitIdentity::default()),
                VcsCall::Stage("VERSION".into()),
                VcsCall::Commit("add plotly.js version v2.5.0".to_string()),
                VcsCall::Push,
            ]
        );

        let created = fixture.releases.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].tag_name, "v2.5.0");
        assert_eq!(created[0].name, "v2.5.0");
        assert!(created[0].body.contains("https://x/releases/v2.5.0"));
        assert_eq!(created[0].make_latest, MakeLatest::Legacy);

        assert_eq!(fixture.builder.builds(), vec![Version::new(2, 5, 0)]);
        let uploads = fixture.releases.uploads();
        let names: Vec<_> = uploads.iter().map(|(_, u)| u.name.as_str()).collect();
        assert_eq!(names, vec!["plotly-esm-min.tar.gz", "plotly-esm-min.mjs"]);
        assert_eq!(uploads[0].1.content_type, "application/gzip");
        assert_eq!(uploads[1].1.content_type, "text/javascript");

        let Outcome::Released(release) = outcome else {
            panic!("expected a new release, got {outcome:?}");
        };
        assert_eq!(release.tag_name, "v2.5.0");
        assert_eq!(release.assets.len(), 2);
    }

    #[tokio::test]
    async fn second_run_for_the_same_version_changes_nothing() {
        let fixture = Fixture::new(InMemoryReleases::new().with_upstream(&["v2.5.0"]));
        let reconciler = fixture.reconciler();

        reconciler
            .reconcile(Request::ByVersion("v2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap();
        let vcs_calls = fixture.vcs.calls().len();

        let second = reconciler
            .reconcile(Request::ByVersion("v2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap();

        assert!(matches!(second, Outcome::AlreadyReleased(_)));
        assert_eq!(fixture.vcs.calls().len(), vcs_calls);
        assert_eq!(fixture.vcs.commits().len(), 1);
        assert_eq!(fixture.releases.created().len(), 1);
        assert_eq!(fixture.releases.uploads().len(), 2);
        assert_eq!(fixture.builder.builds().len(), 1);
    }

    #[tokio::test]
    async fn strict_policy_rejects_existing_downstream_release() {
        let fixture = Fixture::new(
            InMemoryReleases::new()
                .with_upstream(&["v2.5.0"])
                .with_downstream_release("v2.5.0"),
        );

        let err = fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Strict)
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::DownstreamReleaseAlreadyExists { .. }));
        assert!(fixture.vcs.calls().is_empty());
        assert!(fixture.releases.created().is_empty());
    }

    #[tokio::test]
    async fn missing_upstream_release_depends_on_policy() {
        let fixture = Fixture::new(InMemoryReleases::new().with_upstream(&["v2.4.0"]));
        let reconciler = fixture.reconciler();

        let err = reconciler
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::UpstreamReleaseMissing { .. }));

        let outcome = reconciler
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::UpstreamMissing(Version::new(2, 5, 0)));

        assert!(fixture.vcs.calls().is_empty());
        assert!(fixture.releases.created().is_empty());
        assert_eq!(fixture.marker.writes(), 0);
    }

    #[tokio::test]
    async fn invalid_version_fails_before_any_lookup() {
        let fixture = Fixture::new(InMemoryReleases::new());

        for raw in ["not-a-version", "2.5", ""] {
            let err = fixture
                .reconciler()
                .reconcile(Request::ByVersion(raw.to_string()), Strictness::Lenient)
                .await
                .unwrap_err();
            assert!(matches!(err, MirrorError::InvalidVersion { .. }), "{raw}: {err}");
        }
    }

    #[tokio::test]
    async fn existing_tag_skips_the_marker_commit() {
        let fixture = Fixture::new(
            InMemoryReleases::new()
                .with_upstream(&["v2.5.0"])
                .with_downstream_tag("v2.5.0"),
        );

        let outcome = fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Strict)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Released(_)));
        assert_eq!(fixture.marker.writes(), 0);
        assert!(fixture.vcs.calls().is_empty());
        assert_eq!(fixture.releases.created().len(), 1);
    }

    #[tokio::test]
    async fn current_marker_is_not_rewritten_or_committed() {
        let fixture = Fixture::new(InMemoryReleases::new().with_upstream(&["v2.5.0"]))
            .with_marker(InMemoryMarker::containing("v2.5.0\n"));

        fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap();

        assert_eq!(fixture.marker.writes(), 0);
        assert!(fixture.vcs.commits().is_empty());
        assert_eq!(fixture.releases.created().len(), 1);
    }

    #[tokio::test]
    async fn stale_marker_is_overwritten() {
        let fixture = Fixture::new(InMemoryReleases::new().with_upstream(&["v2.5.0"]))
            .with_marker(InMemoryMarker::containing("v2.4.0"));

        fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap();

        assert_eq!(fixture.marker.contents().as_deref(), Some("v2.5.0"));
        assert_eq!(fixture.vcs.commits(), vec!["add plotly.js version v2.5.0"]);
    }

    #[tokio::test]
    async fn prefetched_bundle_is_used_without_lookups() {
        let fixture = Fixture::new(InMemoryReleases::new());
        let bundle = ReleaseBundle {
            version: Version::new(2, 5, 0),
            downstream: None,
            upstream: Some(upstream_with_url("v2.5.0", "https://x/releases/v2.5.0")),
            has_tag: true,
        };

        let outcome = fixture
            .reconciler()
            .reconcile(bundle.into(), Strictness::Strict)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Released(_)));
        assert!(fixture.releases.pages_requested(Namespace::Upstream).is_empty());
        assert_eq!(fixture.releases.created().len(), 1);
    }

    #[tokio::test]
    async fn rejected_upload_surfaces_upload_failed() {
        let fixture = Fixture::new(
            InMemoryReleases::new()
                .with_upstream(&["v2.5.0"])
                .rejecting_uploads(),
        );

        let err = fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::UploadFailed { .. }));
        // The release stays; nothing is rolled back.
        assert!(fixture.releases.downstream_release("v2.5.0").is_some());
    }

    #[tokio::test]
    async fn build_failure_leaves_release_without_assets() {
        let fixture = Fixture::new(InMemoryReleases::new().with_upstream(&["v2.5.0"]))
            .with_builder(FakeBuilder::failing());

        let err = fixture
            .reconciler()
            .reconcile(Request::ByVersion("2.5.0".to_string()), Strictness::Lenient)
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::Build { .. }));
        let release = fixture.releases.downstream_release("v2.5.0").unwrap();
        assert!(release.assets.is_empty());
    }

    #[tokio::test]
    async fn missing_assets_are_uploaded_to_an_existing_release() {
        let fixture = Fixture::new(InMemoryReleases::new().with_downstream_release("v2.5.0"));

        let uploaded = fixture
            .reconciler()
            .upload_missing_assets("v2.5.0")
            .await
            .unwrap();
        assert_eq!(uploaded.len(), 2);

        let again = fixture
            .reconciler()
            .upload_missing_assets("v2.5.0")
            .await
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(fixture.builder.builds().len(), 1);
    }

    #[tokio::test]
    async fn asset_recovery_requires_a_release() {
        let fixture = Fixture::new(InMemoryReleases::new());

        let err = fixture
            .reconciler()
            .upload_missing_assets("2.5.0")
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::DownstreamReleaseMissing { .. }));
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Validate < Stage::CheckExisting);
        assert!(Stage::UploadArtifact < Stage::Done);
        assert_eq!(Stage::CommitMarker.to_string(), "commit_marker");
    }
}
