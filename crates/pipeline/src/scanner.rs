//! Finds upstream versions that have not been mirrored yet.
//!
//! The scanner compares every upstream release tag against the latest
//! downstream tag and reports the smallest one above it together with how
//! many there are. Mirroring the smallest first keeps the downstream history
//! in version order when several upstream releases are pending.
//!
//! Both sides are ordered as [`TagVersion`]s, so a mirrored `v3.0.0-rc.1`
//! still leaves `v3.0.0` pending. Upstream pre-releases themselves are never
//! reported: they normalize to the `vX.Y.Z` of their final release.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::ports::{ReleasePager, ReleaseRepository};
use crate::{normalize, MirrorError, Namespace, ReleaseQuery, TagVersion, UnreleasedScan, Version};

/// How much of the upstream listing the scanner trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Assume the listing is sorted newest-first and stop at the first
    /// release that is not newer than the downstream latest. Fetches the
    /// fewest pages; an unsorted listing yields a wrong answer.
    Ordered,
    /// Read the whole listing and take the explicit minimum above the
    /// downstream latest.
    #[default]
    Exhaustive,
}

/// Returns the tag of the latest downstream release, or `v0.0.0` when
/// nothing has been mirrored yet. A tag that is not a semantic version is
/// coerced with [`normalize`].
///
/// # Errors
///
/// Propagates repository errors, and returns [`MirrorError::InvalidVersion`]
/// if the latest downstream tag holds no version at all.
pub async fn latest_downstream_version(
    repository: &dyn ReleaseRepository,
) -> Result<TagVersion, MirrorError> {
    match repository
        .get_release(Namespace::Downstream, &ReleaseQuery::Latest)
        .await?
    {
        Some(release) => match release.tag_version() {
            Some(tag) => Ok(tag),
            None => normalize(&release.tag_name).map(TagVersion::from),
        },
        None => {
            info!("no downstream release exists yet; comparing against v0.0.0");
            Ok(TagVersion::from(Version::zero()))
        }
    }
}

/// Scans upstream against the latest downstream version.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn first_unreleased(
    repository: &dyn ReleaseRepository,
    strategy: ScanStrategy,
) -> Result<UnreleasedScan, MirrorError> {
    let current = latest_downstream_version(repository).await?;
    scan_upstream(repository, &current, strategy).await
}

/// Scans upstream releases for versions strictly greater than `current`.
///
/// Tags that are not semantic versions are skipped.
///
/// # Errors
///
/// Propagates repository errors.
#[instrument(skip(repository, current), fields(current = %current))]
pub async fn scan_upstream(
    repository: &dyn ReleaseRepository,
    current: &TagVersion,
    strategy: ScanStrategy,
) -> Result<UnreleasedScan, MirrorError> {
    let mut pager = ReleasePager::new(repository, Namespace::Upstream);
    let mut scan = UnreleasedScan::default();

    while let Some(release) = pager.next().await? {
        let Some(tag) = release.tag_version() else {
            warn!(tag = %release.tag_name, "skipping upstream release with a non-semver tag");
            continue;
        };

        if tag > *current {
            if tag.is_prerelease() {
                debug!(%tag, "skipping upstream pre-release");
                continue;
            }
            let version = tag.release();
            scan.count += 1;
            let smaller = scan.earliest.as_ref().map_or(true, |earliest| version < *earliest);
            if strategy == ScanStrategy::Ordered || smaller {
                scan.earliest = Some(version);
            }
        } else if strategy == ScanStrategy::Ordered {
            debug!(stop_at = %tag, "reached an already mirrored version");
            break;
        }
    }

    debug!(
        pages = pager.pages_fetched(),
        count = scan.count,
        "upstream scan finished"
    );
    Ok(scan)
}
