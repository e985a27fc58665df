//! Entry points that pick a version and hand it to the [`Reconciler`].
//!
//! - [`check_and_release`] runs unattended on a schedule. It uses the lenient
//!   policy so a re-run on the next tick is always safe.
//! - [`handle_issue`] answers a release request filed as an issue. It uses the
//!   strict policy and reports the result on the issue itself, which makes it
//!   the only place where a failure is turned into a message instead of a
//!   non-zero exit.

use pipeline::ports::IssueTracker;
use pipeline::scanner::{self, ScanStrategy};
use pipeline::trigger::{self, TITLE_FORMAT};
use pipeline::{IssueEvent, MirrorError, Release, Request, Strictness, UnreleasedScan};
use tracing::{info, instrument};

use crate::{Outcome, Reconciler};

/// What the scheduled check did.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Every upstream version is already mirrored.
    UpToDate,
    /// The earliest pending version was reconciled.
    Reconciled {
        scan: UnreleasedScan,
        outcome: Outcome,
    },
}

/// Mirrors the earliest upstream version that has not been released
/// downstream yet, if any.
///
/// # Errors
///
/// Propagates scanner and reconciliation errors.
#[instrument(skip(reconciler))]
pub async fn check_and_release(
    reconciler: &Reconciler<'_>,
    strategy: ScanStrategy,
) -> Result<CheckOutcome, MirrorError> {
    let scan = scanner::first_unreleased(reconciler.releases(), strategy).await?;
    let Some(earliest) = scan.earliest.clone() else {
        info!("there are no unreleased versions");
        return Ok(CheckOutcome::UpToDate);
    };

    info!(
        version = %earliest,
        pending = scan.count,
        "found unreleased version; releasing it"
    );
    let outcome = reconciler
        .reconcile(Request::ByVersion(earliest.to_string()), Strictness::Lenient)
        .await?;
    Ok(CheckOutcome::Reconciled { scan, outcome })
}

/// What the issue handler did.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    /// The title is not a release request; the issue was left alone.
    Ignored,
    /// The release was created; the issue was commented on and closed.
    Released(Release),
    /// The release failed; the error was posted and the issue closed.
    Failed(String),
}

/// Acts on an issue whose title may request a release.
///
/// On a matching title exactly one comment is posted and the issue is closed,
/// whether or not the release succeeded.
///
/// # Errors
///
/// Only errors from posting the comment or closing the issue are returned;
/// release failures are reported on the issue.
#[instrument(skip(reconciler, issues, event), fields(issue = %event.number))]
pub async fn handle_issue(
    reconciler: &Reconciler<'_>,
    issues: &dyn IssueTracker,
    event: &IssueEvent,
) -> Result<IssueOutcome, MirrorError> {
    let Some(requested) = trigger::requested_version(&event.title) else {
        info!(title = %event.title, "issue does not trigger a release; skipping");
        info!("to trigger a release, the issue title must be of the form `{TITLE_FORMAT}` (case-insensitive)");
        return Ok(IssueOutcome::Ignored);
    };
    info!(version = %requested, "requesting version based on issue title");

    let result = reconciler
        .reconcile(Request::ByVersion(requested.clone()), Strictness::Strict)
        .await;

    let (body, outcome) = match result {
        Ok(Outcome::Released(release) | Outcome::AlreadyReleased(release)) => (
            success_comment(&requested, &release),
            IssueOutcome::Released(release),
        ),
        Ok(Outcome::UpstreamMissing(version)) => {
            let error = MirrorError::UpstreamReleaseMissing {
                version,
                repository: reconciler.config().upstream.clone(),
            };
            (failure_comment(&error), IssueOutcome::Failed(error.to_string()))
        }
        Err(error) => (failure_comment(&error), IssueOutcome::Failed(error.to_string())),
    };

    issues.comment(event.number, &body).await?;
    issues.close(event.number).await?;
    info!("issue #{} successfully closed", event.number);

    Ok(outcome)
}

fn success_comment(requested: &str, release: &Release) -> String {
    format!(
        "Release of version {requested} successfully created and available at {}",
        release.html_url
    )
}

fn failure_comment(error: &MirrorError) -> String {
    format!("The release failed with the following error message:\n{error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ports;
    use pipeline::testing::{
        downstream_repository, FakeBuilder, InMemoryMarker, InMemoryReleases, IssueCall,
        RecordingIssues, RecordingVcs,
    };
    use pipeline::{AccessToken, IssueNumber, MirrorConfig, Version};

    struct Harness {
        config: MirrorConfig,
        releases: InMemoryReleases,
        vcs: RecordingVcs,
        marker: InMemoryMarker,
        builder: FakeBuilder,
        issues: RecordingIssues,
    }

    impl Harness {
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
                issues: RecordingIssues::default(),
            }
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

    fn issue(title: &str) -> IssueEvent {
        IssueEvent {
            number: IssueNumber::new(7),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn scheduled_check_releases_earliest_pending_version() {
        let harness = Harness::new(
            InMemoryReleases::new()
                .with_upstream(&["v5.0.0", "v4.0.0", "v3.0.0"])
                .with_downstream_release("v3.0.0"),
        );

        let outcome = check_and_release(&harness.reconciler(), ScanStrategy::Exhaustive)
            .await
            .unwrap();

        let CheckOutcome::Reconciled { scan, outcome } = outcome else {
            panic!("expected a reconciliation");
        };
        assert_eq!(scan.count, 2);
        assert!(matches!(outcome, Outcome::Released(ref r) if r.tag_name == "v4.0.0"));
        assert_eq!(harness.releases.created().len(), 1);
        assert_eq!(harness.releases.created()[0].tag_name, "v4.0.0");
    }

    #[tokio::test]
    async fn scheduled_check_is_a_no_op_when_up_to_date() {
        let harness = Harness::new(
            InMemoryReleases::new()
                .with_upstream(&["v3.0.0"])
                .with_downstream_release("v3.0.0"),
        );

        let outcome = check_and_release(&harness.reconciler(), ScanStrategy::Ordered)
            .await
            .unwrap();

        assert_eq!(outcome, CheckOutcome::UpToDate);
        assert!(harness.vcs.calls().is_empty());
        assert!(harness.releases.created().is_empty());
    }

    #[tokio::test]
    async fn matching_issue_is_released_commented_and_closed() {
        let harness = Harness::new(InMemoryReleases::new().with_upstream(&["v2.10.0"]));

        let outcome = handle_issue(
            &harness.reconciler(),
            &harness.issues,
            &issue("Release Plotly v2.10.0"),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, IssueOutcome::Released(_)));
        let calls = harness.issues.calls();
        assert_eq!(calls.len(), 2);
        let IssueCall::Comment(number, body) = &calls[0] else {
            panic!("expected a comment first, got {calls:?}");
        };
        assert_eq!(*number, IssueNumber::new(7));
        assert!(body.starts_with("Release of version v2.10.0 successfully created"));
        assert!(body.ends_with("/releases/tag/v2.10.0"));
        assert_eq!(calls[1], IssueCall::Close(IssueNumber::new(7)));
        assert_eq!(harness.builder.builds(), vec![Version::new(2, 10, 0)]);
    }

    #[tokio::test]
    async fn failed_release_is_reported_on_the_issue() {
        let harness = Harness::new(InMemoryReleases::new().with_upstream(&["v2.9.0"]));

        let outcome = handle_issue(
            &harness.reconciler(),
            &harness.issues,
            &issue("release plotly 2.10.0"),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, IssueOutcome::Failed(_)));
        let calls = harness.issues.calls();
        assert_eq!(calls.len(), 2);
        let IssueCall::Comment(_, body) = &calls[0] else {
            panic!("expected a comment first, got {calls:?}");
        };
        assert!(body.starts_with("The release failed with the following error message:\n"));
        assert!(body.contains("v2.10.0"));
        assert_eq!(calls[1], IssueCall::Close(IssueNumber::new(7)));
        assert!(harness.releases.created().is_empty());
    }

    #[tokio::test]
    async fn already_released_version_is_a_failure_on_issues() {
        let harness = Harness::new(
            InMemoryReleases::new()
                .with_upstream(&["v2.10.0"])
                .with_downstream_release("v2.10.0"),
        );

        let outcome = handle_issue(
            &harness.reconciler(),
            &harness.issues,
            &issue("release plotly v2.10.0"),
        )
        .await
        .unwrap();

        let IssueOutcome::Failed(message) = outcome else {
            panic!("expected a failure");
        };
        assert!(message.contains("already exists"));
        assert_eq!(harness.issues.calls().len(), 2);
    }

    #[tokio::test]
    async fn unrelated_issue_has_no_side_effects() {
        let harness = Harness::new(InMemoryReleases::new().with_upstream(&["v2.10.0"]));

        let outcome = handle_issue(&harness.reconciler(), &harness.issues, &issue("fix bug"))
            .await
            .unwrap();

        assert_eq!(outcome, IssueOutcome::Ignored);
        assert!(harness.issues.calls().is_empty());
        assert!(harness.vcs.calls().is_empty());
        assert!(harness.releases.created().is_empty());
    }

    #[tokio::test]
    async fn title_with_non_ascii_digits_has_no_side_effects() {
        let harness = Harness::new(InMemoryReleases::new().with_upstream(&["v2.10.0"]));

        let outcome = handle_issue(
            &harness.reconciler(),
            &harness.issues,
            &issue("release plotly v\u{662}.\u{661}\u{660}.\u{660}"),
        )
        .await
        .unwrap();

        assert_eq!(outcome, IssueOutcome::Ignored);
        assert!(harness.issues.calls().is_empty());
        assert!(harness.releases.created().is_empty());
    }
}
