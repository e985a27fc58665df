//! plotly-mirror orchestration layer.
//!
//! This crate sequences calls between the business logic in [`pipeline`] and
//! the port traits implemented by the infrastructure crates:
//!
//! - [`reconcile`]: the release reconciliation procedure
//!   (`Validate → CheckExisting → CommitMarker → CreateRelease →
//!   BuildArtifact → UploadArtifact → Done`) and asset recovery.
//! - [`entry`]: the scheduled check and the issue-triggered handler.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nodes contain no domain rules of their own beyond
//! the ordering of steps and the strict/lenient policy. Every external effect
//! goes through a [`pipeline::ports`] trait object.

pub mod entry;
pub mod reconcile;

pub use entry::{check_and_release, handle_issue, CheckOutcome, IssueOutcome};
pub use reconcile::{MarkerOutcome, Outcome, Ports, Reconciler, Stage};
