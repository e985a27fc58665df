//! plotly-mirror GitHub infrastructure adapter.
//!
//! Implements [`pipeline::ports::ReleaseRepository`] and
//! [`pipeline::ports::IssueTracker`] over the GitHub REST API with
//! [`reqwest`]. One [`GithubClient`] serves both namespaces: reads go to the
//! upstream or downstream repository depending on the
//! [`pipeline::Namespace`], writes always go downstream.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! Authentication, `Link` header pagination, URI-template upload URLs and
//! status-code interpretation are handled here; the [`pipeline`] crate never
//! sees them. A 404 on a lookup is reported as absence, not as an error.

pub mod client;
pub mod error;
mod models;
mod pagination;

pub use client::{GithubClient, PER_PAGE};
pub use error::GithubError;
