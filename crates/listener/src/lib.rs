//! plotly-mirror trigger event source infrastructure.
//!
//! The issue-triggered workflow hands the mirror the event that started it in
//! one of two shapes:
//!
//! | Source | Shape | Notes |
//! |--------|-------|-------|
//! | [`EventSource::ActionsContext`] | `${{ toJSON(github) }}` serialized into `GITHUB_CONTEXT` | issue under `event.issue` |
//! | [`EventSource::EventFile`] | the webhook payload file at `GITHUB_EVENT_PATH` | issue at the top level |
//!
//! Both decode to a [`pipeline::IssueEvent`]; nothing else from the payload
//! is kept.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Payload shapes and file access live here. The
//! orchestration layer sees only [`pipeline::IssueEvent`].

use std::path::{Path, PathBuf};

use pipeline::{IssueEvent, IssueNumber};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors produced while decoding a trigger event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload decoded, but carries no issue (e.g. a `schedule` event).
    #[error("event payload does not describe an issue")]
    NotAnIssueEvent,

    #[error("could not read event file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the triggering event comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// The serialized Actions `github` context.
    ActionsContext(String),
    /// A file holding the raw webhook payload.
    EventFile(PathBuf),
}

impl EventSource {
    /// Decodes the issue this event is about.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if the payload cannot be read or decoded, or
    /// holds no issue.
    pub async fn load(&self) -> Result<IssueEvent, EventError> {
        match self {
            Self::ActionsContext(json) => issue_from_context(json),
            Self::EventFile(path) => {
                let payload = read_event_file(path).await?;
                issue_from_payload(&payload)
            }
        }
    }
}

#[derive(Deserialize)]
struct ActionsContext {
    event: Option<EventPayload>,
}

#[derive(Deserialize)]
struct EventPayload {
    issue: Option<IssuePayload>,
}

#[derive(Deserialize)]
struct IssuePayload {
    number: u64,
    title: String,
}

impl From<IssuePayload> for IssueEvent {
    fn from(issue: IssuePayload) -> Self {
        IssueEvent {
            number: IssueNumber::new(issue.number),
            title: issue.title,
        }
    }
}

/// Decodes the issue from a serialized Actions `github` context.
///
/// # Errors
///
/// Returns [`EventError::Malformed`] for invalid JSON and
/// [`EventError::NotAnIssueEvent`] when `event.issue` is absent.
pub fn issue_from_context(json: &str) -> Result<IssueEvent, EventError> {
    let context: ActionsContext = serde_json::from_str(json)?;
    let issue = context
        .event
        .and_then(|event| event.issue)
        .ok_or(EventError::NotAnIssueEvent)?;
    debug!(number = issue.number, "decoded issue from actions context");
    Ok(issue.into())
}

/// Decodes the issue from a raw webhook payload.
///
/// # Errors
///
/// Returns [`EventError::Malformed`] for invalid JSON and
/// [`EventError::NotAnIssueEvent`] when `issue` is absent.
pub fn issue_from_payload(json: &str) -> Result<IssueEvent, EventError> {
    let payload: EventPayload = serde_json::from_str(json)?;
    let issue = payload.issue.ok_or(EventError::NotAnIssueEvent)?;
    debug!(number = issue.number, "decoded issue from event payload");
    Ok(issue.into())
}

async fn read_event_file(path: &Path) -> Result<String, EventError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EventError::Io {
            path: path.to_path_buf(),
            source,
        })
}
