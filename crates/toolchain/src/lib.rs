//! plotly-mirror local process adapters.
//!
//! | Adapter | Port | Backed by |
//! |---------|------|-----------|
//! | [`SystemGit`] | [`pipeline::ports::VersionControl`] | the `git` CLI |
//! | [`BunBuilder`] | [`pipeline::ports::ArtifactBuilder`] | `bun` and `tar` |
//! | [`FileMarker`] | [`pipeline::ports::MarkerStore`] | a file in the working copy |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Every external program is started through
//! [`process::run`], which captures output and turns a non-zero exit into a
//! [`ProcessError`] carrying the command line and its stderr. Adapters map
//! those into the matching [`pipeline::MirrorError`] variant.

pub mod bundler;
pub mod git;
pub mod marker;
pub mod process;

pub use bundler::BunBuilder;
pub use git::SystemGit;
pub use marker::FileMarker;
pub use process::ProcessError;
