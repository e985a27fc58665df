//! [`VersionControl`] over the system `git` binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::ports::VersionControl;
use pipeline::{CommitIdentity, MirrorError};
use tracing::{info, instrument};

use crate::process::{self, args, ProcessError};

/// Runs `git` inside one working copy.
#[derive(Debug, Clone)]
pub struct SystemGit {
    work_tree: PathBuf,
}

impl SystemGit {
    pub fn new(work_tree: impl Into<PathBuf>) -> Self {
        Self {
            work_tree: work_tree.into(),
        }
    }

    async fn git(&self, args: Vec<OsString>) -> Result<String, MirrorError> {
        process::run("git", &args, &self.work_tree)
            .await
            .map_err(vcs_error)
    }
}

fn vcs_error(error: ProcessError) -> MirrorError {
    MirrorError::Vcs {
        message: error.to_string(),
    }
}

pub(crate) fn identity_args(identity: &CommitIdentity) -> [Vec<OsString>; 2] {
    [
        args(["config", "user.name", identity.name.as_str()]),
        args(["config", "user.email", identity.email.as_str()]),
    ]
}

pub(crate) fn stage_args(path: &Path) -> Vec<OsString> {
    let mut list = args(["add", "--"]);
    list.push(path.as_os_str().to_owned());
    list
}

pub(crate) fn commit_args(message: &str) -> Vec<OsString> {
    args(["commit", "-m", message])
}

#[async_trait]
impl VersionControl for SystemGit {
    #[instrument(skip(self))]
    async fn configure_identity(&self, identity: &CommitIdentity) -> Result<(), MirrorError> {
        for command in identity_args(identity) {
            self.git(command).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stage(&self, path: &Path) -> Result<(), MirrorError> {
        self.git(stage_args(path)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn commit(&self, message: &str) -> Result<(), MirrorError> {
        self.git(commit_args(message)).await?;
        info!("committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn push(&self) -> Result<(), MirrorError> {
        self.git(args(["push"])).await?;
        info!("pushed");
        Ok(())
    }
}
