//! [`ArtifactBuilder`] that bundles with `bun` and packages with `tar`.
//!
//! A build runs three commands in the working directory:
//!
//! 1. `bun install <package>@X.Y.Z` (skipped when `install` is off),
//! 2. `bun build <entrypoint> --outdir <output_dir> --minify --entry-naming [dir]/<bundle_name>`,
//! 3. `tar -czf <archive_name> -C <output_dir> <bundle_name> VERSION`,
//!
//! with a `VERSION` file holding `vX.Y.Z` written into the output directory
//! between steps 2 and 3, so the archive records what it contains.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::ports::ArtifactBuilder;
use pipeline::{ArtifactOptions, BuiltArtifact, MirrorError, Version};
use tracing::{info, instrument};

use crate::process::{self, args};

/// Name of the version file packed next to the bundle.
pub const ARCHIVE_VERSION_FILE: &str = "VERSION";

/// Runs the bundler toolchain inside one working directory.
#[derive(Debug, Clone)]
pub struct BunBuilder {
    work_dir: PathBuf,
    bun: String,
    tar: String,
}

impl BunBuilder {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            bun: "bun".to_string(),
            tar: "tar".to_string(),
        }
    }

    /// Overrides the `bun` executable.
    pub fn with_bun(mut self, program: impl Into<String>) -> Self {
        self.bun = program.into();
        self
    }

    /// Overrides the `tar` executable.
    pub fn with_tar(mut self, program: impl Into<String>) -> Self {
        self.tar = program.into();
        self
    }

    async fn step(&self, program: &str, args: Vec<OsString>) -> Result<(), MirrorError> {
        process::run(program, &args, &self.work_dir)
            .await
            .map(drop)
            .map_err(|e| build_error(e.to_string()))
    }
}

fn build_error(message: impl Into<String>) -> MirrorError {
    MirrorError::Build {
        message: message.into(),
    }
}

pub(crate) fn install_args(version: &Version, options: &ArtifactOptions) -> Vec<OsString> {
    args([
        "install".to_string(),
        format!("{}@{}", options.package, version.bare()),
    ])
}

pub(crate) fn bundle_args(options: &ArtifactOptions) -> Vec<OsString> {
    let mut list = args(["build"]);
    list.push(options.entrypoint.as_os_str().to_owned());
    list.push("--outdir".into());
    list.push(options.output_dir.as_os_str().to_owned());
    list.push("--minify".into());
    list.push("--entry-naming".into());
    list.push(format!("[dir]/{}", options.bundle_name).into());
    list
}

pub(crate) fn archive_args(options: &ArtifactOptions) -> Vec<OsString> {
    let mut list = args(["-czf", options.archive_name.as_str(), "-C"]);
    list.push(options.output_dir.as_os_str().to_owned());
    list.push(options.bundle_name.as_str().into());
    list.push(ARCHIVE_VERSION_FILE.into());
    list
}

#[async_trait]
impl ArtifactBuilder for BunBuilder {
    #[instrument(skip(self, options), fields(version = %version))]
    async fn build(
        &self,
        version: &Version,
        options: &ArtifactOptions,
    ) -> Result<BuiltArtifact, MirrorError> {
        if options.install {
            info!(package = %options.package, "installing package");
            self.step(&self.bun, install_args(version, options)).await?;
        }

        let output_dir = self.work_dir.join(&options.output_dir);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| build_error(format!("cannot create {}: {e}", output_dir.display())))?;

        self.step(&self.bun, bundle_args(options)).await?;
        let bundle_path = self.work_dir.join(options.bundle_path());
        if !tokio::fs::try_exists(&bundle_path).await.unwrap_or(false) {
            return Err(build_error(format!(
                "bundler finished but {} was not produced",
                bundle_path.display()
            )));
        }
        info!(path = %bundle_path.display(), "bundle written");

        let version_file = output_dir.join(ARCHIVE_VERSION_FILE);
        tokio::fs::write(&version_file, version.to_string())
            .await
            .map_err(|e| build_error(format!("cannot write {}: {e}", version_file.display())))?;

        self.step(&self.tar, archive_args(options)).await?;
        let archive_path = self.work_dir.join(&options.archive_name);
        info!(path = %archive_path.display(), "archive written");

        Ok(BuiltArtifact {
            version: version.clone(),
            archive_path,
            bundle_path,
        })
    }

    async fn read_output(&self, path: &Path) -> Result<Vec<u8>, MirrorError> {
        tokio::fs::read(self.work_dir.join(path))
            .await
            .map_err(|e| build_error(format!("cannot read {}: {e}", path.display())))
    }
}
