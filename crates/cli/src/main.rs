//! plotly-mirror entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags and environment variables become one
//!    [`MirrorConfig`], built once and passed by reference.
//! 2. **Wire observability**: see [`telemetry`]. Every invocation runs inside
//!    a root span carrying a fresh [`RunId`].
//! 3. **Construct infrastructure**: [`GithubClient`], [`SystemGit`],
//!    [`FileMarker`] and [`BunBuilder`] are created here and handed to the
//!    [`Reconciler`] as trait objects.
//! 4. **Select the command**: the scheduled check, the issue handler, or one
//!    of the ad-hoc maintenance commands.
//!
//! Any error ends the process with a non-zero status, except release failures
//! in `issue`, which are reported on the issue instead.

mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use github::GithubClient;
use listener::EventSource;
use nodes::{CheckOutcome, IssueOutcome, MarkerOutcome, Outcome, Ports, Reconciler};
use pipeline::config::{DEFAULT_API_BASE_URL, DEFAULT_MARKER_PATH};
use pipeline::ports::ArtifactBuilder;
use pipeline::scanner::{self, ScanStrategy};
use pipeline::{
    ArtifactOptions, MirrorConfig, Namespace, Request, RepositoryId, RunId, Strictness, Version,
};
use toolchain::{BunBuilder, FileMarker, SystemGit};
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[command(name = "plotly-mirror", about, version, subcommand_help_heading = "Commands")]
struct Cli {
    #[command(flatten)]
    repo: RepoArgs,

    #[command(flatten)]
    artifact: ArtifactArgs,

    /// Emit logs as JSON lines instead of compact text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct RepoArgs {
    /// Owner of the downstream repository.
    #[arg(long, env = "OWNER", global = true)]
    owner: Option<String>,

    /// Name of the downstream repository.
    #[arg(long, env = "REPO", global = true)]
    repo: Option<String>,

    /// Access token; falls back to GITHUB_TOKEN.
    #[arg(long, env = "TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// REST API base URL.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE_URL, global = true)]
    api_url: String,

    /// Repository whose releases are mirrored, as `owner/name`.
    #[arg(long, default_value = "plotly/plotly.js", global = true)]
    upstream: String,

    /// Working copy the marker file, git and the bundler operate in.
    #[arg(long, default_value = ".", global = true)]
    work_dir: PathBuf,

    /// Marker file path, relative to the working copy.
    #[arg(long, default_value = DEFAULT_MARKER_PATH, global = true)]
    marker: PathBuf,
}

#[derive(Debug, Args)]
struct ArtifactArgs {
    /// Entry file handed to the bundler.
    #[arg(long, global = true)]
    entrypoint: Option<PathBuf>,

    /// Directory the bundle is written to.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// File name of the bundle.
    #[arg(long, global = true)]
    bundle_name: Option<String>,

    /// File name of the compressed archive.
    #[arg(long, global = true)]
    archive_name: Option<String>,

    /// Package installed before bundling.
    #[arg(long, global = true)]
    package: Option<String>,

    /// Upload only the archive, not the bundle next to it.
    #[arg(long, global = true)]
    archive_only: bool,
}

impl ArtifactArgs {
    fn options(&self) -> ArtifactOptions {
        let mut options = ArtifactOptions::default();
        if let Some(entrypoint) = &self.entrypoint {
            options.entrypoint.clone_from(entrypoint);
        }
        if let Some(dir) = &self.output_dir {
            options.output_dir.clone_from(dir);
        }
        if let Some(name) = &self.bundle_name {
            options.bundle_name.clone_from(name);
        }
        if let Some(name) = &self.archive_name {
            options.archive_name.clone_from(name);
        }
        if let Some(package) = &self.package {
            options.package.clone_from(package);
        }
        options.upload_bundle = !self.archive_only;
        options
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum StrategyArg {
    /// Stop at the first upstream release that is already mirrored.
    Ordered,
    /// Read the whole upstream listing.
    #[default]
    Exhaustive,
}

impl From<StrategyArg> for ScanStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Ordered => ScanStrategy::Ordered,
            StrategyArg::Exhaustive => ScanStrategy::Exhaustive,
        }
    }
}

#[derive(Debug, Args)]
struct VersionArg {
    /// Version to act on, `X.Y.Z` or `vX.Y.Z`.
    #[arg(value_name = "VERSION", env = "INPUT_VERSION")]
    raw: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the artifact archive locally.
    Build(BuildArgs),

    #[command(flatten)]
    Mirror(MirrorCommand),
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    version: VersionArg,

    /// Skip installing the package first.
    #[arg(long)]
    no_install: bool,
}

/// Commands that talk to the release hosts and need a [`MirrorConfig`].
#[derive(Debug, Subcommand)]
enum MirrorCommand {
    /// Mirror the earliest upstream release not yet released downstream.
    Check {
        #[arg(long, value_enum, default_value_t)]
        strategy: StrategyArg,
    },

    /// Handle a release request filed as an issue.
    Issue {
        /// Serialized Actions `github` context.
        #[arg(long, env = "GITHUB_CONTEXT", hide_env_values = true)]
        context: Option<String>,

        /// Webhook payload file, used when no context is given.
        #[arg(long, env = "GITHUB_EVENT_PATH")]
        event_path: Option<PathBuf>,
    },

    /// Mirror one version.
    Release {
        #[command(flatten)]
        version: VersionArg,

        /// Fail instead of skipping when the version is missing upstream or
        /// already released.
        #[arg(long)]
        strict: bool,
    },

    /// Write, commit and push the marker file for a version.
    CommitVersion {
        #[command(flatten)]
        version: VersionArg,
    },

    /// Print the earliest upstream version not yet released downstream.
    NextUnreleased {
        #[arg(long, value_enum, default_value_t)]
        strategy: StrategyArg,
    },

    /// Upload the assets missing from an existing downstream release.
    UploadAssets {
        #[command(flatten)]
        version: VersionArg,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::Mirror(command) => command.name(),
        }
    }
}

impl MirrorCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Check { .. } => "check",
            Self::Issue { .. } => "issue",
            Self::Release { .. } => "release",
            Self::CommitVersion { .. } => "commit-version",
            Self::NextUnreleased { .. } => "next-unreleased",
            Self::UploadAssets { .. } => "upload-assets",
        }
    }
}

impl RepoArgs {
    fn mirror_config(&self, artifact: &ArtifactArgs) -> Result<MirrorConfig> {
        let owner = self.owner.as_deref().context("OWNER is not set (use --owner)")?;
        let repo = self.repo.as_deref().context("REPO is not set (use --repo)")?;
        let token = self
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .context("TOKEN is not set (use --token or GITHUB_TOKEN)")?;
        let Some(upstream) = RepositoryId::parse(&self.upstream) else {
            bail!("'{}' is not an owner/name repository", self.upstream);
        };

        Ok(MirrorConfig::from_parts(owner, repo, &token)?
            .with_upstream(upstream)
            .with_api_base_url(self.api_url.as_str())
            .with_marker_path(self.marker.as_path())
            .with_artifact(artifact.options()))
    }
}

/// Concrete adapters for one run.
struct Infrastructure {
    github: GithubClient,
    git: SystemGit,
    marker: FileMarker,
    builder: BunBuilder,
}

impl Infrastructure {
    fn new(config: &MirrorConfig, work_dir: &std::path::Path) -> Result<Self> {
        Ok(Self {
            github: GithubClient::new(config).context("failed to create the GitHub client")?,
            git: SystemGit::new(work_dir),
            marker: FileMarker::new(work_dir.join(&config.marker_path)),
            builder: BunBuilder::new(work_dir),
        })
    }

    fn reconciler<'a>(&'a self, config: &'a MirrorConfig) -> Reconciler<'a> {
        Reconciler::new(
            config,
            Ports {
                releases: &self.github,
                vcs: &self.git,
                marker: &self.marker,
                builder: &self.builder,
            },
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let telemetry = match telemetry::init(cli.log_json) {
        Ok(telemetry) => telemetry,
        Err(error) => {
            // No subscriber is installed, so stderr is the only channel.
            eprintln!("{error:?}");
            return ExitCode::FAILURE;
        }
    };

    let run_id = RunId::new_random();
    let span = info_span!("run", %run_id, command = cli.command.name());
    let result = run(cli).instrument(span).await;
    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:?}");
            ExitCode::FAILURE
        }
    };
    telemetry.shutdown();
    code
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => build(&cli.repo, &cli.artifact, args).await,
        Command::Mirror(command) => mirror(&cli.repo, &cli.artifact, command).await,
    }
}

async fn build(repo: &RepoArgs, artifact: &ArtifactArgs, args: BuildArgs) -> Result<()> {
    let version = Version::parse_strict(&args.version.raw)?;
    let mut options = artifact.options();
    options.install = !args.no_install;
    let built = BunBuilder::new(&repo.work_dir)
        .build(&version, &options)
        .await?;
    info!(archive = %built.archive_path.display(), bundle = %built.bundle_path.display(), "artifact built");
    Ok(())
}

async fn mirror(repo: &RepoArgs, artifact: &ArtifactArgs, command: MirrorCommand) -> Result<()> {
    let config = repo.mirror_config(artifact)?;
    let infra = Infrastructure::new(&config, &repo.work_dir)?;
    let reconciler = infra.reconciler(&config);
    info!(downstream = %config.downstream, upstream = %config.upstream, "configured");

    match command {
        MirrorCommand::Check { strategy } => {
            match nodes::check_and_release(&reconciler, strategy.into()).await? {
                CheckOutcome::UpToDate => {}
                CheckOutcome::Reconciled { scan, outcome } => {
                    info!(pending = scan.count, "scheduled check finished");
                    log_outcome(&outcome);
                }
            }
        }
        MirrorCommand::Issue {
            context,
            event_path,
        } => {
            let source = match (context, event_path) {
                (Some(json), _) => EventSource::ActionsContext(json),
                (None, Some(path)) => EventSource::EventFile(path),
                (None, None) => bail!("neither GITHUB_CONTEXT nor GITHUB_EVENT_PATH is set"),
            };
            let event = source.load().await.context("failed to read the triggering issue")?;
            match nodes::handle_issue(&reconciler, &infra.github, &event).await? {
                IssueOutcome::Ignored => {}
                IssueOutcome::Released(release) => {
                    info!(url = %release.html_url, "release request fulfilled");
                }
                IssueOutcome::Failed(message) => {
                    info!(%message, "release request failed; reported on the issue");
                }
            }
        }
        MirrorCommand::Release { version, strict } => {
            let strictness = if strict {
                Strictness::Strict
            } else {
                Strictness::Lenient
            };
            let outcome = reconciler
                .reconcile(Request::ByVersion(version.raw), strictness)
                .await?;
            log_outcome(&outcome);
        }
        MirrorCommand::CommitVersion { version } => {
            let version = Version::parse_strict(&version.raw)?;
            let has_tag = reconciler
                .releases()
                .has_tag(Namespace::Downstream, &version)
                .await?;
            match reconciler.commit_marker(&version, has_tag).await? {
                MarkerOutcome::Committed => info!(%version, "marker committed"),
                MarkerOutcome::AlreadyCurrent | MarkerOutcome::TagExists => {
                    info!(%version, "marker left unchanged");
                }
            }
        }
        MirrorCommand::NextUnreleased { strategy } => {
            let scan = scanner::first_unreleased(reconciler.releases(), strategy.into()).await?;
            match scan.earliest {
                Some(version) => {
                    info!(pending = scan.count, "found unreleased versions");
                    println!("{version}");
                }
                None => info!("there are no unreleased versions"),
            }
        }
        MirrorCommand::UploadAssets { version } => {
            let uploaded = reconciler.upload_missing_assets(&version.raw).await?;
            info!(count = uploaded.len(), "uploaded missing assets");
        }
    }
    Ok(())
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Released(release) => info!(url = %release.html_url, "released"),
        Outcome::AlreadyReleased(release) => {
            info!(url = %release.html_url, "already released");
        }
        Outcome::UpstreamMissing(version) => info!(%version, "not released upstream; skipped"),
    }
}
