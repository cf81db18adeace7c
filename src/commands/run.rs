//! Run options shared by `deliver` and `inspect`.
//!
//! Options are layered: defaults, then the YAML file given by `--config`
//! (or `REPO_DELIVERY_CONFIG`), then the flags given on the command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use repo_delivery::config::{DeliveryOptions, PatchMode};
use repo_delivery::oracle::GitOracleProvider;
use repo_delivery::orchestrator::{DeliveryOrchestrator, DeliveryReport};
use repo_delivery::prompt::{DialoguerPrompt, FixedAnswer, OperatorPrompt};

/// Options of a delivery run
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// YAML file presetting the options below
    #[arg(short, long, value_name = "PATH", env = "REPO_DELIVERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root of the workspace (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub workspace: Option<PathBuf>,

    /// Manifest file or folder (defaults to <workspace>/.repo/manifests)
    #[arg(short, long, value_name = "PATH")]
    pub manifests: Option<PathBuf>,

    /// Folder receiving patches, scripts and diagnostics
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Product name, prefix of the generated scripts
    #[arg(short, long, value_name = "NAME")]
    pub product: Option<String>,

    /// Tag applied by the install script on every delivered project
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub delivery_tag: Option<String>,

    /// Measure modifications from this tag instead of the manifest revision
    #[arg(long, value_name = "TAG")]
    pub since_tag: Option<String>,

    /// Deliver the state at this tag instead of the checked out HEAD
    #[arg(long, value_name = "TAG")]
    pub to_tag: Option<String>,

    /// Remote URL keyword marking tracked projects (repeatable)
    #[arg(long = "track", value_name = "KEYWORD")]
    pub track_remotes: Vec<String>,

    /// Only process these project paths (repeatable)
    #[arg(long, value_name = "PATH")]
    pub scope: Vec<String>,

    /// Leave these project paths out (repeatable)
    #[arg(long, value_name = "PATH")]
    pub skip: Vec<String>,

    /// One patch file per commit instead of one per project
    #[arg(long)]
    pub per_commit: bool,

    /// Do not abort on projects with local changes
    #[arg(long)]
    pub ignore_dirty: bool,

    /// Untracked symbolic links do not make a project dirty
    #[arg(long)]
    pub ignore_symlinks: bool,

    /// Untracked files do not make a project dirty
    #[arg(long)]
    pub ignore_untracked: bool,

    /// Start from the oldest manifest commit when histories share nothing
    #[arg(long)]
    pub use_oldest: bool,

    /// Do not check out the starting commit in the install script
    #[arg(long)]
    pub no_rebase: bool,

    /// Unshallow tracked projects in the install script
    #[arg(long)]
    pub unshallow: bool,

    /// Parallel jobs for tag fetching
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Also pack every delivered project into archive/
    #[arg(long = "tar")]
    pub archive_projects: bool,

    /// Revision substring marking owner-restricted projects
    #[arg(long, value_name = "MARKER")]
    pub owner_marker: Option<String>,

    /// Continue without asking when a manifest history is unreachable
    #[arg(short, long)]
    pub yes: bool,
}

impl RunArgs {
    /// Merge the configuration file and the flags into validated options.
    pub fn into_options(self) -> Result<DeliveryOptions> {
        let mut options = match &self.config {
            Some(path) => DeliveryOptions::from_file(path)?,
            None => DeliveryOptions::default(),
        };

        if let Some(workspace) = self.workspace {
            options.workspace = workspace;
        }
        if self.manifests.is_some() {
            options.manifests = self.manifests;
        }
        if let Some(output) = self.output {
            options.output_folder = output;
        }
        if let Some(product) = self.product {
            options.product = product;
        }
        if let Some(tag) = self.delivery_tag {
            options.delivery_tag = tag;
        }
        if self.since_tag.is_some() {
            options.since_tag = self.since_tag;
        }
        if self.to_tag.is_some() {
            options.to_tag = self.to_tag;
        }
        if !self.track_remotes.is_empty() {
            options.track_remotes = self.track_remotes;
        }
        if !self.scope.is_empty() {
            options.scope = self.scope;
        }
        if !self.skip.is_empty() {
            options.skip = self.skip;
        }
        if self.per_commit {
            options.patch_mode = PatchMode::PerCommit;
        }
        if let Some(jobs) = self.jobs {
            options.jobs = jobs;
        }
        if self.owner_marker.is_some() {
            options.owner_marker = self.owner_marker;
        }
        options.ignore_dirty |= self.ignore_dirty;
        options.ignore_symlinks |= self.ignore_symlinks;
        options.ignore_untracked |= self.ignore_untracked;
        options.use_oldest |= self.use_oldest;
        options.no_rebase |= self.no_rebase;
        options.unshallow |= self.unshallow;
        options.archive_projects |= self.archive_projects;
        options.assume_continue |= self.yes;
        Ok(options)
    }
}

/// Run a delivery with the git-backed oracle.
pub fn run_delivery(options: DeliveryOptions) -> Result<DeliveryReport> {
    let options = options.validate()?;
    let provider = GitOracleProvider::new(&options.workspace);
    let prompt: Box<dyn OperatorPrompt> = if options.assume_continue {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(DialoguerPrompt)
    };
    let report = DeliveryOrchestrator::new(&options, &provider, prompt.as_ref()).run()?;
    Ok(report)
}
