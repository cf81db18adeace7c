//! # Delivery Options
//!
//! This module defines [`DeliveryOptions`], the complete set of switches that
//! drive a delivery run. Options come from two layers:
//!
//! 1. An optional YAML file (`--config`), deserialized with `serde_yaml`.
//!    Every field has a default, so the file only needs the keys it changes.
//! 2. Command-line flags, applied on top by the CLI.
//!
//! [`DeliveryOptions::validate`] then normalises the paths and checks that the
//! workspace and manifests exist before any project is touched.
//!
//! ```yaml
//! workspace: ~/aosp
//! output_folder: ./delivery
//! product: falcon
//! delivery_tag: FALCON_V2.1
//! to_tag: falcon-2.1
//! track_remotes: [vendor-acme]
//! patch_mode: per-commit
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How modifications are serialized into patch files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchMode {
    /// One patch file per project spanning the whole range
    #[default]
    Single,
    /// One patch file per commit, under a folder mirroring the project path
    PerCommit,
}

/// All options of a delivery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryOptions {
    /// Root of the multi-repository workspace
    pub workspace: PathBuf,
    /// Manifest file, or directory searched for `*.xml` manifests.
    /// Defaults to `<workspace>/.repo/manifests`.
    pub manifests: Option<PathBuf>,
    /// Folder receiving patches, scripts and diagnostics
    pub output_folder: PathBuf,
    /// Product name, used as prefix of the generated scripts
    pub product: String,
    /// Tag applied by the install script on every delivered project
    pub delivery_tag: String,
    /// Measure modifications from this tag instead of the manifest revision
    pub since_tag: Option<String>,
    /// Deliver the state at this tag instead of the checked out HEAD
    pub to_tag: Option<String>,
    /// Remote URL keywords marking projects as tracked remotes
    pub track_remotes: Vec<String>,
    /// When non-empty, only these project paths are processed
    pub scope: Vec<String>,
    /// Project paths left out of the delivery
    pub skip: Vec<String>,
    pub patch_mode: PatchMode,
    /// Inspect only: report, never abort on dirtiness, write only diagnostics
    pub dry_run: bool,
    pub ignore_dirty: bool,
    /// Untracked symbolic links do not make a project dirty
    pub ignore_symlinks: bool,
    /// Untracked files do not make a project dirty
    pub ignore_untracked: bool,
    /// Fall back to the oldest manifest-side commit when histories are disjoint
    pub use_oldest: bool,
    /// Do not emit checkout instructions in the install script
    pub no_rebase: bool,
    /// Emit unshallow instructions for tracked remotes in the install script
    pub unshallow: bool,
    /// Parallelism hint for network-bound git operations
    pub jobs: usize,
    /// Also pack every delivered project into `archive/*.tar.gz`
    pub archive_projects: bool,
    /// Revision substring identifying owner-restricted projects
    pub owner_marker: Option<String>,
    /// Continue without asking when a manifest commit history is unreachable
    pub assume_continue: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            manifests: None,
            output_folder: PathBuf::from("./delivery"),
            product: "product".to_string(),
            delivery_tag: "XX_XY_V1.0".to_string(),
            since_tag: None,
            to_tag: None,
            track_remotes: Vec::new(),
            scope: Vec::new(),
            skip: Vec::new(),
            patch_mode: PatchMode::Single,
            dry_run: false,
            ignore_dirty: false,
            ignore_symlinks: false,
            ignore_untracked: false,
            use_oldest: false,
            no_rebase: false,
            unshallow: false,
            jobs: 4,
            archive_projects: false,
            owner_marker: Some("oem_code".to_string()),
            assume_continue: false,
        }
    }
}

impl DeliveryOptions {
    /// Parse options from a YAML document.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load options from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Unable to read {}: {}", path.display(), e),
            hint: None,
        })?;
        Self::parse(&content)
    }

    /// Manifest location, defaulting below the workspace.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifests
            .clone()
            .unwrap_or_else(|| self.workspace.join(".repo").join("manifests"))
    }

    /// Normalise paths, check that the inputs exist and create the output
    /// folder.
    pub fn validate(mut self) -> Result<Self> {
        self.workspace = expand_home(&self.workspace);
        self.output_folder = expand_home(&self.output_folder);
        self.manifests = self.manifests.as_deref().map(expand_home);

        if !self.workspace.is_dir() {
            return Err(Error::Config {
                message: format!("Workspace {} is not a directory", self.workspace.display()),
                hint: Some("Point --workspace at the top of the source tree".to_string()),
            });
        }
        self.workspace = self.workspace.canonicalize()?;

        let manifests = self.manifest_path();
        if !manifests.exists() {
            return Err(Error::Config {
                message: format!("Manifest path {} does not exist", manifests.display()),
                hint: Some("Use --manifests to select a manifest file or folder".to_string()),
            });
        }
        if self.product.trim().is_empty() {
            return Err(Error::Config {
                message: "Product name must not be empty".to_string(),
                hint: None,
            });
        }
        if self.delivery_tag.trim().is_empty() || self.delivery_tag.contains(char::is_whitespace)
        {
            return Err(Error::Config {
                message: format!("Invalid delivery tag '{}'", self.delivery_tag),
                hint: Some("Tags cannot be empty or contain whitespace".to_string()),
            });
        }
        self.jobs = self.jobs.max(1);

        fs::create_dir_all(&self.output_folder)?;
        Ok(self)
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
