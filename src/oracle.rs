//! # Commit Oracle
//!
//! The delivery engine never touches version-control internals. Everything it
//! needs to know about a project's history goes through the narrow
//! [`CommitOracle`] trait: reference resolution, ancestry listing, dirtiness,
//! patch extraction and HEAD movement.
//!
//! - **`GitOracle`** implements the trait on top of the system `git` binary
//!   (see [`crate::git`]), bound to one project checkout.
//! - **`OracleProvider`** opens an oracle per declared project path and
//!   reports a missing checkout as `None` (a removed project).
//!
//! The split keeps the classification and decision logic testable against an
//! in-memory commit graph without any repository on disk.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::git;

/// Full identifier of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in logs and reports.
    pub fn short(&self) -> &str {
        self.0.get(..9).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An untracked path in a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntrackedEntry {
    /// Path relative to the checkout root
    pub path: PathBuf,
    /// Whether the path is a symbolic link
    pub is_symlink: bool,
}

/// Queries the delivery engine needs from the version-control system.
pub trait CommitOracle {
    /// Resolve a symbolic reference; `Ok(None)` when it does not exist.
    fn resolve(&self, reference: &str) -> Result<Option<CommitId>>;

    /// Commit currently checked out.
    fn head(&self) -> Result<CommitId>;

    /// Every commit reachable from `commit`, inclusive, most recent first.
    fn ancestry_of(&self, commit: &CommitId) -> Result<Vec<CommitId>>;

    /// Commits reachable from `to` but not from `from`, most recent first.
    fn commits_between(&self, from: &CommitId, to: &CommitId) -> Result<Vec<CommitId>>;

    /// Parents of `commit`.
    fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>>;

    /// Whether the working tree has changes.
    fn is_dirty(&self, include_untracked: bool) -> Result<bool>;

    /// Untracked, non-ignored paths.
    fn untracked(&self) -> Result<Vec<UntrackedEntry>>;

    /// Fetch tag references from the remotes. `jobs` is a parallelism hint.
    fn fetch_tags(&self, jobs: usize) -> Result<()>;

    /// Patch series for `from..to`, optionally limited to one path.
    fn diff(&self, from: &CommitId, to: &CommitId, path_filter: Option<&str>) -> Result<Vec<u8>>;

    /// Move HEAD onto `commit`.
    fn checkout(&self, commit: &CommitId) -> Result<()>;

    /// Fetch URL of the project's remote, if one is configured.
    fn remote_url(&self) -> Result<Option<String>>;
}

/// Opens a [`CommitOracle`] for each declared project.
pub trait OracleProvider {
    /// `Ok(None)` when the project directory does not exist in the workspace.
    fn open(&self, project_path: &str) -> Result<Option<Box<dyn CommitOracle>>>;
}

/// [`CommitOracle`] backed by the system `git` command.
pub struct GitOracle {
    project_path: String,
    workdir: PathBuf,
}

impl GitOracle {
    pub fn new(project_path: impl Into<String>, workdir: PathBuf) -> Self {
        Self {
            project_path: project_path.into(),
            workdir,
        }
    }

    fn ids(raw: Vec<String>) -> Vec<CommitId> {
        raw.into_iter().map(CommitId::new).collect()
    }
}

impl CommitOracle for GitOracle {
    fn resolve(&self, reference: &str) -> Result<Option<CommitId>> {
        Ok(git::resolve_commit(&self.workdir, reference)?.map(CommitId::new))
    }

    fn head(&self) -> Result<CommitId> {
        git::head(&self.workdir).map(CommitId::new)
    }

    fn ancestry_of(&self, commit: &CommitId) -> Result<Vec<CommitId>> {
        git::rev_list(&self.workdir, commit.as_str()).map(Self::ids)
    }

    fn commits_between(&self, from: &CommitId, to: &CommitId) -> Result<Vec<CommitId>> {
        git::rev_list(&self.workdir, &format!("{}..{}", from, to)).map(Self::ids)
    }

    fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>> {
        git::parents(&self.workdir, commit.as_str()).map(Self::ids)
    }

    fn is_dirty(&self, include_untracked: bool) -> Result<bool> {
        git::has_changes(&self.workdir, include_untracked)
    }

    fn untracked(&self) -> Result<Vec<UntrackedEntry>> {
        Ok(git::untracked_files(&self.workdir)?
            .into_iter()
            .map(|path| {
                let is_symlink = self
                    .workdir
                    .join(&path)
                    .symlink_metadata()
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                UntrackedEntry { path, is_symlink }
            })
            .collect())
    }

    fn fetch_tags(&self, jobs: usize) -> Result<()> {
        git::fetch_tags(&self.workdir, jobs).map_err(|e| Error::TagFetch {
            path: self.project_path.clone(),
            message: e.to_string(),
        })
    }

    fn diff(&self, from: &CommitId, to: &CommitId, path_filter: Option<&str>) -> Result<Vec<u8>> {
        git::format_patch(&self.workdir, from.as_str(), to.as_str(), path_filter)
    }

    fn checkout(&self, commit: &CommitId) -> Result<()> {
        git::checkout(&self.workdir, commit.as_str()).map_err(|e| Error::Checkout {
            path: self.project_path.clone(),
            commit: commit.to_string(),
            message: e.to_string(),
        })
    }

    fn remote_url(&self) -> Result<Option<String>> {
        git::remote_url(&self.workdir)
    }
}

/// Opens [`GitOracle`]s below a workspace root.
pub struct GitOracleProvider {
    workspace: PathBuf,
}

impl GitOracleProvider {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
        }
    }
}

impl OracleProvider for GitOracleProvider {
    fn open(&self, project_path: &str) -> Result<Option<Box<dyn CommitOracle>>> {
        let workdir = self.workspace.join(project_path);
        if !workdir.exists() {
            return Ok(None);
        }
        if !git::is_checkout_root(&workdir) {
            return Err(Error::GitCommand {
                command: "open".to_string(),
                path: project_path.to_string(),
                stderr: "directory exists but is not a git checkout".to_string(),
            });
        }
        Ok(Some(Box::new(GitOracle::new(project_path, workdir))))
    }
}
