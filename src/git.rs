//! Thin wrappers around the system `git` command.
//!
//! Every function runs `git` inside a project checkout and converts a failed
//! spawn or a non-zero exit into [`Error::GitCommand`]. Using the system
//! binary keeps the user's git configuration (credentials, alternates,
//! `safe.directory`, ...) in effect for every query.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::debug;

use crate::error::{Error, Result};

fn run(repo_dir: &Path, args: &[&str]) -> Result<Output> {
    debug!("git {} (in {})", args.join(" "), repo_dir.display());
    Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            path: repo_dir.display().to_string(),
            stderr: e.to_string(),
        })
}

fn checked(repo_dir: &Path, args: &[&str]) -> Result<Output> {
    let output = run(repo_dir, args)?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            path: repo_dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve a symbolic reference to a full commit id.
///
/// Returns `Ok(None)` when git does not know the reference; an error only
/// when git itself could not be run.
pub fn resolve_commit(repo_dir: &Path, reference: &str) -> Result<Option<String>> {
    let spec = format!("{}^{{commit}}", reference);
    let output = run(repo_dir, &["rev-parse", "--verify", "--quiet", &spec])?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(stdout_lines(&output).into_iter().next())
}

/// Commit id of the checkout's HEAD.
pub fn head(repo_dir: &Path) -> Result<String> {
    let output = checked(repo_dir, &["rev-parse", "HEAD"])?;
    stdout_lines(&output)
        .into_iter()
        .next()
        .ok_or_else(|| Error::GitCommand {
            command: "rev-parse HEAD".to_string(),
            path: repo_dir.display().to_string(),
            stderr: "empty output".to_string(),
        })
}

/// List commits selected by a `rev-list` specification, most recent first.
pub fn rev_list(repo_dir: &Path, spec: &str) -> Result<Vec<String>> {
    let output = checked(repo_dir, &["rev-list", spec])?;
    Ok(stdout_lines(&output))
}

/// Parents of a commit (two or more for a merge commit).
pub fn parents(repo_dir: &Path, commit: &str) -> Result<Vec<String>> {
    let output = checked(repo_dir, &["rev-list", "--parents", "-n", "1", commit])?;
    let line = String::from_utf8_lossy(&output.stdout);
    Ok(line
        .split_whitespace()
        .skip(1)
        .map(str::to_string)
        .collect())
}

/// Whether `git status` reports any change.
pub fn has_changes(repo_dir: &Path, include_untracked: bool) -> Result<bool> {
    let untracked = if include_untracked {
        "--untracked-files=normal"
    } else {
        "--untracked-files=no"
    };
    let output = checked(repo_dir, &["status", "--porcelain", untracked])?;
    Ok(!stdout_lines(&output).is_empty())
}

/// Untracked, non-ignored paths relative to the checkout root.
pub fn untracked_files(repo_dir: &Path) -> Result<Vec<PathBuf>> {
    let output = checked(repo_dir, &["ls-files", "--others", "--exclude-standard"])?;
    Ok(stdout_lines(&output)
        .into_iter()
        .map(PathBuf::from)
        .collect())
}

/// Fetch every tag from the project's remotes.
pub fn fetch_tags(repo_dir: &Path, jobs: usize) -> Result<()> {
    let jobs = jobs.max(1).to_string();
    checked(repo_dir, &["fetch", "-j", &jobs, "--tags"])?;
    Ok(())
}

/// Produce a mailbox-format patch series for `from..to`.
///
/// The output keeps full blob ids and binary hunks so the series can be
/// replayed with `git am -3`.
pub fn format_patch(
    repo_dir: &Path,
    from: &str,
    to: &str,
    path_filter: Option<&str>,
) -> Result<Vec<u8>> {
    let range = format!("{}..{}", from, to);
    let mut args = vec![
        "format-patch",
        "-k",
        "-s",
        "--full-index",
        "--binary",
        "--stdout",
        range.as_str(),
    ];
    if let Some(path) = path_filter {
        args.push("--");
        args.push(path);
    }
    let output = checked(repo_dir, &args)?;
    Ok(output.stdout)
}

/// Detach HEAD onto `commit`.
pub fn checkout(repo_dir: &Path, commit: &str) -> Result<()> {
    checked(repo_dir, &["checkout", "--quiet", commit])?;
    Ok(())
}

/// Fetch URL of the first configured remote, if any.
pub fn remote_url(repo_dir: &Path) -> Result<Option<String>> {
    let output = checked(repo_dir, &["remote"])?;
    let Some(remote) = stdout_lines(&output).into_iter().next() else {
        return Ok(None);
    };
    let output = checked(repo_dir, &["remote", "get-url", &remote])?;
    Ok(stdout_lines(&output).into_iter().next())
}

/// Whether `dir` is the root of a git checkout (`.git` directory or file).
pub fn is_checkout_root(dir: &Path) -> bool {
    dir.join(".git").exists()
}
