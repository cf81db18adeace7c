//! Discovery of repositories present in the workspace.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Folder holding the `repo` tool metadata, never a project.
const REPO_METADATA: &str = ".repo";

/// Relative paths of every checkout below `workspace`.
///
/// A checkout is a directory containing `.git`. Nested checkouts are found
/// too; `.repo` and the inside of `.git` folders are not visited.
pub fn find_checkouts(workspace: &Path) -> Result<BTreeSet<String>> {
    let mut found = BTreeSet::new();
    let walker = WalkDir::new(workspace)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != REPO_METADATA && e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() || !entry.path().join(".git").exists() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(workspace) {
            found.insert(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    debug!("{} checkouts found in {}", found.len(), workspace.display());
    Ok(found)
}

/// Checkouts not claimed by any declared project path.
pub fn stray_repositories<'a>(
    checkouts: BTreeSet<String>,
    declared: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut remaining = checkouts;
    for path in declared {
        remaining.remove(path);
    }
    if !remaining.is_empty() {
        warn!(
            "{} repositories are not declared by the manifests: {:?}",
            remaining.len(),
            remaining
        );
    }
    remaining.into_iter().collect()
}
