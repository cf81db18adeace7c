//! Tar packaging of project trees through the system `tar`.

use std::fs;
use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::delivery::flatten_path;
use crate::error::{Error, Result};

/// Archive file name of a project path.
pub fn archive_name(project_path: &str) -> String {
    format!("{}.tar.gz", flatten_path(project_path))
}

/// Pack `<workspace>/<project_path>` into `<folder>/<archive_name>`.
///
/// Entries keep their workspace-relative path so the archive unpacks with
/// `tar -xzf archive -C <workspace>`. `.git` folders are left out. An existing
/// archive is kept as-is. Returns the archive file name.
pub fn pack(workspace: &Path, project_path: &str, folder: &Path) -> Result<String> {
    let name = archive_name(project_path);
    let target = folder.join(&name);
    if target.exists() {
        debug!("Archive {} already exists", target.display());
        return Ok(name);
    }
    fs::create_dir_all(folder)?;
    info!("Packing {} into {}", project_path, target.display());

    let output = Command::new("tar")
        .arg("-czf")
        .arg(&target)
        .arg("--exclude=.git")
        .arg("-C")
        .arg(workspace)
        .arg(project_path)
        .output()
        .map_err(|e| Error::Archive {
            path: project_path.to_string(),
            message: format!("unable to run tar: {}", e),
        })?;

    if !output.status.success() {
        let _ = fs::remove_file(&target);
        return Err(Error::Archive {
            path: project_path.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(name)
}
