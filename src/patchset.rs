//! # Patch Set Builder
//!
//! Materializes the patch files of a project that needs one.
//!
//! - **Single mode** writes `<output>/<path_with_underscores>.patch` spanning
//!   checkout to current.
//! - **Per-commit mode** writes one `NN_<path_with_underscores>.patch` per
//!   commit under `<output>/<path>/`, oldest first.
//!
//! Whatever happens, HEAD is left on the current commit afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::config::PatchMode;
use crate::delivery::{flatten_path, PatchRecord};
use crate::error::{Error, Result};
use crate::oracle::{CommitId, CommitOracle};
use crate::project::ProjectState;

/// Builds patch files under an output folder.
#[derive(Debug, Clone)]
pub struct PatchSetBuilder {
    output: PathBuf,
    mode: PatchMode,
}

impl PatchSetBuilder {
    pub fn new(output: impl Into<PathBuf>, mode: PatchMode) -> Self {
        Self {
            output: output.into(),
            mode,
        }
    }

    /// Write the patches of `state` and return its record.
    ///
    /// `Ok(None)` when the range produced no patch content.
    pub fn build(
        &self,
        state: &ProjectState,
        oracle: &dyn CommitOracle,
    ) -> Result<Option<PatchRecord>> {
        let path = state.path();
        let resolution = state.resolution();
        let (Some(checkout), Some(current)) = (&resolution.checkout, &resolution.current) else {
            return Ok(None);
        };
        if !state.needs_patch() {
            return Ok(None);
        }

        info!("Production of patches for {}", path);
        let produced = match self.mode {
            PatchMode::Single => self.single(state, oracle, checkout, current),
            PatchMode::PerCommit => self.per_commit(state, oracle, checkout, current),
        };
        let restored = restore_head(oracle, current);

        let patches = match (produced, restored) {
            (Ok(patches), Ok(())) => patches,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(restore)) => {
                error!("Unable to restore {} on {}: {}", path, current.short(), restore);
                return Err(e);
            }
        };

        if patches.is_empty() {
            warn!(
                "! Empty patch for {} ({}..{}), nothing delivered",
                path,
                checkout.short(),
                current.short()
            );
            return Ok(None);
        }
        info!("Production of patches for {} : DONE", path);
        Ok(Some(PatchRecord {
            path: path.to_string(),
            manifest: state.declaration().manifest.clone(),
            remote: state.declaration().remote.clone(),
            checkout: checkout.clone(),
            patches,
            needs_patch: true,
        }))
    }

    fn single(
        &self,
        state: &ProjectState,
        oracle: &dyn CommitOracle,
        checkout: &CommitId,
        current: &CommitId,
    ) -> Result<Vec<String>> {
        let content = extract(state, oracle, checkout, current)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let name = format!("{}.patch", flatten_path(state.path()));
        write_patch(&self.output, &name, &content)?;
        Ok(vec![name])
    }

    fn per_commit(
        &self,
        state: &ProjectState,
        oracle: &dyn CommitOracle,
        checkout: &CommitId,
        current: &CommitId,
    ) -> Result<Vec<String>> {
        let path = state.path();
        let mut chain = oracle.commits_between(checkout, current)?;
        chain.push(checkout.clone());
        chain.reverse();

        let folder = self.output.join(path);
        let mut patches = Vec::new();
        for (index, pair) in chain.windows(2).enumerate() {
            let (from, to) = (&pair[0], &pair[1]);
            if oracle.parents(to)?.len() > 1 {
                warn!(
                    "! Merge commit {} in {}: its patch may not apply cleanly",
                    to.short(),
                    path
                );
            }
            let content = extract(state, oracle, from, to)?;
            if content.is_empty() {
                continue;
            }
            let name = format!("{:02}_{}.patch", index, flatten_path(path));
            write_patch(&folder, &name, &content)?;
            patches.push(format!("{}/{}", path, name));
        }
        Ok(patches)
    }
}

fn extract(
    state: &ProjectState,
    oracle: &dyn CommitOracle,
    from: &CommitId,
    to: &CommitId,
) -> Result<Vec<u8>> {
    oracle.diff(from, to, None).map_err(|e| {
        error!("Error while producing patch in {}: {}", state.path(), e);
        Error::PatchExtraction {
            path: state.path().to_string(),
            message: e.to_string(),
        }
    })
}

fn write_patch(folder: &Path, name: &str, content: &[u8]) -> Result<()> {
    fs::create_dir_all(folder)?;
    fs::write(folder.join(name), content)?;
    Ok(())
}

fn restore_head(oracle: &dyn CommitOracle, current: &CommitId) -> Result<()> {
    if oracle.head()? != *current {
        oracle.checkout(current)?;
    }
    Ok(())
}
