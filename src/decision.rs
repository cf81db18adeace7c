//! # Patch Decision
//!
//! [`PatchDecisionEngine`] composes the tag bounds, the tracked-remote
//! keywords and the ancestry classification into one decision per project.
//! Steps run in order and the first conclusive one wins:
//!
//! 1. A dirty working tree aborts the run (see [`PatchDecisionEngine::check_clean`]).
//! 2. A to-tag equal to the manifest commit means nothing changed.
//! 3. Tracked remotes compare the to-tag with the manifest line.
//! 4. Otherwise the [`AncestryClassifier`] fixes the checkout point.
//! 5. A patch is needed when current and checkout differ.

use log::{debug, error, warn};

use crate::ancestry::{manifest_ancestry, AncestryClassifier, Divergence};
use crate::config::DeliveryOptions;
use crate::delivery::{DeliverySet, PatchRecord};
use crate::error::{Error, Result};
use crate::oracle::CommitOracle;
use crate::project::{DirtyPolicy, ProjectState};
use crate::prompt::OperatorPrompt;

const DISJOINT: &str = "no common ancestor with the manifest revision";
const UNREACHABLE: &str = "manifest revision history is unreachable";

/// Final per-project decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Delivered as-is; a no-patch record was added
    Unchanged,
    /// A patch series from checkout to current must be built
    Patch,
    /// Nothing to deliver
    NoPatch,
    /// Left out of the delivery; recorded as unhandled
    Excluded { reason: String },
}

/// Decides, per project, whether and from where a patch is produced.
#[derive(Debug, Clone)]
pub struct PatchDecisionEngine {
    track_remotes: Vec<String>,
    ignore_dirty: bool,
    dry_run: bool,
    dirty_policy: DirtyPolicy,
    classifier: AncestryClassifier,
}

impl PatchDecisionEngine {
    pub fn new(options: &DeliveryOptions) -> Self {
        Self {
            track_remotes: options.track_remotes.clone(),
            ignore_dirty: options.ignore_dirty,
            dry_run: options.dry_run,
            dirty_policy: DirtyPolicy {
                ignore_untracked: options.ignore_untracked,
                ignore_symlinks: options.ignore_symlinks,
            },
            classifier: AncestryClassifier::new(options.use_oldest),
        }
    }

    /// Dirty-tree check.
    ///
    /// Returns whether the project is dirty; fails when it is and neither
    /// `ignore_dirty` nor dry-run is set.
    pub fn check_clean(&self, state: &ProjectState, oracle: &dyn CommitOracle) -> Result<bool> {
        let dirty = state.is_dirty(oracle, self.dirty_policy)?;
        if dirty {
            if self.dry_run || self.ignore_dirty {
                warn!("! {} is not clean", state.path());
            } else {
                error!("! {} is not clean => exit", state.path());
                return Err(Error::DirtyProject {
                    path: state.path().to_string(),
                });
            }
        }
        Ok(dirty)
    }

    fn matches_track_keyword(&self, state: &ProjectState) -> bool {
        state
            .remote_url()
            .is_some_and(|url| self.track_remotes.iter().any(|kw| url.contains(kw.as_str())))
    }

    fn exclude(&self, state: &mut ProjectState, delivery: &mut DeliverySet, reason: &str) -> Decision {
        state.set_needs_patch(false);
        delivery.add_unhandled(state.path(), reason);
        Decision::Excluded {
            reason: reason.to_string(),
        }
    }

    /// Run decision steps 2 to 5 on an extracted, clean project.
    pub fn decide(
        &self,
        state: &mut ProjectState,
        oracle: &dyn CommitOracle,
        prompt: &dyn OperatorPrompt,
        delivery: &mut DeliverySet,
    ) -> Result<Decision> {
        let path = state.path().to_string();
        let manifest = state.resolution().manifest.clone();
        let to_tag = state.resolution().to_tag.clone();

        if let (Some(tag), Some(manifest)) = (&to_tag, &manifest) {
            if tag == manifest {
                debug!("! No modification of interest in {}", path);
                state.set_checkout(manifest.clone());
                delivery.add_patch(PatchRecord::unchanged(state.declaration(), manifest.clone()));
                return Ok(Decision::Unchanged);
            }
        }

        if self.matches_track_keyword(state) {
            delivery.add_track_remote(&path);
            if let (Some(tag), Some(manifest)) = (&to_tag, &manifest) {
                let Some(manifest_line) = manifest_ancestry(&path, manifest, oracle, prompt)?
                else {
                    return Ok(self.exclude(state, delivery, UNREACHABLE));
                };
                if manifest_line.contains(tag) {
                    // The tag predates the manifest revision
                    state.set_checkout(tag.clone());
                    delivery.add_patch(PatchRecord::unchanged(state.declaration(), tag.clone()));
                    return Ok(Decision::Unchanged);
                }
                warn!("! Modifications in tracked repository {}", path);
                state.set_checkout(manifest.clone());
            }
        }

        if !state.needs_patch() {
            debug!("No need to patch {}", path);
            return Ok(Decision::NoPatch);
        }

        let divergence = self.classifier.classify(state, oracle, prompt)?;
        if divergence.is_tracked() {
            delivery.add_track_remote(&path);
        }
        if let Some(checkout) = divergence.checkout_point(state).cloned() {
            state.set_checkout(checkout);
        }
        match divergence {
            Divergence::Disjoint => return Ok(self.exclude(state, delivery, DISJOINT)),
            Divergence::Unreachable => return Ok(self.exclude(state, delivery, UNREACHABLE)),
            _ => {}
        }

        if state.needs_patch() {
            Ok(Decision::Patch)
        } else {
            debug!("No need to patch {} : DONE", path);
            Ok(Decision::NoPatch)
        }
    }
}
