//! # Ancestry Classification
//!
//! Decides where a project's patch series must start by comparing the
//! ancestry of the manifest commit with the ancestry of the current commit.
//!
//! | Situation                                   | Outcome                    |
//! |---------------------------------------------|----------------------------|
//! | current is on the manifest line             | checkout at current        |
//! | manifest is in the current ancestry         | unchanged (forward work)   |
//! | histories diverged, common ancestor found   | checkout at that ancestor  |
//! | no common ancestor, oldest fallback enabled | checkout at oldest commit  |
//! | no common ancestor                          | project excluded           |
//!
//! The common ancestor is found by a linear scan of the manifest ancestry,
//! most recent first, so the latest shared commit always wins.

use std::collections::HashSet;

use log::{error, warn};

use crate::error::{Error, Result};
use crate::oracle::{CommitId, CommitOracle};
use crate::project::ProjectState;
use crate::prompt::OperatorPrompt;

/// Classification outcome for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Current commit is on the manifest line; `behind` when it predates the
    /// manifest commit.
    OnManifestLine { behind: bool },
    /// Manifest commit is an ancestor of the current commit.
    Ahead,
    /// Histories diverged after `ancestor`.
    Diverged { ancestor: CommitId },
    /// No shared commit; the oldest manifest-side commit is used instead.
    OldestFallback { oldest: CommitId },
    /// No shared commit and no fallback.
    Disjoint,
    /// Manifest ancestry could not be listed; the operator chose to continue.
    Unreachable,
}

impl Divergence {
    /// New checkout point, when the classification moves it.
    pub fn checkout_point<'a>(&'a self, state: &'a ProjectState) -> Option<&'a CommitId> {
        match self {
            Divergence::OnManifestLine { .. } => state.target(),
            Divergence::Diverged { ancestor } => Some(ancestor),
            Divergence::OldestFallback { oldest } => Some(oldest),
            Divergence::Ahead | Divergence::Disjoint | Divergence::Unreachable => None,
        }
    }

    /// Whether the install script must unshallow the project.
    pub fn is_tracked(&self) -> bool {
        matches!(
            self,
            Divergence::OnManifestLine { .. }
                | Divergence::Diverged { .. }
                | Divergence::OldestFallback { .. }
        )
    }
}

/// Most recent commit of `manifest_line` that is also in `current_line`.
pub fn lowest_common_ancestor<'a>(
    manifest_line: &'a [CommitId],
    current_line: &[CommitId],
) -> Option<&'a CommitId> {
    let current: HashSet<&CommitId> = current_line.iter().collect();
    manifest_line.iter().find(|commit| current.contains(commit))
}

/// Ancestry of the manifest commit, most recent first.
///
/// When the history cannot be listed the operator is asked whether to go on:
/// `Ok(None)` means continue without this project, a refusal is
/// [`Error::AncestryUnreachable`].
pub fn manifest_ancestry(
    path: &str,
    manifest: &CommitId,
    oracle: &dyn CommitOracle,
    prompt: &dyn OperatorPrompt,
) -> Result<Option<Vec<CommitId>>> {
    match oracle.ancestry_of(manifest) {
        Ok(line) => Ok(Some(line)),
        Err(e) => {
            error!(
                "Impossible to find manifest commit {} in {}: {}",
                manifest.short(),
                path,
                e
            );
            let message = format!(
                "History of {} is unreachable from manifest commit {}.",
                path,
                manifest.short()
            );
            if prompt.confirm_continue(&message)? {
                Ok(None)
            } else {
                Err(Error::AncestryUnreachable {
                    path: path.to_string(),
                    commit: manifest.to_string(),
                })
            }
        }
    }
}

/// Runs the divergence algorithm against a project's history.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestryClassifier {
    use_oldest: bool,
}

impl AncestryClassifier {
    pub fn new(use_oldest: bool) -> Self {
        Self { use_oldest }
    }

    /// Classify an extracted project.
    ///
    /// Only errors when the manifest ancestry is unreachable and the operator
    /// refuses to continue, or when the oracle fails.
    pub fn classify(
        &self,
        state: &ProjectState,
        oracle: &dyn CommitOracle,
        prompt: &dyn OperatorPrompt,
    ) -> Result<Divergence> {
        let path = state.path();
        let resolution = state.resolution();
        let (Some(manifest), Some(current)) = (&resolution.manifest, state.target()) else {
            return Ok(Divergence::Unreachable);
        };

        let Some(manifest_line) = manifest_ancestry(path, manifest, oracle, prompt)? else {
            return Ok(Divergence::Unreachable);
        };

        if manifest_line.contains(current) {
            let behind = manifest_line.first() != Some(current);
            if behind {
                warn!(
                    "! Use of an older version {} {} -> {}",
                    path,
                    manifest.short(),
                    current.short()
                );
            }
            return Ok(Divergence::OnManifestLine { behind });
        }

        let current_line = oracle.ancestry_of(current)?;
        if current_line.contains(manifest) {
            return Ok(Divergence::Ahead);
        }

        let divergence = match lowest_common_ancestor(&manifest_line, &current_line) {
            Some(ancestor) => Divergence::Diverged {
                ancestor: ancestor.clone(),
            },
            None => {
                error!("! No common ancestor in the histories of {}", path);
                match manifest_line.last() {
                    Some(oldest) if self.use_oldest => Divergence::OldestFallback {
                        oldest: oldest.clone(),
                    },
                    _ => {
                        error!("Ignoring patches from {}", path);
                        return Ok(Divergence::Disjoint);
                    }
                }
            }
        };
        if let Some(checkout) = divergence.checkout_point(state) {
            warn!(
                "! Delivery diverged from manifest {} ancestor|{} -> manifest|{}/current|{}",
                path,
                checkout.short(),
                manifest.short(),
                current.short()
            );
        }
        Ok(divergence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::{id, MockOracle};
    use crate::project::tests::declaration;
    use crate::project::TagBounds;
    use crate::prompt::FixedAnswer;
    use proptest::prelude::*;

    fn extracted(oracle: &MockOracle, revision: &str) -> ProjectState {
        let mut state = ProjectState::new(declaration("device/acme"), revision);
        state.extract(oracle, &TagBounds::default()).unwrap();
        state
    }

    #[test]
    fn test_lca_prefers_most_recent_manifest_side() {
        let manifest = [id("C3"), id("C2"), id("C1")];
        let current = [id("C2"), id("C1"), id("C0")];
        assert_eq!(lowest_common_ancestor(&manifest, &current), Some(&id("C2")));
    }

    #[test]
    fn test_lca_disjoint() {
        let manifest = [id("M1"), id("M0")];
        let current = [id("D1"), id("D0")];
        assert_eq!(lowest_common_ancestor(&manifest, &current), None);
    }

    #[test]
    fn test_current_equal_to_manifest_is_on_line() {
        let oracle = MockOracle::new().linear(&["C0", "C1"]).head_at("C1");
        let state = extracted(&oracle, "C1");
        let outcome = AncestryClassifier::default()
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap();
        assert_eq!(outcome, Divergence::OnManifestLine { behind: false });
        assert!(outcome.is_tracked());
        assert_eq!(outcome.checkout_point(&state), Some(&id("C1")));
    }

    #[test]
    fn test_older_checkout_warns() {
        testing_logger::setup();
        let oracle = MockOracle::new().linear(&["C0", "C1", "C2"]).head_at("C0");
        let state = extracted(&oracle, "C2");
        let outcome = AncestryClassifier::default()
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap();
        assert_eq!(outcome, Divergence::OnManifestLine { behind: true });
        assert_eq!(outcome.checkout_point(&state), Some(&id("C0")));
        testing_logger::validate(|logs| {
            assert!(logs
                .iter()
                .any(|l| l.level == log::Level::Warn && l.body.contains("older version")));
        });
    }

    #[test]
    fn test_forward_progress_keeps_checkout() {
        let oracle = MockOracle::new().linear(&["C0", "C1", "C2"]).head_at("C2");
        let state = extracted(&oracle, "C0");
        let outcome = AncestryClassifier::default()
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap();
        assert_eq!(outcome, Divergence::Ahead);
        assert!(!outcome.is_tracked());
        assert_eq!(outcome.checkout_point(&state), None);
    }

    #[test]
    fn test_divergence_picks_latest_shared_commit() {
        // C1 - C2 - M3 (manifest)
        //        \
        //         D3 (current)
        let oracle = MockOracle::new()
            .linear(&["C1", "C2", "M3"])
            .commit("D3", &["C2"])
            .head_at("D3");
        let state = extracted(&oracle, "M3");
        let outcome = AncestryClassifier::default()
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap();
        assert_eq!(outcome, Divergence::Diverged { ancestor: id("C2") });
        assert!(outcome.is_tracked());
    }

    #[test]
    fn test_disjoint_without_fallback_is_excluded() {
        let oracle = MockOracle::new()
            .linear(&["M0", "M1"])
            .commit("D0", &[])
            .commit("D1", &["D0"])
            .head_at("D1");
        let state = extracted(&oracle, "M1");
        let outcome = AncestryClassifier::new(false)
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap();
        assert_eq!(outcome, Divergence::Disjoint);
        assert!(!outcome.is_tracked());
    }

    #[test]
    fn test_disjoint_with_fallback_uses_oldest() {
        let oracle = MockOracle::new()
            .linear(&["M0", "M1"])
            .commit("D0", &[])
            .head_at("D0");
        let state = extracted(&oracle, "M1");
        let outcome = AncestryClassifier::new(true)
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap();
        assert_eq!(outcome, Divergence::OldestFallback { oldest: id("M0") });
        assert_eq!(outcome.checkout_point(&state), Some(&id("M0")));
    }

    #[test]
    fn test_unreachable_manifest_history_asks_operator() {
        let oracle = MockOracle::new()
            .linear(&["C0", "C1"])
            .head_at("C1")
            .unreachable("C0");
        let state = extracted(&oracle, "C0");

        let continued = AncestryClassifier::default()
            .classify(&state, &oracle, &FixedAnswer(true))
            .unwrap();
        assert_eq!(continued, Divergence::Unreachable);

        let err = AncestryClassifier::default()
            .classify(&state, &oracle, &FixedAnswer(false))
            .unwrap_err();
        assert!(matches!(err, Error::AncestryUnreachable { .. }));
    }

    proptest! {
        #[test]
        fn prop_lca_is_first_shared_manifest_commit(
            manifest in prop::collection::vec(0u8..20, 0..15),
            current in prop::collection::vec(0u8..20, 0..15),
        ) {
            let manifest: Vec<CommitId> = manifest.iter().map(|n| id(&format!("C{}", n))).collect();
            let current: Vec<CommitId> = current.iter().map(|n| id(&format!("C{}", n))).collect();
            match lowest_common_ancestor(&manifest, &current) {
                Some(found) => {
                    prop_assert!(current.contains(found));
                    let position = manifest.iter().position(|c| c == found).unwrap();
                    prop_assert!(manifest[..position].iter().all(|c| !current.contains(c)));
                }
                None => prop_assert!(manifest.iter().all(|c| !current.contains(c))),
            }
        }
    }
}
