//! # Project State
//!
//! [`ProjectState`] pairs an immutable [`ProjectDeclaration`] with the commit
//! identities resolved for it. Resolution happens once, in [`ProjectState::extract`];
//! later calls are no-ops, so every consumer sees the same commits.
//!
//! Resolution rules:
//!
//! - `current` is the checkout's HEAD, replaced by the to-tag commit when a
//!   to-tag is configured and found: the delivery represents the tagged state.
//! - `manifest` is the first lookup candidate (see
//!   [`crate::revision::lookup_candidates`]) that resolves, replaced by the
//!   since-tag commit when a since-tag is configured and found.
//! - `checkout` starts at `manifest`; ancestry classification may move it.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::manifest::ProjectDeclaration;
use crate::oracle::{CommitId, CommitOracle};
use crate::revision::lookup_candidates;

/// Tag bounds configured for a run.
#[derive(Debug, Clone, Default)]
pub struct TagBounds {
    pub since: Option<String>,
    pub to: Option<String>,
    /// Parallelism hint passed to tag fetching
    pub jobs: usize,
}

impl TagBounds {
    fn requested(&self) -> bool {
        self.since.is_some() || self.to.is_some()
    }
}

/// What makes a working tree dirty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyPolicy {
    pub ignore_untracked: bool,
    pub ignore_symlinks: bool,
}

/// Commit identities resolved for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub current: Option<CommitId>,
    pub manifest: Option<CommitId>,
    pub since_tag: Option<CommitId>,
    pub to_tag: Option<CommitId>,
    pub checkout: Option<CommitId>,
}

/// Resolution outcome of one declared project.
#[derive(Debug, Clone)]
pub struct ProjectState {
    declaration: ProjectDeclaration,
    revision: String,
    resolution: Resolution,
    remote_url: Option<String>,
    since_requested: bool,
    to_requested: bool,
    extracted: bool,
    patch_override: Option<bool>,
}

impl ProjectState {
    /// `revision` is the effective revision chosen by the revision resolver.
    pub fn new(declaration: ProjectDeclaration, revision: impl Into<String>) -> Self {
        Self {
            declaration,
            revision: revision.into(),
            resolution: Resolution::default(),
            remote_url: None,
            since_requested: false,
            to_requested: false,
            extracted: false,
            patch_override: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.declaration.path
    }

    pub fn declaration(&self) -> &ProjectDeclaration {
        &self.declaration
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn is_extracted(&self) -> bool {
        self.extracted
    }

    /// Remote URL reported by the checkout, else the one from the manifest.
    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url
            .as_deref()
            .or(self.declaration.remote_url.as_deref())
    }

    /// Resolve every commit identity of the project. Idempotent.
    ///
    /// Fails only when the oracle itself fails (git unavailable, tag fetch
    /// error); unresolved references leave the matching field empty.
    pub fn extract(&mut self, oracle: &dyn CommitOracle, bounds: &TagBounds) -> Result<()> {
        if self.extracted {
            return Ok(());
        }
        let path = self.declaration.path.clone();

        let mut current = oracle.head()?;
        self.remote_url = oracle.remote_url()?;

        let mut manifest = None;
        for candidate in lookup_candidates(self.declaration.remote.as_deref(), &self.revision) {
            if let Some(commit) = oracle.resolve(&candidate)? {
                debug!("+ {} manifest revision {} ({})", path, candidate, commit.short());
                manifest = Some(commit);
                break;
            }
        }

        if bounds.requested() {
            debug!("Fetching tags in {}", path);
            oracle.fetch_tags(bounds.jobs)?;
        }

        let mut since_tag = None;
        if let Some(tag) = &bounds.since {
            self.since_requested = true;
            since_tag = oracle.resolve(&format!("refs/tags/{}", tag))?;
            match &since_tag {
                Some(commit) => debug!("+ {} since tag {} ({})", path, tag, commit.short()),
                None => warn!("! Impossible to retrieve since tag {} in {}", tag, path),
            }
        }

        let mut to_tag = None;
        if let Some(tag) = &bounds.to {
            self.to_requested = true;
            to_tag = oracle.resolve(&format!("refs/tags/{}", tag))?;
            match &to_tag {
                Some(commit) => {
                    debug!("+ {} to tag {} ({})", path, tag, commit.short());
                    if *commit != current {
                        warn!(
                            "! Target tag {} is not the current commit of {} ({} -> {})",
                            tag,
                            path,
                            current.short(),
                            commit.short()
                        );
                        current = commit.clone();
                    }
                }
                None => debug!("! Impossible to retrieve to tag {} in {}", tag, path),
            }
        }

        if let Some(commit) = &since_tag {
            manifest = Some(commit.clone());
        }

        self.resolution = Resolution {
            current: Some(current),
            checkout: manifest.clone(),
            manifest,
            since_tag,
            to_tag,
        };
        self.extracted = true;
        Ok(())
    }

    /// Error out when the manifest revision could not be resolved.
    pub fn ensure_in_control(&self) -> Result<()> {
        if self.resolution.manifest.is_none() {
            return Err(Error::OutOfControl {
                path: self.declaration.path.clone(),
                revision: self.revision.clone(),
            });
        }
        Ok(())
    }

    /// A since-tag was configured but not found in this project.
    pub fn since_tag_missing(&self) -> bool {
        self.since_requested && self.resolution.since_tag.is_none()
    }

    /// A to-tag was configured but not found in this project.
    pub fn to_tag_missing(&self) -> bool {
        self.to_requested && self.resolution.to_tag.is_none()
    }

    /// Commit the delivery must reproduce: the to-tag when resolved,
    /// otherwise the current commit.
    pub fn target(&self) -> Option<&CommitId> {
        self.resolution
            .to_tag
            .as_ref()
            .or(self.resolution.current.as_ref())
    }

    pub fn set_checkout(&mut self, commit: CommitId) {
        self.resolution.checkout = Some(commit);
    }

    /// Force the patch decision. A forced `true` never produces a patch
    /// without two distinct resolved commits.
    pub fn set_needs_patch(&mut self, needs_patch: bool) {
        self.patch_override = Some(needs_patch);
    }

    /// Whether a patch from `checkout` to `current` must be produced.
    pub fn needs_patch(&self) -> bool {
        let diverges = matches!(
            (&self.resolution.current, &self.resolution.checkout),
            (Some(current), Some(checkout)) if current != checkout
        );
        match self.patch_override {
            Some(forced) => forced && diverges,
            None => diverges,
        }
    }

    /// Whether the working tree carries changes under `policy`.
    pub fn is_dirty(&self, oracle: &dyn CommitOracle, policy: DirtyPolicy) -> Result<bool> {
        if oracle.is_dirty(false)? {
            return Ok(true);
        }
        if policy.ignore_untracked {
            return Ok(false);
        }
        let untracked = oracle.untracked()?;
        let dirty = untracked
            .iter()
            .any(|entry| !(policy.ignore_symlinks && entry.is_symlink));
        if !dirty && !untracked.is_empty() {
            info!("! Only symlinks are untracked in {}", self.declaration.path);
        }
        Ok(dirty)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::oracle::testing::{id, MockOracle};

    pub(crate) fn declaration(path: &str) -> ProjectDeclaration {
        ProjectDeclaration {
            path: path.to_string(),
            name: path.to_string(),
            manifest: "default".to_string(),
            remote: Some("aosp".to_string()),
            remote_url: Some("https://android.googlesource.com".to_string()),
            revision: None,
            default_revision: Some("main".to_string()),
        }
    }

    fn repo() -> MockOracle {
        MockOracle::new()
            .linear(&["C0", "C1", "C2", "C3"])
            .reference("aosp/main", "C1")
            .reference("refs/tags/REL_1", "C2")
            .reference("refs/tags/REL_0", "C0")
            .head_at("C3")
    }

    #[test]
    fn test_extract_resolves_remote_qualified_revision() {
        let oracle = repo().reference("main", "C0");
        let mut state = ProjectState::new(declaration("system/core"), "main");
        state.extract(&oracle, &TagBounds::default()).unwrap();

        let res = state.resolution();
        assert_eq!(res.current, Some(id("C3")));
        // Remote-qualified spelling wins over the local homonym
        assert_eq!(res.manifest, Some(id("C1")));
        assert_eq!(res.checkout, Some(id("C1")));
        assert!(state.is_extracted());
        assert_eq!(oracle.fetch_calls(), 0);
    }

    #[test]
    fn test_extract_falls_back_to_bare_name() {
        let oracle = MockOracle::new().linear(&["C0"]).head_at("C0");
        let mut state = ProjectState::new(declaration("a"), "C0");
        state.extract(&oracle, &TagBounds::default()).unwrap();
        assert_eq!(state.resolution().manifest, Some(id("C0")));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let oracle = repo();
        let mut state = ProjectState::new(declaration("system/core"), "main");
        state.extract(&oracle, &TagBounds::default()).unwrap();
        let first = state.resolution().clone();
        let calls = oracle.resolve_calls();

        state.extract(&oracle, &TagBounds::default()).unwrap();
        assert_eq!(state.resolution(), &first);
        assert_eq!(oracle.resolve_calls(), calls);
    }

    #[test]
    fn test_unresolved_manifest_is_out_of_control() {
        let oracle = repo();
        let mut state = ProjectState::new(declaration("system/core"), "no-such-branch");
        state.extract(&oracle, &TagBounds::default()).unwrap();
        assert!(state.resolution().manifest.is_none());
        let err = state.ensure_in_control().unwrap_err();
        assert!(matches!(err, Error::OutOfControl { .. }));
    }

    #[test]
    fn test_empty_revision_resolves_nothing() {
        let oracle = repo();
        let mut state = ProjectState::new(declaration("system/core"), "");
        state.extract(&oracle, &TagBounds::default()).unwrap();
        assert!(state.ensure_in_control().is_err());
        assert_eq!(oracle.resolve_calls(), 0);
    }

    #[test]
    fn test_to_tag_overrides_current_and_since_tag_overrides_manifest() {
        let oracle = repo();
        let bounds = TagBounds {
            since: Some("REL_0".to_string()),
            to: Some("REL_1".to_string()),
            jobs: 2,
        };
        let mut state = ProjectState::new(declaration("system/core"), "main");
        state.extract(&oracle, &bounds).unwrap();

        let res = state.resolution();
        assert_eq!(oracle.fetch_calls(), 1);
        assert_eq!(res.current, Some(id("C2")));
        assert_eq!(res.to_tag, Some(id("C2")));
        assert_eq!(res.since_tag, Some(id("C0")));
        assert_eq!(res.manifest, Some(id("C0")));
        assert_eq!(res.checkout, Some(id("C0")));
        assert!(!state.since_tag_missing());
        assert!(!state.to_tag_missing());
    }

    #[test]
    fn test_missing_tags_leave_bounds_unset() {
        let oracle = repo();
        let bounds = TagBounds {
            since: Some("NOPE".to_string()),
            to: Some("NOPE_EITHER".to_string()),
            jobs: 1,
        };
        let mut state = ProjectState::new(declaration("system/core"), "main");
        state.extract(&oracle, &bounds).unwrap();

        let res = state.resolution();
        assert_eq!(res.current, Some(id("C3")));
        assert_eq!(res.manifest, Some(id("C1")));
        assert!(state.since_tag_missing());
        assert!(state.to_tag_missing());
        assert_eq!(state.target(), Some(&id("C3")));
    }

    #[test]
    fn test_tag_fetch_failure_propagates() {
        let oracle = repo().failing_fetch();
        let bounds = TagBounds {
            to: Some("REL_1".to_string()),
            ..Default::default()
        };
        let mut state = ProjectState::new(declaration("system/core"), "main");
        let err = state.extract(&oracle, &bounds).unwrap_err();
        assert!(matches!(err, Error::TagFetch { .. }));
        assert!(!state.is_extracted());
    }

    #[test]
    fn test_needs_patch_requires_distinct_resolved_commits() {
        let oracle = repo();
        let mut state = ProjectState::new(declaration("system/core"), "main");
        assert!(!state.needs_patch());

        state.extract(&oracle, &TagBounds::default()).unwrap();
        assert!(state.needs_patch());

        state.set_checkout(id("C3"));
        assert!(!state.needs_patch());

        // A forced decision cannot manufacture a patch from equal commits
        state.set_needs_patch(true);
        assert!(!state.needs_patch());

        state.set_checkout(id("C1"));
        assert!(state.needs_patch());
        state.set_needs_patch(false);
        assert!(!state.needs_patch());
    }

    #[test]
    fn test_remote_url_prefers_checkout_remote() {
        let oracle = repo().remote("ssh://mirror/platform/system/core");
        let mut state = ProjectState::new(declaration("system/core"), "main");
        assert_eq!(state.remote_url(), Some("https://android.googlesource.com"));
        state.extract(&oracle, &TagBounds::default()).unwrap();
        assert_eq!(state.remote_url(), Some("ssh://mirror/platform/system/core"));
    }

    #[test]
    fn test_dirty_policies() {
        let state = ProjectState::new(declaration("p"), "main");
        let strict = DirtyPolicy::default();
        let symlinks_ok = DirtyPolicy {
            ignore_symlinks: true,
            ..Default::default()
        };
        let untracked_ok = DirtyPolicy {
            ignore_untracked: true,
            ..Default::default()
        };

        let clean = repo();
        assert!(!state.is_dirty(&clean, strict).unwrap());

        let modified = repo().dirty();
        assert!(state.is_dirty(&modified, symlinks_ok).unwrap());
        assert!(state.is_dirty(&modified, untracked_ok).unwrap());

        let symlink_only = repo().untracked_file("out", true);
        assert!(state.is_dirty(&symlink_only, strict).unwrap());
        assert!(!state.is_dirty(&symlink_only, symlinks_ok).unwrap());

        let stray_file = repo().untracked_file("out", true).untracked_file("notes.txt", false);
        assert!(state.is_dirty(&stray_file, symlinks_ok).unwrap());
        assert!(!state.is_dirty(&stray_file, untracked_ok).unwrap());
    }
}
