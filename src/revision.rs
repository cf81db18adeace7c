//! Revision selection for manifest projects.
//!
//! Turns the revision declared on a manifest project (or the manifest-wide
//! default) into the name that is looked up in the checkout, and lists the
//! remote-qualified spellings tried for it.

/// Prefixes stripped from declared revisions, first match wins.
pub const REF_PREFIXES: [&str; 3] = ["refs/tags/", "refs/heads/", "refs/"];

/// Ref namespace of the integration branch alias maintained by `repo`.
pub const INTEGRATION_ALIAS: &str = "m/";

/// Outcome of revision selection for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRevision {
    /// Revision to resolve; empty when neither the project nor the manifest
    /// declares one.
    pub revision: String,
    /// Whether the revision carries the owner-restricted marker.
    pub owner_restricted: bool,
}

/// Selects the effective revision of manifest projects.
#[derive(Debug, Clone, Default)]
pub struct RevisionResolver {
    owner_marker: Option<String>,
}

impl RevisionResolver {
    pub fn new(owner_marker: Option<String>) -> Self {
        Self {
            owner_marker: owner_marker.filter(|m| !m.is_empty()),
        }
    }

    /// Pick the declared revision (or the manifest default) and strip its ref
    /// prefix.
    pub fn select(&self, declared: Option<&str>, default: Option<&str>) -> SelectedRevision {
        let raw = declared
            .filter(|r| !r.is_empty())
            .or(default)
            .unwrap_or_default();
        let revision = strip_ref_prefix(raw).to_string();
        let owner_restricted = self
            .owner_marker
            .as_deref()
            .is_some_and(|marker| revision.contains(marker));
        SelectedRevision {
            revision,
            owner_restricted,
        }
    }
}

/// Remove the first matching prefix of [`REF_PREFIXES`].
pub fn strip_ref_prefix(revision: &str) -> &str {
    REF_PREFIXES
        .iter()
        .find_map(|prefix| revision.strip_prefix(prefix))
        .unwrap_or(revision)
}

/// Reference spellings tried, in priority order, to resolve `revision`.
///
/// Remote-qualified names come first: a local branch with the same
/// name never shadows the remote one.
pub fn lookup_candidates(remote: Option<&str>, revision: &str) -> Vec<String> {
    if revision.is_empty() {
        return Vec::new();
    }
    let mut candidates = Vec::with_capacity(6);
    let remote = remote.filter(|r| !r.is_empty());
    if let Some(remote) = remote {
        candidates.push(format!("{}/{}", remote, revision));
    }
    candidates.push(format!("{}{}", INTEGRATION_ALIAS, revision));
    if let Some(remote) = remote {
        candidates.push(format!("{}/{}{}", remote, INTEGRATION_ALIAS, revision));
    }
    candidates.push(format!("refs/tags/{}", revision));
    candidates.push(format!("refs/heads/{}", revision));
    candidates.push(revision.to_string());
    candidates
}
