//! # Delivery Set
//!
//! [`DeliverySet`] accumulates everything a run decides across projects:
//! patch records, tracked remotes, removed projects, archived stray
//! repositories, owner-restricted projects and unhandled-project diagnostics.
//!
//! It only exposes append and query operations. Patch records are unique per
//! project path: a second record for the same path is rejected, logged and
//! reported as unhandled.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::Serialize;

use crate::error::Result;
use crate::manifest::ProjectDeclaration;
use crate::oracle::CommitId;

/// File listing tracked-remote project paths.
pub const TRACKED_PROJECTS_FILE: &str = "tracked_projects.json";
/// File listing stray repositories.
pub const LEFT_REPOS_FILE: &str = "left_repos.json";
/// File listing projects left out of the delivery.
pub const UNHANDLED_PROJECTS_FILE: &str = "unhandled_projects.json";

/// Replace path separators so a project path can name a single file.
pub fn flatten_path(path: &str) -> String {
    path.replace('/', "_")
}

/// What the install script does for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRecord {
    pub path: String,
    /// Basename of the manifest declaring the project
    pub manifest: String,
    /// Remote name from the manifest
    pub remote: Option<String>,
    /// Commit the install script checks out before applying patches
    pub checkout: CommitId,
    /// Patch files, relative to the output folder, in application order
    pub patches: Vec<String>,
    pub needs_patch: bool,
}

impl PatchRecord {
    /// Record for a project delivered as-is at `checkout`.
    pub fn unchanged(declaration: &ProjectDeclaration, checkout: CommitId) -> Self {
        Self {
            path: declaration.path.clone(),
            manifest: declaration.manifest.clone(),
            remote: declaration.remote.clone(),
            checkout,
            patches: Vec::new(),
            needs_patch: false,
        }
    }
}

/// A stray repository packed into the delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedRepo {
    pub path: String,
    /// Archive file name, relative to the output folder
    pub archive: String,
}

/// A project left out of the delivery, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unhandled {
    pub path: String,
    pub reason: String,
}

#[derive(Serialize)]
struct Diagnostics<'a> {
    unhandled: &'a [Unhandled],
    owner_restricted: &'a BTreeSet<String>,
}

/// Accumulated outcome of a delivery run.
#[derive(Debug, Default)]
pub struct DeliverySet {
    records: Vec<PatchRecord>,
    tracked: BTreeSet<String>,
    removed: BTreeSet<String>,
    archives: Vec<ArchivedRepo>,
    owner_restricted: BTreeSet<String>,
    unhandled: Vec<Unhandled>,
}

impl DeliverySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project whose remote needs unshallowing. Idempotent.
    pub fn add_track_remote(&mut self, path: &str) {
        if !path.is_empty() && self.tracked.insert(path.to_string()) {
            debug!("Tracking remote of {}", path);
        }
    }

    /// Add a patch record; `false` when the project already has one.
    pub fn add_patch(&mut self, record: PatchRecord) -> bool {
        if let Some(stored) = self.records.iter().find(|r| r.path == record.path) {
            error!(
                "Duplicate patch record for {} (checkout {} vs stored {})",
                record.path,
                record.checkout.short(),
                stored.checkout.short()
            );
            self.add_unhandled(&record.path, "duplicate patch record");
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn add_removed(&mut self, path: &str) {
        self.removed.insert(path.to_string());
    }

    pub fn add_archive(&mut self, archive: ArchivedRepo) {
        if !self.archives.iter().any(|a| a.path == archive.path) {
            self.archives.push(archive);
        }
    }

    pub fn add_owner_restricted(&mut self, path: &str) {
        self.owner_restricted.insert(path.to_string());
    }

    pub fn add_unhandled(&mut self, path: &str, reason: impl Into<String>) {
        self.unhandled.push(Unhandled {
            path: path.to_string(),
            reason: reason.into(),
        });
    }

    pub fn records(&self) -> &[PatchRecord] {
        &self.records
    }

    pub fn record(&self, path: &str) -> Option<&PatchRecord> {
        self.records.iter().find(|r| r.path == path)
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.tracked.contains(path)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(String::as_str)
    }

    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    pub fn archives(&self) -> &[ArchivedRepo] {
        &self.archives
    }

    pub fn owner_restricted(&self) -> impl Iterator<Item = &str> {
        self.owner_restricted.iter().map(String::as_str)
    }

    pub fn unhandled(&self) -> &[Unhandled] {
        &self.unhandled
    }

    /// Whether there is anything for the scripts to do.
    pub fn has_script_content(&self) -> bool {
        !self.records.is_empty() || !self.archives.is_empty() || !self.removed.is_empty()
    }

    /// Write `tracked_projects.json` into `dir`.
    pub fn write_tracked(&self, dir: &Path) -> Result<PathBuf> {
        let list: Vec<&str> = self.tracked().collect();
        write_json(&dir.join(TRACKED_PROJECTS_FILE), &list)
    }

    /// Write `unhandled_projects.json` into `dir`.
    pub fn write_unhandled(&self, dir: &Path) -> Result<PathBuf> {
        let diagnostics = Diagnostics {
            unhandled: &self.unhandled,
            owner_restricted: &self.owner_restricted,
        };
        write_json(&dir.join(UNHANDLED_PROJECTS_FILE), &diagnostics)
    }
}

/// Write `left_repos.json` into `dir`.
pub fn write_strays(dir: &Path, strays: &[String]) -> Result<PathBuf> {
    write_json(&dir.join(LEFT_REPOS_FILE), &strays)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content + "\n")?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::id;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn record(path: &str, checkout: &str) -> PatchRecord {
        PatchRecord {
            path: path.to_string(),
            manifest: "default".to_string(),
            remote: Some("aosp".to_string()),
            checkout: id(checkout),
            patches: vec![format!("{}.patch", flatten_path(path))],
            needs_patch: true,
        }
    }

    #[test]
    fn test_flatten_path() {
        assert_eq!(flatten_path("frameworks/base"), "frameworks_base");
        assert_eq!(flatten_path("bionic"), "bionic");
    }

    #[test]
    fn test_duplicate_record_is_rejected() {
        testing_logger::setup();
        let mut set = DeliverySet::new();
        assert!(set.add_patch(record("frameworks/base", "C1")));
        assert!(!set.add_patch(record("frameworks/base", "C2")));

        assert_eq!(set.records().len(), 1);
        assert_eq!(set.records()[0].checkout, id("C1"));
        assert_eq!(set.unhandled()[0].path, "frameworks/base");
        testing_logger::validate(|logs| {
            assert!(logs
                .iter()
                .any(|l| l.level == log::Level::Error && l.body.contains("Duplicate")));
        });
    }

    #[test]
    fn test_track_remote_is_idempotent() {
        let mut set = DeliverySet::new();
        set.add_track_remote("kernel/common");
        set.add_track_remote("kernel/common");
        set.add_track_remote("");
        assert_eq!(set.tracked().collect::<Vec<_>>(), vec!["kernel/common"]);
        assert!(set.is_tracked("kernel/common"));
    }

    #[test]
    fn test_script_content() {
        let mut set = DeliverySet::new();
        assert!(!set.has_script_content());
        set.add_removed("old/project");
        assert!(set.has_script_content());
    }

    #[test]
    fn test_write_diagnostics() {
        let dir = TempDir::new().unwrap();
        let mut set = DeliverySet::new();
        set.add_track_remote("b/two");
        set.add_track_remote("a/one");
        set.add_unhandled("c/three", "no common ancestor");
        set.add_owner_restricted("vendor/oem");

        let tracked = set.write_tracked(dir.path()).unwrap();
        let list: Vec<String> =
            serde_json::from_str(&fs::read_to_string(tracked).unwrap()).unwrap();
        assert_eq!(list, vec!["a/one", "b/two"]);

        let unhandled = set.write_unhandled(dir.path()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(unhandled).unwrap()).unwrap();
        assert_eq!(value["unhandled"][0]["path"], "c/three");
        assert_eq!(value["unhandled"][0]["reason"], "no common ancestor");
        assert_eq!(value["owner_restricted"][0], "vendor/oem");

        let strays = write_strays(dir.path(), &["out/tool".to_string()]).unwrap();
        assert!(fs::read_to_string(strays).unwrap().contains("out/tool"));
    }

    proptest! {
        #[test]
        fn prop_one_record_per_path(paths in prop::collection::vec("[a-c]/[x-z]", 1..30)) {
            let mut set = DeliverySet::new();
            for path in &paths {
                set.add_patch(record(path, "C1"));
            }
            let unique: BTreeSet<&String> = paths.iter().collect();
            prop_assert_eq!(set.records().len(), unique.len());
            prop_assert_eq!(set.unhandled().len(), paths.len() - unique.len());
        }
    }
}
