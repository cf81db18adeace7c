//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! #[cfg_attr(not(feature = "integration-tests"), ignore)]
//! fn test_example() {
//!     let workspace = WorkspaceFixture::new().with_project("bionic");
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    #[allow(unused_imports)]
    pub use super::{git, git_output};
    pub use super::WorkspaceFixture;
}

/// Manifest documents used across tests.
#[allow(dead_code)]
pub mod manifests {
    /// A manifest declaring no project at all.
    pub const EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remote name="aosp" fetch="https://android.googlesource.com" />
  <default remote="aosp" revision="main" />
</manifest>
"#;

    /// Not a manifest.
    pub const BROKEN: &str = "<manifest><project path=";
}

/// A temporary workspace holding git checkouts and a manifest, plus a
/// separate output folder.
pub struct WorkspaceFixture {
    workspace: assert_fs::TempDir,
    output: assert_fs::TempDir,
    projects: Vec<(String, String)>,
}

impl WorkspaceFixture {
    pub fn new() -> Self {
        Self {
            workspace: assert_fs::TempDir::new().expect("Failed to create workspace"),
            output: assert_fs::TempDir::new().expect("Failed to create output folder"),
            projects: Vec::new(),
        }
    }

    /// Create a checkout at `path` with a `base` tag on its first commit,
    /// declared in the manifest at revision `base`.
    pub fn with_project(mut self, path: &str) -> Self {
        let dir = self.workspace.child(path);
        dir.create_dir_all().expect("Failed to create project dir");
        git(dir.path(), &["init", "-q"]);
        self.commit_file(path, "README", "initial\n", "Initial import");
        git(dir.path(), &["tag", "base"]);
        self.projects.push((path.to_string(), "base".to_string()));
        self
    }

    /// Create a checkout at `path` that the manifest does not declare.
    #[allow(dead_code)]
    pub fn with_stray(self, path: &str) -> Self {
        let dir = self.workspace.child(path);
        dir.create_dir_all().expect("Failed to create stray dir");
        git(dir.path(), &["init", "-q"]);
        self.commit_file(path, "tool.sh", "echo tool\n", "Add tool");
        self
    }

    /// Commit `content` into `file` of project `path`.
    pub fn commit_file(&self, path: &str, file: &str, content: &str, message: &str) {
        let dir = self.workspace.child(path);
        dir.child(file)
            .write_str(content)
            .expect("Failed to write project file");
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-q", "-m", message]);
    }

    /// Add a local modification to `file` of project `path` without committing.
    #[allow(dead_code)]
    pub fn touch(&self, path: &str, file: &str) {
        self.workspace
            .child(path)
            .child(file)
            .write_str("scratch\n")
            .expect("Failed to write scratch file");
    }

    /// Write `default.xml` declaring every project created so far.
    pub fn write_manifest(&self) -> PathBuf {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<manifest>\n  \
             <remote name=\"aosp\" fetch=\"https://android.googlesource.com\" />\n  \
             <default remote=\"aosp\" revision=\"main\" />\n",
        );
        for (path, revision) in &self.projects {
            xml.push_str(&format!(
                "  <project path=\"{}\" name=\"platform/{}\" revision=\"{}\" />\n",
                path, path, revision
            ));
        }
        xml.push_str("</manifest>\n");
        let manifest = self.workspace.child("default.xml");
        manifest.write_str(&xml).expect("Failed to write manifest");
        manifest.path().to_path_buf()
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn output(&self) -> &Path {
        self.output.path()
    }

    /// Arguments pointing a run at this workspace.
    pub fn run_args(&self) -> Vec<String> {
        let manifest = self.write_manifest();
        vec![
            "--workspace".to_string(),
            self.workspace().display().to_string(),
            "--manifests".to_string(),
            manifest.display().to_string(),
            "--output".to_string(),
            self.output().display().to_string(),
            "--product".to_string(),
            "falcon".to_string(),
            "--tag".to_string(),
            "FALCON_V1".to_string(),
            "--yes".to_string(),
        ]
    }
}

impl Default for WorkspaceFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {:?} failed in {}", args, dir.display());
}

/// Run git in `dir` and return its trimmed stdout.
#[allow(dead_code)]
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(output.status.success(), "git {:?} failed in {}", args, dir.display());
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
