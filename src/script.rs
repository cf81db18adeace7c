//! # Script Emitter
//!
//! Renders a [`DeliverySet`] into two POSIX shell scripts written next to the
//! patches:
//!
//! - `<product>_patch.sh WORKSPACE [--remove_unused]` replays the delivery on
//!   a clean checkout of the same manifest.
//! - `<product>_cleanup.sh WORKSPACE` removes the unpacked stray repositories.
//!
//! Every step that can fail aborts the install script with exit code 1, except
//! the removal of unused projects which only reports the failure.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DeliveryOptions;
use crate::delivery::{DeliverySet, PatchRecord};
use crate::error::Result;

/// Flag enabling removal of projects dropped from the manifest.
pub const REMOVE_UNUSED_FLAG: &str = "--remove_unused";

/// Paths of the scripts written by [`ScriptEmitter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScripts {
    pub install: PathBuf,
    pub cleanup: PathBuf,
}

/// Renders install and cleanup scripts.
#[derive(Debug, Clone)]
pub struct ScriptEmitter {
    product: String,
    delivery_tag: String,
    no_rebase: bool,
    unshallow: bool,
    jobs: usize,
}

/// Single-quote `value` for the shell.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// `"$WORKSPACE"/'<path>'`
fn in_workspace(path: &str) -> String {
    format!("\"$WORKSPACE\"/{}", quote(path))
}

fn abort_unless(script: &mut String, command: &str, message: &str) {
    let _ = writeln!(script, "if ! {}; then", command);
    let _ = writeln!(script, "  echo {}", quote(message));
    script.push_str("  exit 1\nfi\n");
}

impl ScriptEmitter {
    pub fn new(options: &DeliveryOptions) -> Self {
        Self {
            product: options.product.clone(),
            delivery_tag: options.delivery_tag.clone(),
            no_rebase: options.no_rebase,
            unshallow: options.unshallow,
            jobs: options.jobs.max(1),
        }
    }

    pub fn install_name(&self) -> String {
        format!("{}_patch.sh", self.product)
    }

    pub fn cleanup_name(&self) -> String {
        format!("{}_cleanup.sh", self.product)
    }

    fn header(&self, script: &mut String, name: &str, usage: &str) {
        script.push_str("#!/bin/sh\n");
        let _ = writeln!(
            script,
            "# Generated for {} (delivery tag {})",
            self.product, self.delivery_tag
        );
        script.push_str("if [ $# -eq 0 ]; then\n");
        let _ = writeln!(script, "  echo {}", quote(&format!("Usage: {} {}", name, usage)));
        script.push_str("  exit 1\nfi\n");
        // Absolute, as every project step changes directory
        script.push_str("WORKSPACE=$(cd \"$1\" && pwd) || exit 1\n");
    }

    fn project(&self, script: &mut String, delivery: &DeliverySet, record: &PatchRecord) {
        let path = &record.path;
        let _ = writeln!(script, "\n# {} ({})", path, record.manifest);
        let _ = writeln!(script, "echo \"$WORKSPACE\"/{}", quote(path));
        let _ = writeln!(script, "cd {} || exit 1", in_workspace(path));

        if self.unshallow && record.needs_patch && delivery.is_tracked(path) {
            script.push_str("git fetch ");
            if let Some(remote) = &record.remote {
                let _ = write!(script, "{} ", quote(remote));
            }
            let _ = writeln!(script, "--unshallow -j{}", self.jobs);
        }
        if !self.no_rebase {
            abort_unless(
                script,
                &format!("git checkout --quiet {}", record.checkout),
                &format!("Error for repository {}: checkout failed", path),
            );
        }
        script.push_str("git stash -u\n");
        if record.needs_patch {
            for patch in &record.patches {
                abort_unless(
                    script,
                    &format!(
                        "git am -3 -k --ignore-whitespace \"$PATCH_HOME\"/{}",
                        quote(patch)
                    ),
                    &format!("Error for repository {}: patch {} does not apply", path, patch),
                );
            }
        }
        let tag = quote(&self.delivery_tag);
        abort_unless(
            script,
            &format!("git tag -fa {} -m {}", tag, tag),
            &format!("Error for repository {}: tagging failed", path),
        );
    }

    /// Install script text.
    pub fn install_script(&self, delivery: &DeliverySet) -> String {
        let mut script = String::new();
        let name = self.install_name();
        self.header(
            &mut script,
            &name,
            &format!("<workspace_root> [{}]", REMOVE_UNUSED_FLAG),
        );
        script.push_str("PATCH_HOME=$(cd \"$(dirname \"$0\")\" && pwd)\n");

        for record in delivery.records() {
            self.project(&mut script, delivery, record);
        }

        if !delivery.archives().is_empty() {
            script.push_str("\n# Repositories not declared in the manifests\n");
        }
        for archived in delivery.archives() {
            let _ = writeln!(script, "echo {}", quote(&format!("Extracting {}", archived.path)));
            let _ = writeln!(script, "rm -rf {}", in_workspace(&archived.path));
            abort_unless(
                &mut script,
                &format!(
                    "tar -xzf \"$PATCH_HOME\"/{} -C \"$WORKSPACE\"",
                    quote(&archived.archive)
                ),
                &format!("Error for archive {}: extraction failed", archived.archive),
            );
            abort_unless(
                &mut script,
                &format!(
                    "(cd {} && git init -q && git add -A && git commit -q -m 'Initial commit')",
                    in_workspace(&archived.path)
                ),
                &format!("Error for archive {}: repository initialization failed", archived.archive),
            );
        }

        let mut removed = delivery.removed().peekable();
        if removed.peek().is_some() {
            script.push_str("\n# Projects dropped from the manifests\n");
            let _ = writeln!(script, "if [ \"$2\" = \"{}\" ]; then", REMOVE_UNUSED_FLAG);
            for path in removed {
                let _ = writeln!(script, "  if ! rm -rf {}; then", in_workspace(path));
                let _ = writeln!(
                    script,
                    "    echo {}",
                    quote(&format!("Error for path {}: unable to remove the folder", path))
                );
                script.push_str("  fi\n");
            }
            script.push_str("fi\n");
        }
        script.push_str("cd \"$PATCH_HOME\"\n");
        script
    }

    /// Cleanup script text.
    pub fn cleanup_script(&self, delivery: &DeliverySet) -> String {
        let mut script = String::new();
        let name = self.cleanup_name();
        self.header(&mut script, &name, "<workspace_root>");
        for archived in delivery.archives() {
            let _ = writeln!(script, "echo {}", quote(&format!("Removing {}", archived.path)));
            let _ = writeln!(script, "rm -rf {}", in_workspace(&archived.path));
        }
        script
    }

    /// Write both scripts into `dir` and mark them executable.
    pub fn write(&self, delivery: &DeliverySet, dir: &Path) -> Result<GeneratedScripts> {
        let install = dir.join(self.install_name());
        write_executable(&install, &self.install_script(delivery))?;
        let cleanup = dir.join(self.cleanup_name());
        write_executable(&cleanup, &self.cleanup_script(delivery))?;
        Ok(GeneratedScripts { install, cleanup })
    }
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ArchivedRepo;
    use crate::oracle::CommitId;
    use tempfile::TempDir;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn record(path: &str, patches: &[&str]) -> PatchRecord {
        PatchRecord {
            path: path.to_string(),
            manifest: "default".to_string(),
            remote: Some("aosp".to_string()),
            checkout: CommitId::new(SHA),
            patches: patches.iter().map(|p| p.to_string()).collect(),
            needs_patch: !patches.is_empty(),
        }
    }

    fn options() -> DeliveryOptions {
        DeliveryOptions {
            product: "falcon".to_string(),
            delivery_tag: "FALCON_V2".to_string(),
            ..Default::default()
        }
    }

    fn sample() -> DeliverySet {
        let mut set = DeliverySet::new();
        set.add_patch(record("frameworks/base", &["frameworks_base.patch"]));
        set.add_patch(record("bionic", &[]));
        set.add_track_remote("frameworks/base");
        set.add_archive(ArchivedRepo {
            path: "vendor/tools".to_string(),
            archive: "vendor_tools.tar.gz".to_string(),
        });
        set.add_removed("external/old");
        set
    }

    #[test]
    fn test_install_script_usage_guard() {
        let script = ScriptEmitter::new(&options()).install_script(&DeliverySet::new());
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("if [ $# -eq 0 ]; then"));
        assert!(script.contains("'Usage: falcon_patch.sh <workspace_root> [--remove_unused]'"));
    }

    #[test]
    fn test_workspace_root_made_absolute_in_both_scripts() {
        let emitter = ScriptEmitter::new(&options());
        let line = "WORKSPACE=$(cd \"$1\" && pwd) || exit 1\n";
        let install = emitter.install_script(&sample());
        let cleanup = emitter.cleanup_script(&sample());
        assert!(install.contains(line));
        assert!(cleanup.contains(line));
        assert!(!install.contains("WORKSPACE=$1\n"));
        assert!(install.find(line).unwrap() < install.find("cd \"$WORKSPACE\"/").unwrap());
    }

    #[test]
    fn test_install_script_project_steps_in_order() {
        let script = ScriptEmitter::new(&options()).install_script(&sample());

        let cd = script.find("cd \"$WORKSPACE\"/'frameworks/base' || exit 1").unwrap();
        let checkout = script.find(&format!("git checkout --quiet {}", SHA)).unwrap();
        let stash = script.find("git stash -u").unwrap();
        let apply = script
            .find("git am -3 -k --ignore-whitespace \"$PATCH_HOME\"/'frameworks_base.patch'")
            .unwrap();
        let tag = script.find("git tag -fa 'FALCON_V2' -m 'FALCON_V2'").unwrap();
        assert!(cd < checkout && checkout < stash && stash < apply && apply < tag);

        // Records keep insertion order
        let bionic = script.find("# bionic").unwrap();
        assert!(cd < bionic);
        assert_eq!(script.matches("git am").count(), 1);
        assert!(!script.contains("--unshallow"));
    }

    #[test]
    fn test_install_script_archives_and_removed_projects() {
        let script = ScriptEmitter::new(&options()).install_script(&sample());
        assert!(script.contains("rm -rf \"$WORKSPACE\"/'vendor/tools'"));
        assert!(script.contains("tar -xzf \"$PATCH_HOME\"/'vendor_tools.tar.gz' -C \"$WORKSPACE\""));
        assert!(script.contains("git init -q && git add -A"));

        let gate = script.find("if [ \"$2\" = \"--remove_unused\" ]; then").unwrap();
        let removal = script.find("if ! rm -rf \"$WORKSPACE\"/'external/old'; then").unwrap();
        assert!(gate < removal);
        // Removal failures are reported, never fatal
        let tail = &script[removal..];
        let block_end = tail.find("  fi\n").unwrap();
        assert!(!tail[..block_end].contains("exit 1"));
    }

    #[test]
    fn test_unshallow_only_for_tracked_patched_projects() {
        let emitter = ScriptEmitter::new(&DeliveryOptions {
            unshallow: true,
            jobs: 8,
            ..options()
        });
        let script = emitter.install_script(&sample());
        assert_eq!(script.matches("--unshallow").count(), 1);
        assert!(script.contains("git fetch 'aosp' --unshallow -j8"));
    }

    #[test]
    fn test_no_rebase_skips_checkout() {
        let emitter = ScriptEmitter::new(&DeliveryOptions {
            no_rebase: true,
            ..options()
        });
        assert!(!emitter.install_script(&sample()).contains("git checkout"));
    }

    #[test]
    fn test_cleanup_script_removes_archived_repositories() {
        let script = ScriptEmitter::new(&options()).cleanup_script(&sample());
        assert!(script.contains("'Usage: falcon_cleanup.sh <workspace_root>'"));
        assert!(script.contains("rm -rf \"$WORKSPACE\"/'vendor/tools'"));
        assert!(!script.contains("external/old"));
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[cfg(unix)]
    #[test]
    fn test_written_scripts_are_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let scripts = ScriptEmitter::new(&options()).write(&sample(), dir.path()).unwrap();
        assert_eq!(scripts.install, dir.path().join("falcon_patch.sh"));
        for path in [&scripts.install, &scripts.cleanup] {
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
