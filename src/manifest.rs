//! # Manifest Reading
//!
//! A manifest is the XML document `repo` uses to pin every project of a
//! workspace:
//!
//! ```xml
//! <manifest>
//!   <remote name="aosp" fetch=".." />
//!   <default remote="aosp" revision="refs/tags/android-14.0.0_r1" />
//!   <project path="build/make" name="platform/build" />
//!   <project path="vendor/acme" name="acme/vendor" remote="acme" revision="main" />
//! </manifest>
//! ```
//!
//! Several manifest files are merged into one [`ManifestSet`], in file-name
//! order. The `<default>` of a manifest stays in effect for the files read
//! after it, and a `<remote revision=...>` overrides the default revision of
//! its own file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;
use xot::{NameId, Node, Xot};

use crate::error::{Error, Result};

/// One `<project>` entry, as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDeclaration {
    /// Path of the checkout relative to the workspace root
    pub path: String,
    /// Project name on the remote
    pub name: String,
    /// Base name of the manifest file that declared the project
    pub manifest: String,
    /// Remote the project is fetched from
    pub remote: Option<String>,
    /// Fetch URL declared for that remote
    pub remote_url: Option<String>,
    /// Revision declared on the project itself
    pub revision: Option<String>,
    /// Default revision in effect for the declaring manifest
    pub default_revision: Option<String>,
}

#[derive(Debug, Clone)]
struct Remote {
    name: String,
    fetch: Option<String>,
    revision: Option<String>,
}

/// Interned element and attribute names.
struct Names {
    manifest: NameId,
    remote: NameId,
    default: NameId,
    project: NameId,
    name: NameId,
    path: NameId,
    fetch: NameId,
    revision: NameId,
    remote_attr: NameId,
}

impl Names {
    fn register(xot: &mut Xot) -> Self {
        let remote = xot.add_name("remote");
        Self {
            manifest: xot.add_name("manifest"),
            remote,
            default: xot.add_name("default"),
            project: xot.add_name("project"),
            name: xot.add_name("name"),
            path: xot.add_name("path"),
            fetch: xot.add_name("fetch"),
            revision: xot.add_name("revision"),
            remote_attr: remote,
        }
    }
}

/// All projects declared by the manifests of a workspace.
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    default_remote: Option<String>,
    default_revision: Option<String>,
    projects: Vec<ProjectDeclaration>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every manifest found at `path` (a file or a folder).
    pub fn load(path: &Path) -> Result<Self> {
        let mut set = Self::new();
        for file in discover_manifests(path)? {
            let content = fs::read_to_string(&file)?;
            let basename = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!("+ Reading manifest {}", file.display());
            set.add_manifest(&content, &basename)?;
        }
        Ok(set)
    }

    /// Declarations in manifest order.
    pub fn projects(&self) -> &[ProjectDeclaration] {
        &self.projects
    }

    /// Merge one manifest document into the set.
    pub fn add_manifest(&mut self, xml: &str, basename: &str) -> Result<()> {
        let parse_error = |message: String| Error::ManifestParse {
            file: basename.to_string(),
            message,
        };

        let mut xot = Xot::new();
        let names = Names::register(&mut xot);
        let root = xot.parse(xml).map_err(|e| parse_error(e.to_string()))?;
        let document = xot
            .document_element(root)
            .map_err(|e| parse_error(e.to_string()))?;
        if xot.element(document).map(|e| e.name()) != Some(names.manifest) {
            return Err(parse_error("root element is not <manifest>".to_string()));
        }

        let attr = |node: Node, name: NameId| -> Option<String> {
            xot.get_attribute(node, name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let elements = |wanted: NameId| -> Vec<Node> {
            xot.children(document)
                .filter(|child| xot.element(*child).map(|e| e.name()) == Some(wanted))
                .collect()
        };

        for node in elements(names.default) {
            if let Some(remote) = attr(node, names.remote_attr) {
                self.default_remote = Some(remote);
            }
            if let Some(revision) = attr(node, names.revision) {
                self.default_revision = Some(revision);
            }
        }

        let remotes: Vec<Remote> = elements(names.remote)
            .into_iter()
            .filter_map(|node| {
                Some(Remote {
                    name: attr(node, names.name)?,
                    fetch: attr(node, names.fetch),
                    revision: attr(node, names.revision),
                })
            })
            .collect();
        if remotes.len() > 1 {
            warn!(
                "! Several remotes declared in {} => selection of {}",
                basename, remotes[0].name
            );
        }
        let selected_remote = remotes.first();
        let manifest_remote = self
            .default_remote
            .clone()
            .or_else(|| selected_remote.map(|r| r.name.clone()));
        let manifest_revision = selected_remote
            .and_then(|r| r.revision.clone())
            .or_else(|| self.default_revision.clone());

        let mut known: HashSet<String> = self.projects.iter().map(|p| p.path.clone()).collect();
        for node in elements(names.project) {
            let name = attr(node, names.name);
            let Some(path) = attr(node, names.path).or_else(|| name.clone()) else {
                return Err(parse_error(
                    "<project> without 'name' or 'path' attribute".to_string(),
                ));
            };
            if !known.insert(path.clone()) {
                warn!("! Project {} declared twice, keeping the first declaration", path);
                continue;
            }
            let remote = attr(node, names.remote_attr).or_else(|| manifest_remote.clone());
            let remote_url = remote.as_ref().and_then(|wanted| {
                remotes
                    .iter()
                    .find(|r| &r.name == wanted)
                    .and_then(|r| r.fetch.clone())
            });
            debug!("+ Declared project {} ({:?})", path, remote);
            self.projects.push(ProjectDeclaration {
                name: name.unwrap_or_else(|| path.clone()),
                path,
                manifest: basename.to_string(),
                remote,
                remote_url,
                revision: attr(node, names.revision),
                default_revision: manifest_revision.clone(),
            });
        }
        Ok(())
    }
}

/// List the manifest files at `path`.
///
/// A file is returned as is. A folder is searched recursively, in file-name
/// order, for `*.xml` files that are not symbolic links; `.git` folders are
/// not entered.
pub fn discover_manifests(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut manifests = Vec::new();
    let walker = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            if entry.path_is_symlink() {
                debug!("! {} is a symlink => ignored", entry.path().display());
            }
            continue;
        }
        if entry.path().extension().is_some_and(|ext| ext == "xml") {
            manifests.push(entry.into_path());
        }
    }
    Ok(manifests)
}
