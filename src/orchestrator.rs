//! # Delivery Orchestrator
//!
//! Drives a complete delivery run, one phase after the other:
//!
//! 1. **Manifests** - read and merge every manifest, apply scope and skip lists.
//! 2. **Extraction** - open each project, resolve its commits and stop on
//!    out-of-control projects or a to-tag missing anywhere.
//! 3. **Cleanliness** - check every working tree before any patch is written.
//! 4. **Processing** - decide and build patches, strictly one project at a
//!    time, since building a patch moves the project HEAD.
//! 5. **Strays** - find undeclared checkouts and pack them.
//! 6. **Outputs** - diagnostics files, archives and scripts.
//!
//! The run returns a [`DeliveryReport`] summarizing every project.

use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};
use serde::Serialize;

use crate::archive;
use crate::config::DeliveryOptions;
use crate::decision::{Decision, PatchDecisionEngine};
use crate::delivery::{self, ArchivedRepo, DeliverySet, Unhandled};
use crate::discovery;
use crate::error::{Error, Result};
use crate::manifest::{ManifestSet, ProjectDeclaration};
use crate::oracle::{CommitId, CommitOracle, OracleProvider};
use crate::patchset::PatchSetBuilder;
use crate::project::{ProjectState, TagBounds};
use crate::prompt::OperatorPrompt;
use crate::revision::RevisionResolver;
use crate::script::{GeneratedScripts, ScriptEmitter};

/// Build configuration file copied into the delivery when present.
const BUILD_RC: &str = "build.rc";
/// Subfolder receiving the `--tar` archives of delivered projects.
const ARCHIVE_FOLDER: &str = "archive";

/// Outcome of one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    /// Patch files were written
    Patched,
    /// A patch is needed but the run is dry
    NeedsPatch,
    /// Delivered as-is at its checkout point
    Unchanged,
    /// Checkout matches its checkout point
    UpToDate,
    /// Left out of the delivery
    Excluded,
    /// Declared but missing from the workspace
    Removed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Patched => "patched",
            ProjectStatus::NeedsPatch => "needs patch",
            ProjectStatus::Unchanged => "unchanged",
            ProjectStatus::UpToDate => "up to date",
            ProjectStatus::Excluded => "excluded",
            ProjectStatus::Removed => "removed",
        }
    }
}

/// Per-project line of a [`DeliveryReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub path: String,
    pub revision: String,
    /// Abbreviated commits, empty when unresolved
    pub current: String,
    pub manifest: String,
    pub checkout: String,
    pub dirty: bool,
    pub tracked: bool,
    pub status: ProjectStatus,
    pub patches: Vec<String>,
}

/// What a delivery run did.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub output_folder: PathBuf,
    pub dry_run: bool,
    pub projects: Vec<ProjectSummary>,
    pub strays: Vec<String>,
    pub unhandled: Vec<Unhandled>,
    pub owner_restricted: Vec<String>,
    #[serde(skip)]
    pub scripts: Option<GeneratedScripts>,
}

impl DeliveryReport {
    pub fn count(&self, status: ProjectStatus) -> usize {
        self.projects.iter().filter(|p| p.status == status).count()
    }
}

struct Project {
    state: ProjectState,
    oracle: Box<dyn CommitOracle>,
    dirty: bool,
    status: ProjectStatus,
}

fn short(commit: Option<&CommitId>) -> String {
    commit.map(|c| c.short().to_string()).unwrap_or_default()
}

/// Runs delivery phases against a workspace.
pub struct DeliveryOrchestrator<'a> {
    options: &'a DeliveryOptions,
    provider: &'a dyn OracleProvider,
    prompt: &'a dyn OperatorPrompt,
}

impl<'a> DeliveryOrchestrator<'a> {
    /// `options` are expected to be validated.
    pub fn new(
        options: &'a DeliveryOptions,
        provider: &'a dyn OracleProvider,
        prompt: &'a dyn OperatorPrompt,
    ) -> Self {
        Self {
            options,
            provider,
            prompt,
        }
    }

    pub fn run(&self) -> Result<DeliveryReport> {
        let options = self.options;
        let mut delivery = DeliverySet::new();

        // Phase 1: Manifests
        let manifests = ManifestSet::load(&options.manifest_path())?;
        let declared: Vec<&str> = manifests.projects().iter().map(|p| p.path.as_str()).collect();
        let selected = self.select(manifests.projects());
        info!(
            "{} projects declared, {} selected",
            declared.len(),
            selected.len()
        );

        // Phase 2: Extraction
        let mut removed = Vec::new();
        let mut projects = self.extract(&selected, &mut delivery, &mut removed)?;

        // Phase 3: Cleanliness
        let engine = PatchDecisionEngine::new(options);
        for project in &mut projects {
            project.dirty = engine.check_clean(&project.state, project.oracle.as_ref())?;
        }

        // Phase 4: Processing
        let builder = PatchSetBuilder::new(&options.output_folder, options.patch_mode);
        for project in &mut projects {
            project.status = self.process(project, &engine, &builder, &mut delivery)?;
        }

        // Phase 5: Strays
        let checkouts = discovery::find_checkouts(&options.workspace)?;
        let strays = discovery::stray_repositories(checkouts, declared.iter().copied());
        self.pack_strays(&strays, &mut delivery)?;

        // Phase 6: Outputs
        let scripts = self.write_outputs(&strays, &delivery)?;

        let mut summaries: Vec<ProjectSummary> = projects
            .iter()
            .map(|p| self.summarize(p, &delivery))
            .collect();
        summaries.extend(removed.into_iter().map(|(path, revision)| ProjectSummary {
            path,
            revision,
            current: String::new(),
            manifest: String::new(),
            checkout: String::new(),
            dirty: false,
            tracked: false,
            status: ProjectStatus::Removed,
            patches: Vec::new(),
        }));

        Ok(DeliveryReport {
            output_folder: options.output_folder.clone(),
            dry_run: options.dry_run,
            projects: summaries,
            strays,
            unhandled: delivery.unhandled().to_vec(),
            owner_restricted: delivery.owner_restricted().map(str::to_string).collect(),
            scripts,
        })
    }

    fn select<'m>(&self, declarations: &'m [ProjectDeclaration]) -> Vec<&'m ProjectDeclaration> {
        let scope = &self.options.scope;
        let skip = &self.options.skip;
        declarations
            .iter()
            .filter(|decl| {
                if !scope.is_empty() && !scope.contains(&decl.path) {
                    info!("- {} is out of scope", decl.path);
                    return false;
                }
                if skip.contains(&decl.path) {
                    info!("- {} skipped", decl.path);
                    return false;
                }
                true
            })
            .collect()
    }

    fn extract(
        &self,
        selected: &[&ProjectDeclaration],
        delivery: &mut DeliverySet,
        removed: &mut Vec<(String, String)>,
    ) -> Result<Vec<Project>> {
        let options = self.options;
        let resolver = RevisionResolver::new(options.owner_marker.clone());
        let bounds = TagBounds {
            since: options.since_tag.clone(),
            to: options.to_tag.clone(),
            jobs: options.jobs,
        };

        let mut projects = Vec::with_capacity(selected.len());
        let mut missing_to_tag = Vec::new();
        for decl in selected {
            let selection =
                resolver.select(decl.revision.as_deref(), decl.default_revision.as_deref());
            if selection.owner_restricted {
                delivery.add_owner_restricted(&decl.path);
            }

            let Some(oracle) = self.provider.open(&decl.path)? else {
                warn!("! {} is declared but missing from the workspace", decl.path);
                delivery.add_removed(&decl.path);
                removed.push((decl.path.clone(), selection.revision));
                continue;
            };

            let mut state = ProjectState::new((*decl).clone(), selection.revision);
            state.extract(oracle.as_ref(), &bounds)?;
            if let Err(e) = state.ensure_in_control() {
                error!("! {}", e);
                return Err(e);
            }
            if state.since_tag_missing() {
                if let Some(tag) = &options.since_tag {
                    warn!("! Impossible to retrieve {} in {}", tag, decl.path);
                    delivery.add_unhandled(
                        &decl.path,
                        format!("since tag {} not found, measured from the manifest revision", tag),
                    );
                }
            }
            if state.to_tag_missing() {
                if let Some(tag) = &options.to_tag {
                    warn!("! Impossible to retrieve {} in {}", tag, decl.path);
                }
                missing_to_tag.push(decl.path.clone());
            }

            projects.push(Project {
                state,
                oracle,
                dirty: false,
                status: ProjectStatus::UpToDate,
            });
        }

        if let (Some(tag), false) = (&options.to_tag, missing_to_tag.is_empty()) {
            return Err(Error::ToTagUnresolved {
                tag: tag.clone(),
                paths: missing_to_tag,
            });
        }
        Ok(projects)
    }

    fn process(
        &self,
        project: &mut Project,
        engine: &PatchDecisionEngine,
        builder: &PatchSetBuilder,
        delivery: &mut DeliverySet,
    ) -> Result<ProjectStatus> {
        let oracle = project.oracle.as_ref();
        let decision = engine.decide(&mut project.state, oracle, self.prompt, delivery)?;
        let status = match decision {
            Decision::Unchanged => ProjectStatus::Unchanged,
            Decision::NoPatch => ProjectStatus::UpToDate,
            Decision::Excluded { .. } => ProjectStatus::Excluded,
            Decision::Patch if self.options.dry_run => ProjectStatus::NeedsPatch,
            Decision::Patch => match builder.build(&project.state, oracle)? {
                Some(record) => {
                    if delivery.add_patch(record) {
                        ProjectStatus::Patched
                    } else {
                        ProjectStatus::Excluded
                    }
                }
                None => ProjectStatus::UpToDate,
            },
        };
        Ok(status)
    }

    fn pack_strays(&self, strays: &[String], delivery: &mut DeliverySet) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }
        for path in strays {
            let archive = archive::pack(&self.options.workspace, path, &self.options.output_folder)?;
            delivery.add_archive(ArchivedRepo {
                path: path.clone(),
                archive,
            });
        }
        Ok(())
    }

    fn write_outputs(
        &self,
        strays: &[String],
        delivery: &DeliverySet,
    ) -> Result<Option<GeneratedScripts>> {
        let options = self.options;
        let output = &options.output_folder;

        delivery.write_tracked(output)?;
        delivery.write_unhandled(output)?;
        if !strays.is_empty() {
            delivery::write_strays(output, strays)?;
        }
        if options.dry_run {
            return Ok(None);
        }

        let build_rc = options.workspace.join(BUILD_RC);
        if build_rc.is_file() {
            fs::copy(&build_rc, output.join(BUILD_RC))?;
        }

        if options.archive_projects {
            let folder = output.join(ARCHIVE_FOLDER);
            for record in delivery.records() {
                archive::pack(&options.workspace, &record.path, &folder)?;
            }
        }

        if !delivery.has_script_content() {
            info!("Nothing to deliver, no script generated");
            return Ok(None);
        }
        let scripts = ScriptEmitter::new(options).write(delivery, output)?;
        info!("Install script written to {}", scripts.install.display());
        Ok(Some(scripts))
    }

    fn summarize(&self, project: &Project, delivery: &DeliverySet) -> ProjectSummary {
        let state = &project.state;
        let resolution = state.resolution();
        ProjectSummary {
            path: state.path().to_string(),
            revision: state.revision().to_string(),
            current: short(resolution.current.as_ref()),
            manifest: short(resolution.manifest.as_ref()),
            checkout: short(resolution.checkout.as_ref()),
            dirty: project.dirty,
            tracked: delivery.is_tracked(state.path()),
            status: project.status,
            patches: delivery
                .record(state.path())
                .map(|r| r.patches.clone())
                .unwrap_or_default(),
        }
    }
}
