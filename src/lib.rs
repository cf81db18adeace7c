//! # Repo Delivery Library
//!
//! This library extracts "what changed" from a multi-repository workspace
//! managed by `repo` and turns it into a replayable delivery: patch files plus
//! an install script that reproduces the modifications on a clean checkout of
//! the same manifest. It backs the `repo-delivery` command-line tool.
//!
//! ## Quick Example
//!
//! ```
//! use repo_delivery::revision::{lookup_candidates, RevisionResolver};
//!
//! let resolver = RevisionResolver::new(Some("oem_code".to_string()));
//! let selected = resolver.select(Some("refs/heads/android-14"), None);
//! assert_eq!(selected.revision, "android-14");
//! assert!(!selected.owner_restricted);
//!
//! // Remote-qualified names are tried before local homonyms
//! let candidates = lookup_candidates(Some("aosp"), &selected.revision);
//! assert_eq!(candidates[0], "aosp/android-14");
//! ```
//!
//! ## Core Concepts
//!
//! - **Commit oracle (`oracle`, `git`)**: every question about a project's
//!   history goes through the [`oracle::CommitOracle`] trait, implemented on
//!   top of the system `git`.
//! - **Project state (`project`, `revision`)**: the commits resolved once per
//!   declared project (current, manifest, since-tag, to-tag, checkout point).
//! - **Classification (`ancestry`, `decision`)**: where a patch series starts
//!   and whether one is needed at all.
//! - **Materialization (`patchset`, `delivery`, `script`)**: patch files, the
//!   deduplicated delivery set and the generated shell scripts.
//! - **Workspace (`manifest`, `discovery`, `archive`)**: manifest reading,
//!   stray repository discovery and tar packaging.
//!
//! ## Execution Flow
//!
//! [`orchestrator::DeliveryOrchestrator`] runs the phases in order:
//!
//! 1.  **Manifests**: read and merge the manifests, apply scope and skip lists.
//! 2.  **Extraction**: resolve each project's commits; out-of-control projects
//!     and a missing to-tag stop the run.
//! 3.  **Cleanliness**: a dirty project stops the run before any patch exists.
//! 4.  **Processing**: decide and build patches, one project at a time.
//! 5.  **Strays**: find and pack repositories no manifest declares.
//! 6.  **Outputs**: diagnostics, archives and the install and cleanup scripts.

pub mod ancestry;
pub mod archive;
pub mod config;
pub mod decision;
pub mod delivery;
pub mod discovery;
pub mod error;
pub mod exit_codes;
pub mod git;
pub mod manifest;
pub mod oracle;
pub mod orchestrator;
pub mod output;
pub mod patchset;
pub mod project;
pub mod prompt;
pub mod revision;
pub mod script;
