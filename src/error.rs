//! # Error Handling
//!
//! This module defines the centralized error type for `repo-delivery`. It uses
//! the `thiserror` library to build a single `Error` enum covering every
//! failure the delivery engine can report, with the offending project path
//! carried in each project-scoped variant.
//!
//! ## Key Components
//!
//! - **`Error`**: All failures of a delivery run. Variants split into two
//!   families:
//!   - *Fatal delivery conditions* (`OutOfControl`, `DirtyProject`,
//!     `PatchExtraction`, `Checkout`, `AncestryUnreachable`,
//!     `ToTagUnresolved`, `TagFetch`). Each one stops the run and maps to its
//!     own process exit code through [`Error::exit_code`].
//!   - *Infrastructure failures* (git invocation, manifest parsing,
//!     configuration, archiving, I/O, serialization, prompting).
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Recoverable per-project conditions (missing common ancestor, duplicate
//! patch record, unresolved since-tag) are never errors: they are logged and
//! recorded in the delivery diagnostics instead.

use thiserror::Error;

use crate::exit_codes;

/// Main error type for repo-delivery operations
#[derive(Error, Debug)]
pub enum Error {
    /// The declared manifest revision could not be resolved in the project.
    #[error("Project {path} is out of control: unable to locate manifest revision '{revision}'")]
    OutOfControl { path: String, revision: String },

    /// The project checkout carries uncommitted or untracked changes.
    #[error("Project {path} is not clean (use --ignore-dirty to proceed anyway)")]
    DirtyProject { path: String },

    /// The version-control system could not produce a patch.
    #[error("Patch extraction failed for {path}: {message}")]
    PatchExtraction { path: String, message: String },

    /// Moving the project HEAD failed during patch generation.
    #[error("Checkout of {commit} failed in {path}: {message}")]
    Checkout {
        path: String,
        commit: String,
        message: String,
    },

    /// The manifest commit history cannot be enumerated and the operator
    /// declined to continue.
    #[error("History of manifest commit {commit} is unreachable in {path}")]
    AncestryUnreachable { path: String, commit: String },

    /// A configured to-tag was not found in one or more projects.
    #[error("Tag '{tag}' could not be resolved in: {}", paths.join(", "))]
    ToTagUnresolved { tag: String, paths: Vec<String> },

    /// Fetching tag references failed.
    #[error("Error while fetching tags in {path}: {message}")]
    TagFetch { path: String, message: String },

    /// A git command could not be run or exited unsuccessfully.
    #[error("Git command failed in {path}: {command} - {stderr}")]
    GitCommand {
        command: String,
        path: String,
        stderr: String,
    },

    /// A manifest file could not be parsed.
    #[error("Manifest parsing error in {file}: {message}")]
    ManifestParse { file: String, message: String },

    /// Invalid run options.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the option
        hint: Option<String>,
    },

    /// Packing a directory into a tarball failed.
    #[error("Archive error for {path}: {message}")]
    Archive { path: String, message: String },

    /// The operator prompt could not be shown or answered.
    #[error("Prompt error: {message}")]
    Prompt { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::OutOfControl { .. } => exit_codes::OUT_OF_CONTROL,
            Error::DirtyProject { .. } => exit_codes::DIRTY_PROJECT,
            Error::PatchExtraction { .. } => exit_codes::PATCH_EXTRACTION,
            Error::Checkout { .. } => exit_codes::CHECKOUT,
            Error::AncestryUnreachable { .. } => exit_codes::ANCESTRY_UNREACHABLE,
            Error::ToTagUnresolved { .. } => exit_codes::TO_TAG_UNRESOLVED,
            _ => exit_codes::ERROR,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
