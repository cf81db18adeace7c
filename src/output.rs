//! # Terminal Output
//!
//! Rendering of a [`DeliveryReport`] for the terminal: a per-project table for
//! `inspect` and a short summary for both commands.
//!
//! Decoration is controlled by [`OutputConfig`]:
//! - `--color=never|always|auto`
//! - `NO_COLOR`, `CLICOLOR=0` and `TERM=dumb` turn decoration off in auto mode
//! - `CLICOLOR_FORCE=1` turns it on even when stdout is not a TTY
//!
//! ```rust,ignore
//! use repo_delivery::output::{emoji, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} Delivering...", emoji(&config, "📦", "[RUN]"));
//! ```

use std::env;
use std::fmt::Write as _;

use console::style;

use crate::orchestrator::{DeliveryReport, ProjectStatus};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Build the configuration from the `--color` value.
    ///
    /// `always` and `never` win over the environment; anything else detects.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // https://no-color.org/: presence alone disables
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when decoration is on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn paint(config: &OutputConfig, status: ProjectStatus) -> String {
    let label = status.as_str();
    if !config.use_color {
        return label.to_string();
    }
    match status {
        ProjectStatus::Patched | ProjectStatus::NeedsPatch => style(label).yellow().to_string(),
        ProjectStatus::Excluded => style(label).red().to_string(),
        ProjectStatus::Removed => style(label).magenta().to_string(),
        ProjectStatus::Unchanged | ProjectStatus::UpToDate => style(label).green().to_string(),
    }
}

/// One line per project: path, revision, commits and status.
pub fn report_table(config: &OutputConfig, report: &DeliveryReport) -> String {
    let width = report
        .projects
        .iter()
        .map(|p| p.path.len())
        .max()
        .unwrap_or(0)
        .max("PROJECT".len());
    let mut table = String::new();
    let _ = writeln!(
        table,
        "{:<width$}  {:<9}  {:<9}  {:<9}  {:<5}  STATUS",
        "PROJECT", "CURRENT", "MANIFEST", "CHECKOUT", "FLAGS"
    );
    for project in &report.projects {
        let flags = format!(
            "{}{}",
            if project.dirty { "D" } else { "-" },
            if project.tracked { "T" } else { "-" }
        );
        let _ = writeln!(
            table,
            "{:<width$}  {:<9}  {:<9}  {:<9}  {:<5}  {}",
            project.path,
            project.current,
            project.manifest,
            project.checkout,
            flags,
            paint(config, project.status)
        );
    }
    table
}

/// Short closing summary of a run.
pub fn report_summary(config: &OutputConfig, report: &DeliveryReport) -> String {
    let mut summary = String::new();
    let patched = report.count(ProjectStatus::Patched) + report.count(ProjectStatus::NeedsPatch);
    let _ = writeln!(
        summary,
        "{} {} projects, {} with patches, {} unchanged, {} excluded, {} removed",
        emoji(config, "📦", "[DONE]"),
        report.projects.len(),
        patched,
        report.count(ProjectStatus::Unchanged) + report.count(ProjectStatus::UpToDate),
        report.count(ProjectStatus::Excluded),
        report.count(ProjectStatus::Removed),
    );
    if !report.strays.is_empty() {
        let _ = writeln!(
            summary,
            "{} {} repositories not declared by the manifests",
            emoji(config, "⚠️ ", "[WARN]"),
            report.strays.len()
        );
    }
    if !report.unhandled.is_empty() {
        let _ = writeln!(
            summary,
            "{} {} projects need attention, see unhandled_projects.json",
            emoji(config, "⚠️ ", "[WARN]"),
            report.unhandled.len()
        );
    }
    match &report.scripts {
        Some(scripts) => {
            let _ = writeln!(
                summary,
                "{} Install script: {}",
                emoji(config, "✅", "[OK]"),
                scripts.install.display()
            );
        }
        None if report.dry_run => {
            let _ = writeln!(
                summary,
                "{} Dry run, diagnostics written to {}",
                emoji(config, "🔎", "[DRY]"),
                report.output_folder.display()
            );
        }
        None => {
            let _ = writeln!(summary, "Nothing to deliver");
        }
    }
    summary
}
