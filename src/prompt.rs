//! Operator confirmation for anomalies that need a human decision.

use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::error::{Error, Result};

/// Asks the operator whether a run may continue.
pub trait OperatorPrompt {
    /// `Ok(true)` to continue, `Ok(false)` to abort.
    fn confirm_continue(&self, message: &str) -> Result<bool>;
}

/// Interactive prompt on the controlling terminal.
///
/// Without a terminal the question cannot be asked and the answer is "no".
#[derive(Debug, Default)]
pub struct DialoguerPrompt;

impl OperatorPrompt for DialoguerPrompt {
    fn confirm_continue(&self, message: &str) -> Result<bool> {
        if !console::Term::stderr().is_term() {
            log::error!("{} (no terminal to confirm, aborting)", message);
            return Ok(false);
        }
        let theme = ColorfulTheme::default();
        Confirm::with_theme(&theme)
            .with_prompt(format!("{} Continue?", message))
            .default(false)
            .interact()
            .map_err(|e| Error::Prompt {
                message: e.to_string(),
            })
    }
}

/// Prompt answering the same way every time (`--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl OperatorPrompt for FixedAnswer {
    fn confirm_continue(&self, message: &str) -> Result<bool> {
        log::warn!("{} ({})", message, if self.0 { "continuing" } else { "aborting" });
        Ok(self.0)
    }
}
