//! Yes/no prompts for destructive actions.

use super::ActionError;

/// Asks the user whether to go ahead with an action.
pub trait Confirm {
    /// Show `prompt` and return the answer.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Prompt`] if no answer could be read.
    fn confirm(&self, prompt: &str) -> Result<bool, ActionError>;
}

/// Interactive terminal prompt. Defaults to "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerConfirm;

impl Confirm for DialoguerConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool, ActionError> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| ActionError::Prompt(e.to_string()))
    }
}

/// Answers every prompt the same way without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlwaysAnswer(pub bool);

impl Confirm for AlwaysAnswer {
    fn confirm(&self, prompt: &str) -> Result<bool, ActionError> {
        log::debug!("{} -> {}", prompt, if self.0 { "yes" } else { "no" });
        Ok(self.0)
    }
}
