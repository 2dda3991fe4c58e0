//! Interaction adapter for the rename-propagation prompt.
//!
//! The commit protocol suspends exactly once: after the rename diff and
//! before any mutation it may ask the user whether renamed variables should
//! be carried over to the graphical nodes that reference them. That question
//! goes through [`InteractionAdapter`], so the protocol runs the same way
//! behind a terminal, a test double, or a host UI.
//!
//! Implementations:
//!
//! - [`NonInteractiveAdapter`]: never asks; reports `NonTty`
//! - [`FixedAnswer`]: answers every prompt with a preset value
//! - `StdioAdapter` (in the `plcsync` crate): terminal prompt on stdin
//!
//! The trait is object-safe, allowing it to be used as `&dyn InteractionAdapter`.

use thiserror::Error;

/// Error type for interaction operations
#[derive(Error, Debug)]
pub enum InteractionError {
    /// User dismissed the prompt (end of input, closed dialog)
    #[error("operation cancelled by user")]
    Cancelled,

    /// Standard input is not a TTY (e.g., running in CI or piped input)
    #[error("stdin is not a TTY - interactive input unavailable")]
    NonTty,

    /// Reading the answer or writing the prompt failed
    #[error("IO error: {0}")]
    Io(String),

    /// Answer that is neither yes nor no
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for InteractionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for interaction operations
pub type InteractionResult<T> = Result<T, InteractionError>;

/// User interaction seam of the commit protocol.
pub trait InteractionAdapter {
    /// Ask a yes/no question.
    ///
    /// # Errors
    /// `Cancelled` when the user dismisses the prompt, `NonTty` when no
    /// interactive input is available.
    fn ask_confirm(&self, prompt: &str, default: bool) -> InteractionResult<bool>;

    /// Print an informational message.
    fn print_info(&self, message: &str);

    /// Print a warning message.
    fn print_warning(&self, message: &str);
}

/// Adapter for CI and piped input: every prompt fails with `NonTty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractiveAdapter;

impl InteractionAdapter for NonInteractiveAdapter {
    fn ask_confirm(&self, _prompt: &str, _default: bool) -> InteractionResult<bool> {
        Err(InteractionError::NonTty)
    }

    fn print_info(&self, _message: &str) {}

    fn print_warning(&self, _message: &str) {}
}

/// Adapter that answers every confirmation with a preset value (`--yes` / `--no`).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl InteractionAdapter for FixedAnswer {
    fn ask_confirm(&self, _prompt: &str, _default: bool) -> InteractionResult<bool> {
        Ok(self.0)
    }

    fn print_info(&self, _message: &str) {}

    fn print_warning(&self, _message: &str) {}
}

/// Prompt shown before carrying renames over to graphical nodes.
pub fn rename_prompt(pairs: &[crate::rename::RenamePair]) -> String {
    let listed: Vec<String> = pairs
        .iter()
        .map(|p| format!("\"{}\" -> \"{}\"", p.old_name, p.new_name))
        .collect();
    format!(
        "Renamed variable(s) {} are used in graphical editors. Update the references too?",
        listed.join(", ")
    )
}
