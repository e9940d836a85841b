//! Operator interaction.
//!
//! Every question PiNet asks goes through the [`Dialog`] trait, which keeps
//! the decision logic elsewhere in the crate free of presentation code.
//!
//! Implementations:
//! - [`WhiptailDialog`]: the interactive terminal UI, shelling out to `whiptail`
//! - [`AssumeYesDialog`]: non-interactive mode (`--yes`), which accepts every
//!   confirmation, cancels every free-text question and aborts on failures
//!
//! Tests use the scripted implementation in `test_utils`.

pub mod whiptail;

pub use whiptail::WhiptailDialog;

use anyhow::Result;
use colored::Colorize;
use std::future::Future;

/// What to do after an external command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    /// Ignore the failure and carry on with the next step
    Continue,
    /// Run exactly the same command again
    Retry,
    /// Stop the whole operation
    Abort,
}

/// One entry of a menu or checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    /// Value returned when the entry is chosen
    pub tag: String,
    /// Text shown beside the tag
    pub description: String,
}

impl MenuOption {
    /// Create a menu entry.
    pub fn new(tag: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            description: description.into(),
        }
    }

    /// A menu entry with no description.
    pub fn tag_only(tag: impl Into<String>) -> Self {
        Self::new(tag, "")
    }
}

/// Operator dialogs.
///
/// `None` results mean the operator cancelled.
pub trait Dialog: Send + Sync {
    /// Show an informational message and wait for acknowledgement.
    fn message(&self, title: &str, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Ask a yes/no question with custom button labels.
    fn confirm_with(
        &self,
        title: &str,
        text: &str,
        yes_label: &str,
        no_label: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Ask a yes/no question.
    fn confirm(&self, title: &str, text: &str) -> impl Future<Output = Result<bool>> + Send {
        self.confirm_with(title, text, "Yes", "No")
    }

    /// Ask for a line of free text.
    fn prompt(&self, title: &str, text: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Choose a single entry from a menu.
    fn select(
        &self,
        title: &str,
        text: &str,
        options: &[MenuOption],
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Choose any number of entries from a checklist.
    fn multiselect(
        &self,
        title: &str,
        text: &str,
        options: &[MenuOption],
    ) -> impl Future<Output = Result<Option<Vec<String>>>> + Send;

    /// Decide how to proceed after a command failed.
    fn choose_recovery(
        &self,
        title: &str,
        text: &str,
    ) -> impl Future<Output = Result<RecoveryChoice>> + Send;
}

/// Non-interactive dialog used with `--yes`.
///
/// Messages are printed to stdout. Confirmations are accepted, free-text
/// prompts and menus are cancelled, and command failures abort, so an
/// unattended run never guesses at input it was not given.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYesDialog;

impl Dialog for AssumeYesDialog {
    async fn message(&self, title: &str, text: &str) -> Result<()> {
        println!("{}\n{}", title.bold(), text);
        Ok(())
    }

    async fn confirm_with(&self, title: &str, text: &str, yes_label: &str, _no_label: &str) -> Result<bool> {
        tracing::info!("{}: {} (answered '{}' automatically)", title, text, yes_label);
        Ok(true)
    }

    async fn prompt(&self, title: &str, _text: &str) -> Result<Option<String>> {
        tracing::warn!("Cannot answer '{}' in non-interactive mode", title);
        Ok(None)
    }

    async fn select(&self, title: &str, _text: &str, _options: &[MenuOption]) -> Result<Option<String>> {
        tracing::warn!("Cannot answer '{}' in non-interactive mode", title);
        Ok(None)
    }

    async fn multiselect(
        &self,
        title: &str,
        _text: &str,
        _options: &[MenuOption],
    ) -> Result<Option<Vec<String>>> {
        tracing::warn!("Cannot answer '{}' in non-interactive mode", title);
        Ok(None)
    }

    async fn choose_recovery(&self, _title: &str, text: &str) -> Result<RecoveryChoice> {
        tracing::warn!("Aborting after failure in non-interactive mode: {}", text);
        Ok(RecoveryChoice::Abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assume_yes_dialog_answers() {
        let dialog = AssumeYesDialog;
        assert!(dialog.confirm("Restore", "Are you sure?").await.unwrap());
        assert_eq!(dialog.prompt("Name", "Enter a name").await.unwrap(), None);
        assert_eq!(
            dialog.select("Pick", "Pick one", &[MenuOption::tag_only("a")]).await.unwrap(),
            None
        );
        assert_eq!(dialog.choose_recovery("Failed", "apt-get").await.unwrap(), RecoveryChoice::Abort);
    }
}
