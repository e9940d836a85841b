//! `whiptail` terminal dialogs.
//!
//! whiptail draws on the terminal and writes the operator's answer to
//! stderr. Exit status 0 means OK/Yes, 1 means Cancel/No and 255 means the
//! operator pressed Escape, which is treated like Cancel.

use anyhow::{Context, Result, bail};
use std::process::Stdio;
use tokio::process::Command;

use super::{Dialog, MenuOption, RecoveryChoice};

const PROGRAM: &str = "whiptail";

/// Interactive dialogs rendered by `whiptail`.
#[derive(Debug, Clone)]
pub struct WhiptailDialog {
    height: u16,
    width: u16,
}

impl Default for WhiptailDialog {
    fn default() -> Self {
        Self {
            height: 16,
            width: 78,
        }
    }
}

impl WhiptailDialog {
    /// Create a dialog, failing if `whiptail` is not installed.
    pub fn new() -> Result<Self> {
        which::which(PROGRAM).context(
            "whiptail is not installed. Install it with 'apt-get install whiptail' or re-run with --yes",
        )?;
        Ok(Self::default())
    }

    /// Box height scaled to the amount of text, clamped to the terminal default.
    fn height_for(&self, text: &str) -> String {
        let lines = text.lines().count() as u16;
        (lines + 7).clamp(8, self.height.max(8) + 14).to_string()
    }

    async fn run(&self, args: Vec<String>) -> Result<(Option<i32>, String)> {
        tracing::debug!(target: "dialog", "{} {}", PROGRAM, args.join(" "));

        let output = Command::new(PROGRAM)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run whiptail")?;

        Ok((output.status.code(), String::from_utf8_lossy(&output.stderr).trim().to_string()))
    }

    fn base_args(&self, title: &str, kind: &str, text: &str) -> Vec<String> {
        vec![
            "--title".to_string(),
            title.to_string(),
            kind.to_string(),
            text.to_string(),
            self.height_for(text),
            self.width.to_string(),
        ]
    }
}

impl Dialog for WhiptailDialog {
    async fn message(&self, title: &str, text: &str) -> Result<()> {
        self.run(self.base_args(title, "--msgbox", text)).await?;
        Ok(())
    }

    async fn confirm_with(&self, title: &str, text: &str, yes_label: &str, no_label: &str) -> Result<bool> {
        let mut args = self.base_args(title, "--yesno", text);
        args.extend([
            "--yes-button".to_string(),
            yes_label.to_string(),
            "--no-button".to_string(),
            no_label.to_string(),
        ]);

        match self.run(args).await?.0 {
            Some(0) => Ok(true),
            Some(1 | 255) => Ok(false),
            code => bail!("whiptail exited unexpectedly ({code:?})"),
        }
    }

    async fn prompt(&self, title: &str, text: &str) -> Result<Option<String>> {
        let (code, answer) = self.run(self.base_args(title, "--inputbox", text)).await?;
        Ok((code == Some(0)).then_some(answer))
    }

    async fn select(&self, title: &str, text: &str, options: &[MenuOption]) -> Result<Option<String>> {
        let mut args = self.base_args(title, "--menu", text);
        args.push(options.len().min(8).to_string());
        let any_description = options.iter().any(|o| !o.description.is_empty());
        for option in options {
            args.push(option.tag.clone());
            args.push(option.description.clone());
        }
        if !any_description {
            args.push("--noitem".to_string());
        }

        let (code, answer) = self.run(args).await?;
        Ok((code == Some(0) && !answer.is_empty()).then_some(answer))
    }

    async fn multiselect(
        &self,
        title: &str,
        text: &str,
        options: &[MenuOption],
    ) -> Result<Option<Vec<String>>> {
        let mut args = vec![
            "--title".to_string(),
            title.to_string(),
            "--separate-output".to_string(),
            "--checklist".to_string(),
            text.to_string(),
            "20".to_string(),
            "100".to_string(),
            options.len().to_string(),
        ];
        for option in options {
            args.push(option.tag.clone());
            args.push(option.description.clone());
            args.push("OFF".to_string());
        }

        let (code, answer) = self.run(args).await?;
        if code != Some(0) {
            return Ok(None);
        }
        Ok(Some(parse_checklist_output(&answer)))
    }

    async fn choose_recovery(&self, title: &str, text: &str) -> Result<RecoveryChoice> {
        let options = [
            MenuOption::new("Continue", "Ignore the error and carry on"),
            MenuOption::new("Retry", "Run the same command again"),
            MenuOption::new("Abort", "Stop this operation"),
        ];

        Ok(match self.select(title, text, &options).await?.as_deref() {
            Some("Continue") => RecoveryChoice::Continue,
            Some("Retry") => RecoveryChoice::Retry,
            _ => RecoveryChoice::Abort,
        })
    }
}

/// Parse `--separate-output` checklist output (one tag per line).
fn parse_checklist_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|l| l.trim().trim_matches('"').to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
