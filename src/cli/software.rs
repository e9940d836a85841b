//! The `install-software` command.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::{CommandEnv, CommandStatus};
use crate::core::PinetError;
use crate::dialog::Dialog;
use crate::shell::SystemRunner;
use crate::software::{SoftwareInstaller, choose_packages, find_packages};
use crate::upgrade::HttpFetcher;

/// Install extra software for the Raspberry Pis.
#[derive(Args)]
pub struct InstallSoftwareCommand {
    /// Catalog items to install, e.g. Epoptes Arduino-IDE (chosen from a checklist if omitted)
    packages: Vec<String>,
}

impl InstallSoftwareCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let packages = if !self.packages.is_empty() {
            find_packages(&self.packages)?
        } else if env.interactive {
            match choose_packages(env.dialog).await? {
                Some(packages) => packages,
                None => return Err(PinetError::Cancelled.into()),
            }
        } else {
            return Err(PinetError::ValidationError {
                field: "software".to_string(),
                reason: "name the packages to install when running with --yes".to_string(),
            }
            .into());
        };

        if packages.is_empty() {
            println!("No additional software selected");
            return Ok(CommandStatus::Success);
        }

        let fetcher = HttpFetcher::new(env.ctx.http_client()?);
        let summary = SoftwareInstaller::new(env.ctx, &SystemRunner, env.dialog, &fetcher)
            .install_packages(&packages)
            .await?;

        for name in &summary.installed {
            println!("{} {}", "✓".green(), name);
        }
        for name in &summary.skipped {
            println!("{} {} (skipped)", "-".yellow(), name);
        }
        if !summary.failed.is_empty() {
            bail!("Failed to install: {}", summary.failed.join(", "));
        }
        Ok(CommandStatus::Success)
    }
}
