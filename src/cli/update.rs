//! Update commands: `check-update`, `changelog`, `compare-version` and
//! `kernel-check`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CommandEnv, CommandStatus};
use crate::context::PinetContext;
use crate::core::PinetError;
use crate::dialog::Dialog;
use crate::shell::SystemRunner;
use crate::stats::{StatsCollector, check_stats_notification};
use crate::upgrade::kernel::{boot_files_update_available, piboot_version_path, update_kernel_checker};
use crate::upgrade::{
    FeedSource, HttpFetcher, HttpProbe, ReleaseFeed, UpdateDecision, UpdateFlow, UpdateOutcome, check_for_update,
    installed_version, release_artifacts, render_changelog,
};
use crate::version::is_newer;

async fn local_version(ctx: &PinetContext, explicit: Option<String>) -> Result<String> {
    if let Some(version) = explicit {
        return Ok(version);
    }
    Ok(installed_version(&ctx.settings.install_dir)
        .await?
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()))
}

fn release_feed(ctx: &PinetContext) -> Result<ReleaseFeed> {
    Ok(ReleaseFeed::new(ctx.http_client()?, ctx.settings.feed_url(ctx.branch())))
}

/// Check for a newer release and offer to install it.
#[derive(Args)]
pub struct CheckUpdateCommand {
    /// Version to compare against (defaults to the installed pinet script)
    #[arg(long)]
    current_version: Option<String>,

    /// Only report whether an update exists; exits 10 if it does
    #[arg(long)]
    check_only: bool,

    /// Do not upload usage statistics
    #[arg(long)]
    no_stats: bool,
}

impl CheckUpdateCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let ctx = env.ctx;
        let local = local_version(ctx, self.current_version).await?;
        let client = ctx.http_client()?;
        let probe = HttpProbe::new(client.clone());
        let feed = release_feed(ctx)?;

        if self.check_only {
            return match check_for_update(&probe, &feed, &local).await? {
                UpdateDecision::NoConnection => {
                    println!("{}", "No internet connection, skipping the update check".yellow());
                    Ok(CommandStatus::Success)
                }
                UpdateDecision::UpToDate => {
                    println!("PiNet {local} is up to date");
                    Ok(CommandStatus::Success)
                }
                UpdateDecision::UpdateAvailable {
                    latest,
                } => {
                    println!("PiNet {} is available (installed {local})", latest.green());
                    Ok(CommandStatus::Signal)
                }
            };
        }

        if env.interactive && !self.no_stats {
            check_stats_notification(ctx, env.dialog).await?;
        }

        let fetcher = HttpFetcher::new(client);
        let flow = UpdateFlow {
            probe: &probe,
            feed: &feed,
            dialog: env.dialog,
            fetcher: &fetcher,
            artifacts: release_artifacts(&ctx.settings, ctx.branch()),
            changelog_max_entries: ctx.settings.changelog_max_entries,
        };
        let outcome = flow.run(&local).await?;

        if !self.no_stats && outcome != UpdateOutcome::NoConnection {
            StatsCollector::new(ctx, piboot_version_path()).send_or_log().await;
        }

        match outcome {
            UpdateOutcome::UpToDate => Ok(CommandStatus::Success),
            UpdateOutcome::NoConnection => {
                println!("{}", "No internet connection, skipping the update check".yellow());
                Ok(CommandStatus::Success)
            }
            UpdateOutcome::Installed | UpdateOutcome::Declined => Ok(CommandStatus::Signal),
            UpdateOutcome::Failed => Err(PinetError::NetworkError {
                operation: "installing the update".to_string(),
                reason: "one or more files failed to download".to_string(),
            }
            .into()),
        }
    }
}

/// Print the release history.
#[derive(Args)]
pub struct ChangelogCommand {
    /// Stop at this version (defaults to the installed version)
    #[arg(long)]
    since: Option<String>,

    /// Number of feed entries to examine
    #[arg(long)]
    max_entries: Option<usize>,
}

impl ChangelogCommand {
    pub async fn execute(self, ctx: &PinetContext) -> Result<CommandStatus> {
        let since = local_version(ctx, self.since).await?;
        let max_entries = self.max_entries.unwrap_or(ctx.settings.changelog_max_entries);

        let entries = release_feed(ctx)?.changelog_since(&since, max_entries).await?;
        if entries.is_empty() {
            println!("No releases since {since}");
        } else {
            println!("{}", format!("Release history since {since}").bold());
            print!("{}", render_changelog(&entries));
        }
        Ok(CommandStatus::Success)
    }
}

/// Compare two versions.
#[derive(Args)]
pub struct CompareVersionCommand {
    /// The installed version
    local: String,

    /// The version offered by the release feed
    web: String,
}

impl CompareVersionCommand {
    pub fn execute(self) -> Result<CommandStatus> {
        if is_newer(&self.local, &self.web)? {
            println!("{} is newer than {}", self.web, self.local);
            Ok(CommandStatus::Signal)
        } else {
            println!("{} is not newer than {}", self.web, self.local);
            Ok(CommandStatus::Success)
        }
    }
}

/// Check the Raspberry Pi boot files and the kernel check script.
#[derive(Args)]
pub struct KernelCheckCommand {
    /// Skip refreshing the kernel check script in the chroot
    #[arg(long)]
    skip_script: bool,
}

impl KernelCheckCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let ctx = env.ctx;
        let fetcher = HttpFetcher::new(ctx.http_client()?);

        if !self.skip_script && update_kernel_checker(ctx, &fetcher, &SystemRunner).await? {
            println!("Kernel check script updated");
        }

        if boot_files_update_available(ctx, &fetcher, piboot_version_path().as_deref()).await? {
            env.dialog
                .message(
                    "Boot files update",
                    "A newer version of the Raspberry Pi boot files is available. Update the SD card boot files from the PiBoot folder.",
                )
                .await?;
            return Ok(CommandStatus::Signal);
        }

        println!("Boot files are up to date");
        Ok(CommandStatus::Success)
    }
}
