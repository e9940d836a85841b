//! The `send-stats` command.

use anyhow::{Context, Result};
use clap::Args;

use super::{CommandEnv, CommandStatus};
use crate::dialog::Dialog;
use crate::stats::{StatsCollector, ask_extra_info, check_stats_notification};
use crate::upgrade::kernel::piboot_version_path;

/// Build and upload the anonymous usage report.
#[derive(Args)]
pub struct SendStatsCommand {
    /// Print the report as JSON instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Ask for the city and organisation details again first
    #[arg(long)]
    update_info: bool,
}

impl SendStatsCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        if env.interactive {
            let shown = check_stats_notification(env.ctx, env.dialog).await?;
            if self.update_info && !shown {
                ask_extra_info(env.ctx, env.dialog).await?;
            }
        }

        let collector = StatsCollector::new(env.ctx, piboot_version_path());
        if self.dry_run {
            let report = collector.build_report().await?;
            println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
        } else {
            collector.send().await?;
        }
        Ok(CommandStatus::Success)
    }
}
