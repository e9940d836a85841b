//! The `network-report` command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CommandEnv, CommandStatus};
use crate::core::PinetError;
use crate::dialog::Dialog;
use crate::upgrade::connectivity::{StatusVerdict, evaluate_report, render_report};
use crate::upgrade::{ConnectivityProbe, HttpProbe, full_status_check, full_status_report};
use crate::utils::spinner_with_message;

/// Check every site PiNet depends on.
#[derive(Args)]
pub struct NetworkReportCommand {
    /// Ask whether to carry on when optional sites are unreachable; exits 1 if not
    #[arg(long)]
    check: bool,

    /// Only run the quick internet check
    #[arg(long, conflicts_with = "check")]
    quick: bool,
}

impl NetworkReportCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let probe = HttpProbe::new(env.ctx.http_client()?);

        if self.quick {
            return if probe.is_online().await {
                println!("{}", "Online".green());
                Ok(CommandStatus::Success)
            } else {
                Err(offline_error("no probe host answered"))
            };
        }

        if self.check {
            return if full_status_check(&probe, env.dialog).await? {
                Ok(CommandStatus::Success)
            } else {
                Err(PinetError::Cancelled.into())
            };
        }

        let spinner = spinner_with_message("Checking sites");
        let report = full_status_report(&probe).await;
        spinner.finish_and_clear();

        println!("{}", render_report(&report));
        match evaluate_report(&report) {
            StatusVerdict::AllReachable => {
                println!("{}", "All sites reachable".green());
                Ok(CommandStatus::Success)
            }
            StatusVerdict::Degraded(sites) => {
                println!("{}", format!("{} optional site(s) unreachable", sites.len()).yellow());
                Ok(CommandStatus::Success)
            }
            StatusVerdict::Blocked(sites) => {
                let names: Vec<&str> = sites.iter().map(|s| s.name).collect();
                Err(offline_error(&format!("unreachable: {}", names.join(", "))))
            }
        }
    }
}

fn offline_error(reason: &str) -> anyhow::Error {
    PinetError::NetworkError {
        operation: "checking connectivity".to_string(),
        reason: reason.to_string(),
    }
    .into()
}
