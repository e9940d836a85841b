//! The `import-users` and `delete-users` commands.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::{CommandEnv, CommandStatus};
use crate::dialog::Dialog;
use crate::shell::SystemRunner;
use crate::users::{BatchOutcome, delete_users, import_users, load_users};

/// Create accounts from a CSV file of `username[,password]` lines.
#[derive(Args)]
pub struct ImportUsersCommand {
    /// CSV file to read
    file: PathBuf,

    /// Password for lines without one
    #[arg(long, default_value = "raspberry")]
    default_password: String,

    /// Only show what would be imported
    #[arg(long)]
    dry_run: bool,
}

impl ImportUsersCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let records = load_users(&self.file, &self.default_password).await?;
        let outcome = import_users(env.ctx, &SystemRunner, env.dialog, &records, self.dry_run).await?;
        report(outcome, "imported");
        Ok(CommandStatus::Success)
    }
}

/// Delete the accounts listed in a CSV file, home directories included.
#[derive(Args)]
pub struct DeleteUsersCommand {
    /// CSV file to read
    file: PathBuf,

    /// Only show what would be deleted
    #[arg(long)]
    dry_run: bool,
}

impl DeleteUsersCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let records = load_users(&self.file, "").await?;
        let outcome = delete_users(env.ctx, &SystemRunner, env.dialog, &records, self.dry_run).await?;
        report(outcome, "deleted");
        Ok(CommandStatus::Success)
    }
}

fn report(outcome: BatchOutcome, verb: &str) {
    match outcome {
        BatchOutcome::Completed(count) => println!("{count} account(s) {verb}"),
        BatchOutcome::DryRun => println!("Dry run, nothing {verb}"),
        BatchOutcome::Declined => println!("Cancelled, nothing {verb}"),
    }
}
