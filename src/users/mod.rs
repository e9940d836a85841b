//! Batch creation and deletion of pupil accounts from a CSV file.
//!
//! The file has one account per line: `username[,password]`. A missing or
//! empty password falls back to the default given by the operator. User
//! names may not contain spaces.

use anyhow::{Context, Result};
use std::path::Path;

use crate::constants::USER_GROUPS;
use crate::context::PinetContext;
use crate::core::PinetError;
use crate::dialog::Dialog;
use crate::shell::{CommandRunner, ErrorPolicy, run_with_recovery};

/// One account from the CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub password: String,
}

/// How a batch operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The operation succeeded for this many accounts. Accounts skipped
    /// after a failed command are not counted.
    Completed(usize),
    /// Only the summary was shown
    DryRun,
    /// The operator cancelled at the summary
    Declined,
}

/// Parse CSV content into records.
pub fn parse_users(content: &str, default_password: &str) -> Result<Vec<UserRecord>, PinetError> {
    let mut records = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let name = fields.next().unwrap_or_default().trim_start();
        if name.is_empty() {
            return Err(PinetError::ValidationError {
                field: format!("line {}", index + 1),
                reason: "the user name column is empty".to_string(),
            });
        }
        if name.contains(char::is_whitespace) {
            return Err(PinetError::ValidationError {
                field: format!("line {}", index + 1),
                reason: format!("user name '{name}' contains spaces, which isn't supported"),
            });
        }

        let password = match fields.next().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => default_password.to_string(),
        };

        records.push(UserRecord {
            name: name.to_string(),
            password,
        });
    }

    Ok(records)
}

/// Read and parse a CSV file.
pub async fn load_users(path: &Path, default_password: &str) -> Result<Vec<UserRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("CSV file not found at {}", path.display()))?;
    Ok(parse_users(&content, default_password)?)
}

fn import_summary(records: &[UserRecord]) -> String {
    records.iter().map(|r| format!("Username - {} : Password - {}\n", r.name, r.password)).collect()
}

fn delete_summary(records: &[UserRecord]) -> String {
    records.iter().map(|r| format!("Username - {}\n", r.name)).collect()
}

fn percent(done: usize, total: usize) -> usize {
    done * 100 / total.max(1)
}

/// Create every account in `records`.
pub async fn import_users<R, D>(
    ctx: &PinetContext,
    runner: &R,
    dialog: &D,
    records: &[UserRecord],
    dry_run: bool,
) -> Result<BatchOutcome>
where
    R: CommandRunner,
    D: Dialog,
{
    let title = "About to import (Use arrow keys to scroll)";
    let summary = import_summary(records);

    if dry_run {
        dialog.message(title, &summary).await?;
        return Ok(BatchOutcome::DryRun);
    }
    if !dialog.confirm_with(title, &summary, "Import", "Cancel").await? {
        return Ok(BatchOutcome::Declined);
    }

    let mut imported = 0;
    for (index, record) in records.iter().enumerate() {
        let useradd = ctx.host_command("useradd").args(["-m", "-s", "/bin/bash"]).arg(&record.name);
        if !run_with_recovery(runner, dialog, useradd, ErrorPolicy::Ask).await?.succeeded() {
            tracing::warn!("Skipped user {}", record.name);
            continue;
        }

        let chpasswd = ctx
            .host_command("chpasswd")
            .stdin_data(format!("{}:{}\n", record.name, record.password))
            .with_context(record.name.clone());
        run_with_recovery(runner, dialog, chpasswd, ErrorPolicy::Ask).await?;

        for group in USER_GROUPS {
            let usermod = ctx.host_command("usermod").args(["-a", "-G", *group]).arg(&record.name);
            run_with_recovery(runner, dialog, usermod, ErrorPolicy::Ignore).await?;
        }

        imported += 1;
        println!("{}% - Import of {} complete.", percent(index + 1, records.len()), record.name);
        tracing::info!("Imported user {}", record.name);
    }

    dialog.message("Complete", "Importing of CSV data has been complete.").await?;
    Ok(BatchOutcome::Completed(imported))
}

/// Delete every account in `records`, including home directories.
pub async fn delete_users<R, D>(
    ctx: &PinetContext,
    runner: &R,
    dialog: &D,
    records: &[UserRecord],
    dry_run: bool,
) -> Result<BatchOutcome>
where
    R: CommandRunner,
    D: Dialog,
{
    let title = "About to attempt to delete (Use arrow keys to scroll)";
    let summary = delete_summary(records);

    if dry_run {
        dialog.message(title, &summary).await?;
        return Ok(BatchOutcome::DryRun);
    }
    if !dialog.confirm_with(title, &summary, "Delete", "Cancel").await? {
        return Ok(BatchOutcome::Declined);
    }

    let mut deleted = 0;
    for (index, record) in records.iter().enumerate() {
        let userdel = ctx.host_command("userdel").args(["-r", "-f"]).arg(&record.name);
        if !run_with_recovery(runner, dialog, userdel, ErrorPolicy::Ask).await?.succeeded() {
            tracing::warn!("Skipped user {}", record.name);
            continue;
        }
        deleted += 1;
        println!("{}% - Delete of {} complete.", percent(index + 1, records.len()), record.name);
        tracing::info!("Deleted user {}", record.name);
    }

    dialog.message("Complete", "Delete of users from CSV file complete").await?;
    Ok(BatchOutcome::Completed(deleted))
}
