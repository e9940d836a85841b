//! Chroot commands: `backup`, `restore` and `rebuild-image`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{CommandEnv, CommandStatus};
use crate::chroot::{BackupManager, DiskSpaceProbe, RebuildOutcome, rebuild_image, validate_backup_name};
use crate::context::PinetContext;
use crate::core::PinetError;
use crate::dialog::{Dialog, MenuOption};
use crate::shell::SystemRunner;
use crate::utils::spinner_with_message;

fn backup_manager<'a>(
    ctx: &PinetContext,
    runner: &'a SystemRunner,
    space: &'a DiskSpaceProbe<'a, SystemRunner>,
) -> BackupManager<'a, SystemRunner, DiskSpaceProbe<'a, SystemRunner>> {
    BackupManager::new(&ctx.settings.chroot_path, &ctx.settings.backup_root, runner, space)
        .threshold_kb(ctx.settings.space_threshold_kb)
        .use_sudo(ctx.settings.use_sudo)
}

/// Ask for a backup name until a valid one is given.
async fn prompt_backup_name<D: Dialog>(dialog: &D) -> Result<String> {
    loop {
        let Some(name) = dialog
            .prompt("Backup name", "Enter a name for the backup. Spaces are not allowed.")
            .await?
        else {
            return Err(PinetError::Cancelled.into());
        };

        match validate_backup_name(&name) {
            Ok(()) => return Ok(name),
            Err(e) => {
                tracing::warn!("{}", e);
                dialog.message("Invalid name", &e.to_string()).await?;
            }
        }
    }
}

/// Offer to back up anyway after a failed space check.
///
/// Returns the original error unless it is a [`PinetError::SpaceError`] and
/// the operator accepts the override.
async fn confirm_space_override<D: Dialog>(dialog: &D, interactive: bool, error: anyhow::Error) -> Result<()> {
    let Some(&PinetError::SpaceError {
        required,
        available,
    }) = error.downcast_ref::<PinetError>()
    else {
        return Err(error);
    };
    if !interactive {
        return Err(error);
    }

    tracing::warn!("{}", error);
    let text = format!(
        "There is not enough free space for a safe backup: {available} KB free, {required} KB needed. Backing up anyway may fill the disk. Continue?"
    );
    if dialog.confirm_with("Insufficient space", &text, "Back up anyway", "Cancel").await? {
        tracing::info!("Backing up despite low disk space");
        Ok(())
    } else {
        Err(error)
    }
}

/// Back up the client chroot.
#[derive(Args)]
pub struct BackupCommand {
    /// Backup name (prompted for if omitted)
    #[arg(long)]
    name: Option<String>,

    /// Back up even if less than the safety margin of disk space would remain
    #[arg(long)]
    override_space: bool,
}

impl BackupCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let runner = SystemRunner;
        let space = DiskSpaceProbe::new(&runner, env.ctx.settings.use_sudo);
        let manager = backup_manager(env.ctx, &runner, &space);

        let mut override_space = self.override_space;
        if let Err(e) = manager.check_space(override_space).await {
            confirm_space_override(env.dialog, env.interactive, e).await?;
            override_space = true;
        }

        let name = match self.name {
            Some(name) => name,
            None => prompt_backup_name(env.dialog).await?,
        };

        let spinner = spinner_with_message(format!("Backing up the chroot to '{name}'"));
        let result = manager.backup(&name, override_space).await;
        spinner.finish_and_clear();
        let record = result?;

        println!("{} Backup '{}' saved to {}", "✓".green(), record.name, record.path.display());
        Ok(CommandStatus::Success)
    }
}

/// Restore the client chroot from a backup.
#[derive(Args)]
pub struct RestoreCommand {
    /// Backup to restore (chosen from a menu if omitted)
    #[arg(long)]
    name: Option<String>,
}

impl RestoreCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        let runner = SystemRunner;
        let space = DiskSpaceProbe::new(&runner, env.ctx.settings.use_sudo);
        let manager = backup_manager(env.ctx, &runner, &space);

        let backups = manager.require_backups().await?;
        let name = match self.name {
            Some(name) => name,
            None => {
                let options: Vec<MenuOption> = backups.iter().map(MenuOption::tag_only).collect();
                env.dialog
                    .select("Restore", "Select the backup to restore", &options)
                    .await?
                    .ok_or(PinetError::Cancelled)?
            }
        };

        manager.validate(&name).await?;

        let text = format!(
            "Restoring '{name}' replaces the current Raspberry Pi operating system with the backup. Anything changed since the backup was taken will be lost. Continue?"
        );
        if !env.dialog.confirm("Are you sure?", &text).await? {
            println!("Restore cancelled");
            return Ok(CommandStatus::Success);
        }

        let spinner = spinner_with_message(format!("Restoring backup '{name}'"));
        let result = manager.restore(&name).await;
        spinner.finish_and_clear();
        result?;
        println!("{} Restored backup '{}'", "✓".green(), name);

        rebuild_image(env.ctx, &runner, env.dialog).await?;
        Ok(CommandStatus::Signal)
    }
}

/// Rebuild the NBD image.
#[derive(Args)]
pub struct RebuildImageCommand {
    /// Only rebuild if the chroot changed since the last rebuild
    #[arg(long)]
    if_needed: bool,
}

impl RebuildImageCommand {
    pub async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        if self.if_needed && !env.ctx.store.get_flag("NBDBuildNeeded").await? {
            println!("The NBD image is up to date");
            return Ok(CommandStatus::Success);
        }

        match rebuild_image(env.ctx, &SystemRunner, env.dialog).await? {
            RebuildOutcome::Rebuilt => println!("{} NBD image rebuilt", "✓".green()),
            RebuildOutcome::NotUsingNbd => println!("This server does not use NBD, nothing to rebuild"),
            RebuildOutcome::AutoCompressionDisabled => {}
            RebuildOutcome::Failed => println!("{}", "NBD image rebuild failed".red()),
        }
        Ok(CommandStatus::Success)
    }
}
