//! Command-line interface for PiNet.
//!
//! Each operation is a subcommand implemented in its own module with its own
//! argument struct and `execute` method.
//!
//! # Available Commands
//!
//! ## Updates
//! - `check-update` - Check the release feed and offer to install a newer PiNet
//! - `changelog` - Print the release history since a version
//! - `compare-version` - Compare two version strings
//! - `kernel-check` - Check for newer boot files and refresh the kernel check script
//!
//! ## Chroot
//! - `backup` - Copy the client chroot to a named backup
//! - `restore` - Replace the client chroot with a backup
//! - `rebuild-image` - Rebuild the NBD image from the chroot
//!
//! ## Classroom
//! - `install-software` - Install extra software on the Raspberry Pis
//! - `import-users` / `delete-users` - Batch account management from a CSV file
//!
//! ## Server
//! - `config` - Read and write `/etc/pinet`
//! - `network-report` - Check every site PiNet needs
//! - `send-stats` - Upload the anonymous usage report
//!
//! # Exit Status
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success, nothing further to do |
//! | 1 | Error |
//! | 2 | Usage error |
//! | 10 | Update available or installed, update declined, or restore performed |
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - Console log level
//! - `--settings <path>` - Settings file (otherwise `PINET_SETTINGS`, then `/etc/pinet.toml`)
//! - `--no-progress` - Disable spinners
//! - `--yes` - Run without whiptail, accepting confirmations

mod chroot;
mod config;
mod network;
mod software;
mod stats;
mod update;
mod users;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;
use crate::context::PinetContext;
use crate::dialog::{AssumeYesDialog, Dialog, WhiptailDialog};
use crate::logging::{self, Verbosity};
use crate::utils::disable_progress;

/// Exit status signalled to the calling menu script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Exit 0
    Success,
    /// Exit 10: something happened the caller should act on
    Signal,
}

impl CommandStatus {
    /// Process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Signal => 10,
        }
    }
}

/// Dependencies handed to every interactive command.
pub struct CommandEnv<'a, D> {
    /// Settings and config store
    pub ctx: &'a PinetContext,
    /// Operator dialogs
    pub dialog: &'a D,
    /// Whether a human answers the dialogs
    pub interactive: bool,
}

/// Top-level command-line interface.
#[derive(Parser)]
#[command(
    name = "pinet",
    about = "PiNet - configure and maintain an LTSP network of Raspberry Pi thin clients",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the PiNet settings file
    #[arg(long, global = true, env = "PINET_SETTINGS")]
    settings: Option<PathBuf>,

    /// Disable spinners and progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Do not open whiptail dialogs; accept every confirmation
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check for a newer PiNet release and offer to install it
    CheckUpdate(update::CheckUpdateCommand),

    /// Print the release history since a version
    Changelog(update::ChangelogCommand),

    /// Compare two versions; exits 10 if the second is newer
    CompareVersion(update::CompareVersionCommand),

    /// Check for newer boot files and update the kernel check script
    KernelCheck(update::KernelCheckCommand),

    /// Back up the client chroot
    Backup(chroot::BackupCommand),

    /// Restore the client chroot from a backup
    Restore(chroot::RestoreCommand),

    /// Rebuild the NBD image from the chroot
    RebuildImage(chroot::RebuildImageCommand),

    /// Read or write values in /etc/pinet
    Config(config::ConfigCommand),

    /// Install extra software for the Raspberry Pis
    InstallSoftware(software::InstallSoftwareCommand),

    /// Create accounts from a CSV file
    ImportUsers(users::ImportUsersCommand),

    /// Delete accounts listed in a CSV file
    DeleteUsers(users::DeleteUsersCommand),

    /// Upload the anonymous usage report
    SendStats(stats::SendStatsCommand),

    /// Check that every site PiNet needs is reachable
    NetworkReport(network::NetworkReportCommand),
}

impl Cli {
    /// Run the selected subcommand.
    pub async fn execute(self) -> Result<CommandStatus> {
        if self.no_progress {
            disable_progress();
        }

        let settings = Settings::load(self.settings.as_deref()).await?;
        if let Err(e) = logging::init(Verbosity::from_flags(self.verbose, self.quiet), &settings.log_file) {
            eprintln!("Logging unavailable: {e:#}");
        }

        let command = match self.command {
            Commands::CompareVersion(cmd) => return cmd.execute(),
            other => other,
        };

        let ctx = PinetContext::build(settings).await?;
        match command {
            Commands::Config(cmd) => cmd.execute(&ctx).await,
            Commands::Changelog(cmd) => cmd.execute(&ctx).await,
            interactive if self.yes => {
                let env = CommandEnv {
                    ctx: &ctx,
                    dialog: &AssumeYesDialog,
                    interactive: false,
                };
                interactive.execute(&env).await
            }
            interactive => {
                let dialog = WhiptailDialog::new()?;
                let env = CommandEnv {
                    ctx: &ctx,
                    dialog: &dialog,
                    interactive: true,
                };
                interactive.execute(&env).await
            }
        }
    }
}

impl Commands {
    async fn execute<D: Dialog>(self, env: &CommandEnv<'_, D>) -> Result<CommandStatus> {
        match self {
            Self::CheckUpdate(cmd) => cmd.execute(env).await,
            Self::KernelCheck(cmd) => cmd.execute(env).await,
            Self::Backup(cmd) => cmd.execute(env).await,
            Self::Restore(cmd) => cmd.execute(env).await,
            Self::RebuildImage(cmd) => cmd.execute(env).await,
            Self::InstallSoftware(cmd) => cmd.execute(env).await,
            Self::ImportUsers(cmd) => cmd.execute(env).await,
            Self::DeleteUsers(cmd) => cmd.execute(env).await,
            Self::SendStats(cmd) => cmd.execute(env).await,
            Self::NetworkReport(cmd) => cmd.execute(env).await,
            Self::Config(cmd) => cmd.execute(env.ctx).await,
            Self::Changelog(cmd) => cmd.execute(env.ctx).await,
            Self::CompareVersion(cmd) => cmd.execute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CommandStatus::Success.code(), 0);
        assert_eq!(CommandStatus::Signal.code(), 10);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pinet", "backup", "--name", "weekly", "--yes", "--no-progress"]).unwrap();
        assert!(cli.yes);
        assert!(cli.no_progress);
        assert!(matches!(cli.command, Commands::Backup(_)));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["pinet", "-v", "-q", "changelog"]).is_err());
    }
}
