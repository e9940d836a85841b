//! Continue / retry / abort handling for failed commands.
//!
//! When an external command fails the failure is logged first, then the
//! operator decides what happens next through
//! [`Dialog::choose_recovery`]. Call sites that expect failures (probing
//! for an optional package, for instance) pass [`ErrorPolicy::Ignore`] to
//! log and move on without asking.

use anyhow::Result;

use super::{CommandOutput, CommandRunner, ShellCommand};
use crate::core::PinetError;
use crate::dialog::{Dialog, RecoveryChoice};

/// How a failing command is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Ask the operator to continue, retry or abort
    #[default]
    Ask,
    /// Log the failure and continue silently
    Ignore,
}

/// Result of a command run under a recovery policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The command succeeded (possibly after retries)
    Succeeded(CommandOutput),
    /// The command failed and the failure was ignored
    Skipped,
}

impl RunOutcome {
    /// Whether the command actually succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Run `command`, applying `policy` when it fails with a
/// [`PinetError::ProcessError`].
///
/// Other errors (the program could not be started at all) are returned
/// unchanged. An abort returns the original process error.
pub async fn run_with_recovery<R, D>(
    runner: &R,
    dialog: &D,
    command: ShellCommand,
    policy: ErrorPolicy,
) -> Result<RunOutcome>
where
    R: CommandRunner,
    D: Dialog,
{
    let mut attempt = 1u32;
    loop {
        let error = match runner.run(command.clone()).await {
            Ok(output) => return Ok(RunOutcome::Succeeded(output)),
            Err(error) => error,
        };

        let command_line = match error.downcast_ref::<PinetError>() {
            Some(PinetError::ProcessError {
                command,
                ..
            }) => command.clone(),
            _ => return Err(error),
        };

        tracing::warn!("Command failed (attempt {}): {}", attempt, error);

        if policy == ErrorPolicy::Ignore {
            return Ok(RunOutcome::Skipped);
        }

        let text = format!(
            "The following command failed:\n\n{command_line}\n\nContinue ignores the error, Retry runs the command again and Abort stops."
        );
        match dialog.choose_recovery("Command failed", &text).await? {
            RecoveryChoice::Continue => {
                tracing::info!("Continuing after failure of: {}", command_line);
                return Ok(RunOutcome::Skipped);
            }
            RecoveryChoice::Retry => {
                attempt += 1;
                tracing::info!("Retrying: {}", command_line);
            }
            RecoveryChoice::Abort => return Err(error),
        }
    }
}
