//! Builder and runner for external commands.
//!
//! Everything PiNet does to the system goes through an external tool:
//! `apt-get`, `ltsp-chroot`, `ltsp-update-image`, `useradd`, `cp`. This
//! module provides [`ShellCommand`], a fluent builder that handles `sudo`,
//! running inside the chroot, optional timeouts, stdin and output capture, and maps a
//! non-zero exit status to [`PinetError::ProcessError`].
//!
//! Commands are executed through the [`CommandRunner`] trait so that
//! higher-level operations can be tested without touching the system.
//! [`SystemRunner`] is the real implementation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pinet_cli::shell::{CommandRunner, ShellCommand, SystemRunner};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let install = ShellCommand::new("apt-get")
//!     .args(["install", "-y", "epoptes-client"])
//!     .in_chroot("armhf")
//!     .with_context("epoptes");
//!
//! SystemRunner.run(install).await?;
//! # Ok(())
//! # }
//! ```

pub mod recovery;

pub use recovery::{ErrorPolicy, RunOutcome, run_with_recovery};

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::PinetError;

/// Builder for an external command.
///
/// New commands capture output, inherit the environment and run until they
/// exit. Chroot copies, image rebuilds and package installs can take hours on
/// SD-card storage, so a timeout is only set where a caller asks for one.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    stdin: Option<String>,
    capture_output: bool,
    timeout_duration: Option<Duration>,
    chroot_arch: Option<String>,
    sudo: bool,
    context: Option<String>,
}

impl ShellCommand {
    /// Start building a command that runs `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            stdin: None,
            capture_output: true,
            timeout_duration: None,
            chroot_arch: None,
            sudo: false,
            context: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for this command only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Feed `data` to the command's standard input.
    pub fn stdin_data(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Let the command write straight to the terminal.
    ///
    /// Used for long-running package installs so the operator sees progress.
    pub const fn inherit_stdio(mut self) -> Self {
        self.capture_output = false;
        self
    }

    /// Set a custom timeout (`None` for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Run inside the client chroot via `ltsp-chroot --arch <arch>`.
    pub fn in_chroot(mut self, arch: impl Into<String>) -> Self {
        self.chroot_arch = Some(arch.into());
        self
    }

    /// Prefix the command with `sudo` when `enabled`.
    pub const fn privileged(mut self, enabled: bool) -> Self {
        self.sudo = enabled;
        self
    }

    /// Label used in log messages (e.g. the package being installed).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The full argument vector after `ltsp-chroot` and `sudo` wrapping.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 5);
        if self.sudo {
            argv.push("sudo".to_string());
        }
        if let Some(arch) = &self.chroot_arch {
            argv.push("ltsp-chroot".to_string());
            argv.push("--arch".to_string());
            argv.push(arch.clone());
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Command line as a single string, for logs and error messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }

    /// The program, without `sudo` or chroot wrapping.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Data fed to standard input, if any.
    #[must_use]
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Timeout set with [`with_timeout`](Self::with_timeout), if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout_duration
    }

    /// Whether the command runs inside the chroot.
    #[must_use]
    pub const fn is_chroot(&self) -> bool {
        self.chroot_arch.is_some()
    }

    /// Execute and return the captured output.
    ///
    /// A non-zero exit status or a timeout becomes
    /// [`PinetError::ProcessError`]; failing to spawn the program at all is
    /// reported as an I/O error with context.
    pub async fn execute(self) -> Result<CommandOutput> {
        let start = std::time::Instant::now();
        let argv = self.argv();
        let command_line = argv.join(" ");

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        match self.context {
            Some(ref ctx) => tracing::debug!(target: "shell", "({}) Executing: {}", ctx, command_line),
            None => tracing::debug!(target: "shell", "Executing: {}", command_line),
        }

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "shell", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        if self.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }
        cmd.stdin(if self.stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().with_context(|| format!("Failed to start {}", argv[0]))?;

        if let Some(data) = self.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin
                .write_all(data.as_bytes())
                .await
                .with_context(|| format!("Failed to write stdin of {}", argv[0]))?;
            drop(stdin);
        }

        let output_future = child.wait_with_output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute {command_line}"))?
            } else {
                tracing::warn!(
                    target: "shell",
                    "Command timed out after {} seconds: {}",
                    duration.as_secs(),
                    command_line
                );
                return Err(PinetError::ProcessError {
                    command: command_line,
                    code: None,
                    stderr: format!("timed out after {} seconds", duration.as_secs()),
                }
                .into());
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute {command_line}"))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "shell",
                "Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "shell", "Error: {}", stderr.trim());
            }

            return Err(PinetError::ProcessError {
                command: command_line,
                code: output.status.code(),
                stderr: if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                },
            }
            .into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "shell", "{}", stdout.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "shell::perf", "{} took {:.2}s", argv[0], elapsed.as_secs_f64());
        }

        Ok(CommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute and return stdout trimmed.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// Output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Executes [`ShellCommand`]s.
pub trait CommandRunner: Send + Sync {
    /// Run `command`, returning its output or a [`PinetError::ProcessError`].
    fn run(&self, command: ShellCommand) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs commands on the local system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, command: ShellCommand) -> Result<CommandOutput> {
        command.execute().await
    }
}

/// Whether `program` can be found on `PATH`.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}
