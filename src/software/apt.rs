//! Package installation with apt and pip.

use anyhow::Result;
use std::future::Future;

use crate::context::PinetContext;
use crate::dialog::Dialog;
use crate::shell::{CommandRunner, ErrorPolicy, ShellCommand, run_with_recovery};

/// Installs packages on the server or into the chroot.
pub trait PackageManager: Send + Sync {
    /// Install `names` with `extra_flags`. Returns whether the install succeeded.
    fn install(
        &self,
        names: &[String],
        on_server: bool,
        extra_flags: &[String],
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// apt and pip through a [`CommandRunner`], with continue/retry/abort on
/// failure.
pub struct AptPackageManager<'a, R, D> {
    ctx: &'a PinetContext,
    runner: &'a R,
    dialog: &'a D,
}

impl<'a, R, D> AptPackageManager<'a, R, D>
where
    R: CommandRunner,
    D: Dialog,
{
    pub const fn new(ctx: &'a PinetContext, runner: &'a R, dialog: &'a D) -> Self {
        Self {
            ctx,
            runner,
            dialog,
        }
    }

    fn command(&self, program: &str, on_server: bool) -> ShellCommand {
        if on_server { self.ctx.host_command(program) } else { self.ctx.chroot_command(program) }
    }

    /// Run a command under the recovery policy, returning whether it succeeded.
    pub async fn run(&self, command: ShellCommand, policy: ErrorPolicy) -> Result<bool> {
        Ok(run_with_recovery(self.runner, self.dialog, command, policy).await?.succeeded())
    }

    /// Refresh the chroot's package lists.
    pub async fn update_chroot(&self) -> Result<bool> {
        let command = self.ctx.chroot_command("apt-get").arg("update").inherit_stdio().with_context("apt update");
        self.run(command, ErrorPolicy::Ask).await
    }

    /// `pip install -U` then `pip3 install -U`. Both are attempted; the
    /// result is whether both succeeded.
    pub async fn pip_install(&self, names: &[String], on_server: bool) -> Result<bool> {
        let mut all = true;
        for pip in ["pip", "pip3"] {
            let command = self
                .command(pip, on_server)
                .args(["install", "-U"])
                .args(names.iter().cloned())
                .inherit_stdio()
                .with_context(names.join(" "));
            all &= self.run(command, ErrorPolicy::Ask).await?;
        }
        Ok(all)
    }
}

impl<R, D> PackageManager for AptPackageManager<'_, R, D>
where
    R: CommandRunner,
    D: Dialog,
{
    async fn install(&self, names: &[String], on_server: bool, extra_flags: &[String]) -> Result<bool> {
        let where_to = if on_server { "server" } else { "chroot" };
        tracing::info!("Installing {} on the {}", names.join(" "), where_to);

        let command = self
            .command("apt-get", on_server)
            .args(["install", "-y"])
            .args(extra_flags.iter().cloned())
            .args(names.iter().cloned())
            .inherit_stdio()
            .with_context(names.join(" "));
        self.run(command, ErrorPolicy::Ask).await
    }
}
