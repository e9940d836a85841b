//! Running install strategies.

use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;

use super::apt::{AptPackageManager, PackageManager};
use super::catalog::SoftwarePackage;
use super::InstallStrategy;
use crate::chroot::{ChrootLock, RebuildOutcome, mark_rebuild_needed, rebuild_image};
use crate::config::ConfigStore;
use crate::constants::{EPOPTES_DEFAULTS_FILE, SCRATCH_GPIO_INSTALLER_URL, SKEL_DIR};
use crate::context::PinetContext;
use crate::dialog::Dialog;
use crate::shell::{CommandRunner, ErrorPolicy};
use crate::upgrade::fetch::{Fetcher, download_to};

const SCRATCH_GPIO_SCRIPT: &str = "usr/local/bin/isgh7.sh";
const SCRATCH_SUDO_WRAPPER: &str = "usr/local/bin/scratchSudo.sh";
const SCRATCH_WRAPPER_LINE: &str = "bash /usr/local/bin/isgh7.sh $SUDO_USER";
const SCRATCH_DESKTOP_FILE: &str = "Install-scratchGPIO.desktop";
const SCRATCH_DESKTOP_ENTRY: &str = "[Desktop Entry]
Version=1.0
Name=Install ScratchGPIO
Comment=Install ScratchGPIO
Exec=sudo bash /usr/local/bin/scratchSudo.sh
Icon=scratch
Terminal=true
Type=Application
Categories=Utility;Application;
";

/// Server paths the installer writes to outside the chroot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPaths {
    /// Epoptes server defaults
    pub epoptes_defaults: PathBuf,
    /// Home directory skeleton
    pub skel_dir: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            epoptes_defaults: PathBuf::from(EPOPTES_DEFAULTS_FILE),
            skel_dir: PathBuf::from(SKEL_DIR),
        }
    }
}

/// What an install run did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstallSummary {
    /// Packages installed successfully
    pub installed: Vec<String>,
    /// Packages whose install failed and was continued past
    pub failed: Vec<String>,
    /// Custom packages the operator cancelled
    pub skipped: Vec<String>,
    /// Image rebuild result, if a rebuild was attempted
    pub rebuild: Option<RebuildOutcome>,
}

/// Installs catalog items into the chroot and onto the server.
pub struct SoftwareInstaller<'a, R, D, F> {
    ctx: &'a PinetContext,
    runner: &'a R,
    dialog: &'a D,
    fetcher: &'a F,
    paths: SystemPaths,
}

impl<'a, R, D, F> SoftwareInstaller<'a, R, D, F>
where
    R: CommandRunner,
    D: Dialog,
    F: Fetcher,
{
    pub fn new(ctx: &'a PinetContext, runner: &'a R, dialog: &'a D, fetcher: &'a F) -> Self {
        Self {
            ctx,
            runner,
            dialog,
            fetcher,
            paths: SystemPaths::default(),
        }
    }

    /// Write server files under `paths` instead of the system locations.
    #[must_use]
    pub fn with_paths(mut self, paths: SystemPaths) -> Self {
        self.paths = paths;
        self
    }

    fn apt(&self) -> AptPackageManager<'a, R, D> {
        AptPackageManager::new(self.ctx, self.runner, self.dialog)
    }

    /// Install `packages`.
    ///
    /// Custom packages are named first, so every question is asked before
    /// the long-running installs start. The chroot package lists are
    /// refreshed once before the first install, and the image is rebuilt
    /// once at the end if anything was attempted.
    pub async fn install_packages(&self, packages: &[SoftwarePackage]) -> Result<InstallSummary> {
        let mut summary = InstallSummary::default();

        let mut resolved = Vec::with_capacity(packages.len());
        for package in packages {
            match self.resolve(&package.strategy).await? {
                Some(strategy) => resolved.push((package.name.clone(), strategy)),
                None => summary.skipped.push(package.name.clone()),
            }
        }

        if resolved.is_empty() {
            return Ok(summary);
        }

        let _lock = ChrootLock::global(&self.ctx.settings.backup_root).await?;

        self.apt().update_chroot().await?;
        for (name, strategy) in &resolved {
            println!("Installing {name}");
            mark_rebuild_needed(self.ctx).await?;

            if self.install_resolved(strategy).await? {
                summary.installed.push(name.clone());
            } else {
                summary.failed.push(name.clone());
            }
        }

        summary.rebuild = Some(rebuild_image(self.ctx, self.runner, self.dialog).await?);
        Ok(summary)
    }

    /// Turn a custom strategy into a concrete one by asking for the package
    /// name. `None` means the operator cancelled.
    pub async fn resolve(&self, strategy: &InstallStrategy) -> Result<Option<InstallStrategy>> {
        let (title, text, kind) = match strategy {
            InstallStrategy::CustomApt => (
                "Custom package",
                "Enter the name of your package from apt you wish to install.",
                "apt",
            ),
            InstallStrategy::CustomPip => (
                "Custom Python package",
                "Enter the name of your python package from pip you wish to install.",
                "pip",
            ),
            other => return Ok(Some(other.clone())),
        };

        loop {
            let name = self.dialog.prompt(title, text).await?.map(|n| n.trim().to_string());
            match name {
                Some(name) if !name.is_empty() => {
                    return Ok(Some(if kind == "apt" {
                        InstallStrategy::apt([name])
                    } else {
                        InstallStrategy::Pip {
                            packages: vec![name],
                            on_server: false,
                        }
                    }));
                }
                _ => {
                    let question =
                        format!("Are you sure you want to cancel the installation of a custom {kind} package?");
                    if self.dialog.confirm("Are you sure?", &question).await? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Run one strategy. Returns whether every step succeeded.
    ///
    /// Custom strategies ask for the package name first; cancelling counts
    /// as not installed.
    pub async fn install(&self, strategy: &InstallStrategy) -> Result<bool> {
        if !strategy.needs_name() {
            return self.install_resolved(strategy).await;
        }
        match self.resolve(strategy).await? {
            Some(concrete) => self.install_resolved(&concrete).await,
            None => Ok(false),
        }
    }

    async fn install_resolved(&self, strategy: &InstallStrategy) -> Result<bool> {
        match strategy {
            InstallStrategy::Apt {
                packages,
                on_server,
                flags,
            } => self.apt().install(packages, *on_server, flags).await,
            InstallStrategy::Pip {
                packages,
                on_server,
            } => self.apt().pip_install(packages, *on_server).await,
            InstallStrategy::Script {
                commands,
            } => self.run_script(commands).await,
            InstallStrategy::Epoptes => self.install_epoptes().await,
            InstallStrategy::ScratchGpio => self.install_scratch_gpio().await,
            InstallStrategy::CustomApt | InstallStrategy::CustomPip => Ok(false),
        }
    }

    async fn run_script(&self, commands: &[String]) -> Result<bool> {
        let mut all = true;
        for line in commands {
            let mut words = line.split_whitespace();
            let Some(program) = words.next() else {
                continue;
            };
            let command = self.ctx.chroot_command(program).args(words).inherit_stdio();
            all &= self.apt().run(command, ErrorPolicy::Ask).await?;
        }
        Ok(all)
    }

    async fn install_epoptes(&self) -> Result<bool> {
        let apt = self.apt();
        let mut ok = apt.install(&["epoptes".to_string()], true, &[]).await?;

        ok &= apt
            .run(self.ctx.host_command("gpasswd").args(["-a", "root", "staff"]), ErrorPolicy::Ask)
            .await?;
        ok &= apt
            .install(&["epoptes-client".to_string()], false, &["--no-install-recommends".to_string()])
            .await?;
        ok &= apt.run(self.ctx.chroot_command("epoptes-client").arg("-c"), ErrorPolicy::Ask).await?;

        ConfigStore::new(&self.paths.epoptes_defaults)
            .replace_line_or_add("SOCKET_GROUP", "SOCKET_GROUP=teacher")
            .await?;
        Ok(ok)
    }

    async fn install_scratch_gpio(&self) -> Result<bool> {
        let chroot = &self.ctx.settings.chroot_path;

        if let Err(e) =
            download_to(self.fetcher, SCRATCH_GPIO_INSTALLER_URL, &chroot.join(SCRATCH_GPIO_SCRIPT), Some(0o755))
                .await
        {
            tracing::error!("Failed to download the ScratchGPIO installer: {:#}", e);
            return Ok(false);
        }

        ConfigStore::new(chroot.join(SCRATCH_SUDO_WRAPPER))
            .replace_line_or_add(SCRATCH_WRAPPER_LINE, SCRATCH_WRAPPER_LINE)
            .await?;

        let desktop = self.paths.skel_dir.join("Desktop");
        fs::create_dir_all(&desktop).await?;
        fs::write(desktop.join(SCRATCH_DESKTOP_FILE), SCRATCH_DESKTOP_ENTRY).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::catalog::find_packages;
    use crate::test_utils::{RecordingRunner, Response, ScriptedDialog, StaticFetcher, test_context};
    use tempfile::TempDir;

    fn paths(temp: &TempDir) -> SystemPaths {
        SystemPaths {
            epoptes_defaults: temp.path().join("etc/default/epoptes"),
            skel_dir: temp.path().join("etc/skel"),
        }
    }

    #[tokio::test]
    async fn test_epoptes_steps_and_socket_group() {
        let (temp, ctx) = test_context("").await;
        std::fs::create_dir_all(temp.path().join("etc/default")).unwrap();
        std::fs::write(temp.path().join("etc/default/epoptes"), "PORT=789\nSOCKET_GROUP=epoptes\n").unwrap();

        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![]);
        let fetcher = StaticFetcher::new();
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher).with_paths(paths(&temp));

        assert!(installer.install(&InstallStrategy::Epoptes).await.unwrap());
        assert_eq!(
            runner.commands(),
            vec![
                "apt-get install -y epoptes",
                "gpasswd -a root staff",
                "ltsp-chroot --arch armhf apt-get install -y --no-install-recommends epoptes-client",
                "ltsp-chroot --arch armhf epoptes-client -c",
            ]
        );
        assert_eq!(
            std::fs::read_to_string(temp.path().join("etc/default/epoptes")).unwrap(),
            "PORT=789\nSOCKET_GROUP=teacher\n"
        );
    }

    #[tokio::test]
    async fn test_scratch_gpio_writes_installer_wrapper_and_launcher() {
        let (temp, ctx) = test_context("").await;
        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![]);
        let fetcher = StaticFetcher::new().with(SCRATCH_GPIO_INSTALLER_URL, "#!/bin/bash\n");
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher).with_paths(paths(&temp));

        assert!(installer.install(&InstallStrategy::ScratchGpio).await.unwrap());

        let chroot = &ctx.settings.chroot_path;
        assert!(chroot.join(SCRATCH_GPIO_SCRIPT).is_file());
        let wrapper = std::fs::read_to_string(chroot.join(SCRATCH_SUDO_WRAPPER)).unwrap();
        assert!(wrapper.contains(SCRATCH_WRAPPER_LINE));
        let launcher = std::fs::read_to_string(temp.path().join("etc/skel/Desktop").join(SCRATCH_DESKTOP_FILE)).unwrap();
        assert!(launcher.contains("Exec=sudo bash /usr/local/bin/scratchSudo.sh"));
    }

    #[tokio::test]
    async fn test_custom_apt_prompts_for_name() {
        let (_temp, ctx) = test_context("").await;
        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![Response::Prompt(Some("sense-hat".to_string()))]);
        let fetcher = StaticFetcher::new();
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher);

        let resolved = installer.resolve(&InstallStrategy::CustomApt).await.unwrap();
        assert_eq!(resolved, Some(InstallStrategy::apt(["sense-hat"])));
    }

    #[tokio::test]
    async fn test_custom_pip_empty_name_asks_to_cancel() {
        let (_temp, ctx) = test_context("").await;
        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![
            Response::Prompt(Some(String::new())),
            Response::Confirm(false),
            Response::Prompt(None),
            Response::Confirm(true),
        ]);
        let fetcher = StaticFetcher::new();
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher);

        assert_eq!(installer.resolve(&InstallStrategy::CustomPip).await.unwrap(), None);
        assert!(dialog.is_exhausted());
    }

    #[tokio::test]
    async fn test_install_packages_updates_once_and_rebuilds_once() {
        let (_temp, ctx) = test_context("NBD=true\nNBDuse=true\n").await;
        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![Response::Prompt(Some("pygame".to_string()))]);
        let fetcher = StaticFetcher::new();
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher);

        let packages = find_packages(&["Arduino-IDE".to_string(), "Custom-python".to_string()]).unwrap();
        let summary = installer.install_packages(&packages).await.unwrap();

        assert_eq!(summary.installed, vec!["Arduino-IDE", "Custom-python"]);
        assert_eq!(summary.rebuild, Some(RebuildOutcome::Rebuilt));

        let commands = runner.commands();
        assert_eq!(commands.iter().filter(|c| c.ends_with("apt-get update")).count(), 1);
        assert_eq!(commands.iter().filter(|c| c.starts_with("ltsp-update-image")).count(), 1);
        assert_eq!(commands[0], "ltsp-chroot --arch armhf apt-get update");
        assert_eq!(ctx.store.get("NBDBuildNeeded").await.unwrap(), "false");
    }

    #[tokio::test]
    async fn test_install_packages_nothing_resolved_does_nothing() {
        let (_temp, ctx) = test_context("").await;
        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![Response::Prompt(None), Response::Confirm(true)]);
        let fetcher = StaticFetcher::new();
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher);

        let packages = find_packages(&["Custom-package".to_string()]).unwrap();
        let summary = installer.install_packages(&packages).await.unwrap();

        assert_eq!(summary.skipped, vec!["Custom-package"]);
        assert!(runner.commands().is_empty());
        assert_eq!(ctx.store.get("NBDBuildNeeded").await.unwrap(), "None");
    }

    #[tokio::test]
    async fn test_script_strategy_runs_each_command_in_chroot() {
        let (_temp, ctx) = test_context("").await;
        let runner = RecordingRunner::new();
        let dialog = ScriptedDialog::new(vec![]);
        let fetcher = StaticFetcher::new();
        let installer = SoftwareInstaller::new(&ctx, &runner, &dialog, &fetcher);

        let strategy = InstallStrategy::Script {
            commands: vec!["wget -O /tmp/x http://example".to_string(), "bash /tmp/x".to_string()],
        };
        assert!(installer.install(&strategy).await.unwrap());
        assert_eq!(
            runner.commands(),
            vec![
                "ltsp-chroot --arch armhf wget -O /tmp/x http://example",
                "ltsp-chroot --arch armhf bash /tmp/x"
            ]
        );
    }
}
