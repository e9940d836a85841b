//! Kernel and boot file update checks.
//!
//! Two independent checks against the release branch:
//!
//! - The boot files the Pis load come from the PiNet-Boot repository. Its
//!   `boot/version.txt` holds a single integer, compared against the copy in
//!   the operator's `~/PiBoot` checkout.
//! - The chroot carries an init script, `kernelCheckUpdate.sh`, versioned by
//!   a `version=<n>` line. A newer script is installed and registered with
//!   `update-rc.d` straight away.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::fetch::Fetcher;
use crate::config::{MISSING_VALUE, MatchMode, store};
use crate::constants::KERNEL_CHECK_SCRIPT;
use crate::context::PinetContext;
use crate::core::PinetError;
use crate::shell::CommandRunner;

/// Path of the script inside the chroot.
const INIT_SCRIPT_DIR: &str = "etc/init.d";

/// `~/PiBoot/version.txt` of the user who invoked sudo, if known.
#[must_use]
pub fn piboot_version_path() -> Option<PathBuf> {
    let user = std::env::var("SUDO_USER").ok().filter(|u| !u.is_empty())?;
    Some(PathBuf::from("/home").join(user).join("PiBoot/version.txt"))
}

/// Parse the integer on the first non-blank line of a version file.
pub fn parse_boot_version(content: &str) -> Result<u64, PinetError> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    line.parse().map_err(|_| PinetError::FormatError {
        input: line.to_string(),
        reason: "boot version is not an integer".to_string(),
    })
}

/// Parse the `version=<n>` line of the kernel check script.
pub fn parse_script_version(content: &str) -> Result<u64, PinetError> {
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let value = store::lookup(&lines, "version", MatchMode::First);
    if value == MISSING_VALUE {
        return Err(PinetError::FormatError {
            input: KERNEL_CHECK_SCRIPT.to_string(),
            reason: "no version= line".to_string(),
        });
    }
    value.trim().trim_matches('"').parse().map_err(|_| PinetError::FormatError {
        input: value.clone(),
        reason: "script version is not an integer".to_string(),
    })
}

/// Whether the release branch has newer boot files than `local_version_file`.
///
/// A missing local file means there is nothing to compare against and is
/// reported as no update.
pub async fn boot_files_update_available<F: Fetcher>(
    ctx: &PinetContext,
    fetcher: &F,
    local_version_file: Option<&Path>,
) -> Result<bool> {
    let Some(local_path) = local_version_file else {
        tracing::debug!(target: "upgrade", "No PiBoot checkout to compare against");
        return Ok(false);
    };
    if !local_path.is_file() {
        tracing::debug!(target: "upgrade", "{} not found", local_path.display());
        return Ok(false);
    }

    let local = fs::read_to_string(local_path)
        .await
        .with_context(|| format!("Failed to read {}", local_path.display()))?;
    let local = parse_boot_version(&local)?;

    let url = ctx.settings.boot_raw_url(ctx.branch(), "boot/version.txt");
    let remote = parse_boot_version(&fetcher.fetch_text(&url).await?)?;

    tracing::debug!(target: "upgrade", "Boot files local {}, remote {}", local, remote);
    Ok(remote > local)
}

/// Install the kernel check script into the chroot if it is missing or older
/// than the release branch copy. Returns whether it was installed.
pub async fn update_kernel_checker<F, R>(ctx: &PinetContext, fetcher: &F, runner: &R) -> Result<bool>
where
    F: Fetcher,
    R: CommandRunner,
{
    let url = ctx.settings.raw_url(ctx.branch(), &format!("Scripts/{KERNEL_CHECK_SCRIPT}"));
    let script = fetcher.fetch_text(&url).await?;
    let remote = parse_script_version(&script)?;

    let installed = installed_script_path(&ctx.settings.chroot_path);
    if installed.is_file() {
        let content = fs::read_to_string(&installed)
            .await
            .with_context(|| format!("Failed to read {}", installed.display()))?;
        let local = parse_script_version(&content)?;
        if local >= remote {
            tracing::debug!(target: "upgrade", "Kernel check script is current (version {})", local);
            return Ok(false);
        }
        tracing::info!(target: "upgrade", "Updating kernel check script {} -> {}", local, remote);
    } else {
        tracing::info!(target: "upgrade", "Installing kernel check script version {}", remote);
    }

    install_kernel_checker(ctx, runner, &script).await?;
    Ok(true)
}

fn installed_script_path(chroot: &Path) -> PathBuf {
    chroot.join(INIT_SCRIPT_DIR).join(KERNEL_CHECK_SCRIPT)
}

async fn install_kernel_checker<R: CommandRunner>(ctx: &PinetContext, runner: &R, script: &str) -> Result<()> {
    let staged = tempfile::NamedTempFile::new().context("Failed to create temporary file")?;
    fs::write(staged.path(), script)
        .await
        .with_context(|| format!("Failed to write {}", staged.path().display()))?;

    let destination = installed_script_path(&ctx.settings.chroot_path);
    runner
        .run(
            ctx.host_command("cp")
                .arg(staged.path().display().to_string())
                .arg(destination.display().to_string()),
        )
        .await?;

    let in_chroot = format!("/{INIT_SCRIPT_DIR}/{KERNEL_CHECK_SCRIPT}");
    runner.run(ctx.chroot_command("chmod").args(["755", in_chroot.as_str()])).await?;
    runner.run(ctx.chroot_command("update-rc.d").args([KERNEL_CHECK_SCRIPT, "defaults"])).await?;
    Ok(())
}
