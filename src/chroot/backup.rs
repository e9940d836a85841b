//! Named backups of the client chroot.
//!
//! A backup is a full copy of the chroot under `<backup-root>/<name>`, made
//! with `cp -a` so permissions, ownership and timestamps survive.
//!
//! # Backup
//!
//! 1. Create the backup root if needed
//! 2. Measure the chroot (`du`) and the free space on the backup volume (`df`)
//! 3. Refuse with [`PinetError::SpaceError`] unless `free - size` exceeds the
//!    threshold or the caller explicitly overrides the check
//! 4. Validate the name (non-empty, no whitespace)
//! 5. Copy. A failed copy is reported and the partial copy is left in place
//!
//! # Restore
//!
//! Restores never delete the live chroot before the replacement is known to
//! be good:
//!
//! ```text
//! backup ──cp -a──▶ staging ──validate──▶ swap(live ⇄ staging) ──▶ rm old
//! ```
//!
//! A failure before the swap leaves the live chroot untouched. A failure
//! during the swap moves the old tree back.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::lock::ChrootLock;
use super::space::SpaceProbe;
use crate::core::PinetError;
use crate::shell::{CommandRunner, ShellCommand};

/// Directory every valid backup must contain.
pub const BOOT_DIR: &str = "boot";

/// Result of the free-space check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceCheck {
    /// Size of the chroot in KB
    pub chroot_kb: u64,
    /// Free space on the backup volume in KB
    pub free_kb: u64,
    /// Whether the check only passed because it was overridden
    pub overridden: bool,
}

/// A completed backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Backup name
    pub name: String,
    /// Location of the copy
    pub path: PathBuf,
    /// Size of the chroot that was copied, in KB
    pub size_kb: u64,
}

/// Decide whether a backup of `chroot_kb` fits in `free_kb`.
///
/// Passes when `free_kb - chroot_kb > threshold_kb`, or when
/// `override_space` is set.
pub fn check_space(
    chroot_kb: u64,
    free_kb: u64,
    threshold_kb: u64,
    override_space: bool,
) -> Result<SpaceCheck, PinetError> {
    let remaining_after = i128::from(free_kb) - i128::from(chroot_kb);
    let fits = remaining_after > i128::from(threshold_kb);

    if fits || override_space {
        return Ok(SpaceCheck {
            chroot_kb,
            free_kb,
            overridden: !fits,
        });
    }

    Err(PinetError::SpaceError {
        required: chroot_kb.saturating_add(threshold_kb),
        available: free_kb,
    })
}

/// Validate a backup name: non-empty, no whitespace, usable as a single
/// directory name.
pub fn validate_backup_name(name: &str) -> Result<(), PinetError> {
    let reason = if name.is_empty() {
        Some("the name cannot be empty")
    } else if name.chars().any(char::is_whitespace) {
        Some("the name cannot contain spaces")
    } else if name.contains('/') {
        Some("the name cannot contain '/'")
    } else if name.starts_with('.') {
        Some("the name cannot start with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PinetError::ValidationError {
            field: "backup name".to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Check that `path` looks like a restorable backup.
pub async fn validate_backup_tree(name: &str, path: &Path) -> Result<(), PinetError> {
    let integrity = |reason: &str| PinetError::IntegrityError {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(integrity("not a directory")),
        Err(_) => return Err(integrity("the backup directory does not exist")),
    }

    match fs::metadata(path.join(BOOT_DIR)).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(integrity("the boot directory is missing")),
    }
}

/// Creates, lists and restores chroot backups.
pub struct BackupManager<'a, R, S> {
    chroot_path: PathBuf,
    backup_root: PathBuf,
    threshold_kb: u64,
    use_sudo: bool,
    runner: &'a R,
    space: &'a S,
}

impl<'a, R, S> BackupManager<'a, R, S>
where
    R: CommandRunner,
    S: SpaceProbe,
{
    /// Create a manager for `chroot_path` storing backups under `backup_root`.
    pub fn new(
        chroot_path: impl Into<PathBuf>,
        backup_root: impl Into<PathBuf>,
        runner: &'a R,
        space: &'a S,
    ) -> Self {
        Self {
            chroot_path: chroot_path.into(),
            backup_root: backup_root.into(),
            threshold_kb: crate::constants::DEFAULT_SPACE_THRESHOLD_KB,
            use_sudo: false,
            runner,
            space,
        }
    }

    /// Free space that must remain after a backup, in KB.
    #[must_use]
    pub const fn threshold_kb(mut self, threshold_kb: u64) -> Self {
        self.threshold_kb = threshold_kb;
        self
    }

    /// Run copy, move and delete commands through `sudo`.
    #[must_use]
    pub const fn use_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Directory holding the backups.
    #[must_use]
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Path a backup called `name` lives at.
    #[must_use]
    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.backup_root.join(name)
    }

    /// Measure the chroot and the backup volume and apply the space check.
    pub async fn check_space(&self, override_space: bool) -> Result<SpaceCheck> {
        self.ensure_backup_root().await?;

        let chroot_kb = self.space.usage_kb(&self.chroot_path).await?;
        let free_kb = self.space.free_kb(&self.backup_root).await?;
        debug!(chroot_kb, free_kb, threshold_kb = self.threshold_kb, "Measured backup space");

        Ok(check_space(chroot_kb, free_kb, self.threshold_kb, override_space)?)
    }

    /// Copy the chroot to a new backup called `name`.
    pub async fn backup(&self, name: &str, override_space: bool) -> Result<BackupRecord> {
        let space = self.check_space(override_space).await?;
        if space.overridden {
            warn!(
                "Backing up with insufficient space ({} KB free, chroot {} KB): overridden by operator",
                space.free_kb, space.chroot_kb
            );
        }

        validate_backup_name(name)?;
        let target = self.backup_path(name);
        if fs::metadata(&target).await.is_ok() {
            return Err(PinetError::ValidationError {
                field: "backup name".to_string(),
                reason: format!("a backup called '{name}' already exists"),
            }
            .into());
        }

        let _chroot_lock = ChrootLock::global(&self.backup_root).await?;
        let _name_lock = ChrootLock::backup(&self.backup_root, name).await?;

        info!("Backing up {} to {}", self.chroot_path.display(), target.display());
        if let Err(e) = self.copy_tree(&self.chroot_path, &target).await {
            warn!("Backup copy to {} failed, partial copy left in place", target.display());
            return Err(e);
        }
        info!("Backup '{}' complete", name);

        Ok(BackupRecord {
            name: name.to_string(),
            path: target,
            size_kb: space.chroot_kb,
        })
    }

    /// Names of existing backups, sorted.
    pub async fn list_backups(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.backup_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read backup directory {}", self.backup_root.display())
                });
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Fail with [`PinetError::NoBackupsFound`] if there is nothing to restore.
    pub async fn require_backups(&self) -> Result<Vec<String>> {
        let backups = self.list_backups().await?;
        if backups.is_empty() {
            return Err(PinetError::NoBackupsFound {
                path: self.backup_root.display().to_string(),
            }
            .into());
        }
        Ok(backups)
    }

    /// Validate the backup called `name` without touching anything.
    pub async fn validate(&self, name: &str) -> Result<()> {
        validate_backup_name(name).map_err(|_| PinetError::IntegrityError {
            name: name.to_string(),
            reason: "not a valid backup name".to_string(),
        })?;
        validate_backup_tree(name, &self.backup_path(name)).await?;
        Ok(())
    }

    /// Replace the live chroot with the backup called `name`.
    pub async fn restore(&self, name: &str) -> Result<()> {
        self.require_backups().await?;
        self.validate(name).await?;

        let _chroot_lock = ChrootLock::global(&self.backup_root).await?;
        let _name_lock = ChrootLock::backup(&self.backup_root, name).await?;

        let source = self.backup_path(name);
        let staging = self.sibling_path("pinet-staging")?;
        let retired = self.sibling_path("pinet-old")?;

        for stale in [&staging, &retired] {
            if fs::symlink_metadata(stale).await.is_ok() {
                debug!("Removing stale {}", stale.display());
                self.remove_tree(stale).await?;
            }
        }

        info!("Copying backup '{}' to {}", name, staging.display());
        if let Err(e) = self.copy_tree(&source, &staging).await {
            self.discard(&staging).await;
            return Err(e).context("Restore aborted before the live chroot was touched");
        }

        if let Err(e) = validate_backup_tree(name, &staging).await {
            self.discard(&staging).await;
            return Err(e.into());
        }

        let had_live = fs::symlink_metadata(&self.chroot_path).await.is_ok();
        if had_live {
            self.move_tree(&self.chroot_path, &retired)
                .await
                .context("Restore aborted before the live chroot was touched")?;
        }

        if let Err(e) = self.move_tree(&staging, &self.chroot_path).await {
            warn!("Swapping in restored chroot failed, rolling back");
            if had_live {
                self.move_tree(&retired, &self.chroot_path)
                    .await
                    .context("Rolling back the chroot swap also failed")?;
            }
            self.discard(&staging).await;
            return Err(e).context("Restore failed, previous chroot put back");
        }

        if had_live && let Err(e) = self.remove_tree(&retired).await {
            warn!("Restore succeeded but the old chroot at {} could not be removed: {}", retired.display(), e);
        }

        info!("Restored chroot from backup '{}'", name);
        Ok(())
    }

    async fn ensure_backup_root(&self) -> Result<()> {
        fs::create_dir_all(&self.backup_root).await.with_context(|| {
            format!("Failed to create backup directory {}", self.backup_root.display())
        })
    }

    /// `/opt/ltsp/armhf` → `/opt/ltsp/.armhf.<suffix>`, on the same filesystem
    /// so the swap is a rename.
    fn sibling_path(&self, suffix: &str) -> Result<PathBuf> {
        let file_name = self
            .chroot_path
            .file_name()
            .with_context(|| format!("Invalid chroot path {}", self.chroot_path.display()))?;
        Ok(self
            .chroot_path
            .with_file_name(format!(".{}.{suffix}", file_name.to_string_lossy())))
    }

    async fn copy_tree(&self, from: &Path, to: &Path) -> Result<()> {
        self.runner
            .run(
                ShellCommand::new("cp")
                    .arg("-a")
                    .arg(from.display().to_string())
                    .arg(to.display().to_string())
                    .privileged(self.use_sudo)
                    .with_context("chroot copy"),
            )
            .await?;
        Ok(())
    }

    async fn move_tree(&self, from: &Path, to: &Path) -> Result<()> {
        self.runner
            .run(
                ShellCommand::new("mv")
                    .arg("-T")
                    .arg(from.display().to_string())
                    .arg(to.display().to_string())
                    .privileged(self.use_sudo),
            )
            .await?;
        Ok(())
    }

    async fn remove_tree(&self, path: &Path) -> Result<()> {
        self.runner
            .run(
                ShellCommand::new("rm")
                    .arg("-rf")
                    .arg(path.display().to_string())
                    .privileged(self.use_sudo),
            )
            .await?;
        Ok(())
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = self.remove_tree(path).await {
            warn!("Failed to clean up {}: {}", path.display(), e);
        }
    }
}
