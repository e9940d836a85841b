//! Advisory locks around chroot mutation.
//!
//! PiNet normally runs with a single operator, but it can also be driven by
//! a service wrapper. Two kinds of lock stop concurrent invocations from
//! trampling each other:
//!
//! - the global chroot lock, taken by every operation that changes the
//!   chroot (software installs, backups and restores)
//! - one lock per backup name, so the same backup is never written and
//!   restored at once
//!
//! Lock files live in `<backup-root>/.locks/`. Acquisition never waits: if
//! another process holds the lock, [`PinetError::LockHeld`] is returned
//! immediately. Locks are released when the guard is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::CHROOT_LOCK_NAME;
use crate::core::PinetError;

/// A held advisory lock.
#[derive(Debug)]
pub struct ChrootLock {
    file: File,
    name: String,
    path: PathBuf,
}

impl ChrootLock {
    /// Take the global chroot mutation lock.
    pub async fn global(lock_root: &Path) -> Result<Self> {
        Self::try_acquire(lock_root, CHROOT_LOCK_NAME).await
    }

    /// Take the lock for one backup name.
    pub async fn backup(lock_root: &Path, backup_name: &str) -> Result<Self> {
        Self::try_acquire(lock_root, &format!("backup-{backup_name}")).await
    }

    /// Take the lock called `name` without waiting.
    pub async fn try_acquire(lock_root: &Path, name: &str) -> Result<Self> {
        let locks_dir = lock_root.join(".locks");
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("Failed to create locks directory {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{name}.lock"));
        let lock_path_clone = lock_path.clone();

        let (file, acquired) = tokio::task::spawn_blocking(move || -> Result<(File, bool)> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&lock_path_clone)
                .with_context(|| format!("Failed to open lock file: {}", lock_path_clone.display()))?;
            let acquired = file
                .try_lock_exclusive()
                .with_context(|| format!("Failed to lock {}", lock_path_clone.display()))?;
            Ok((file, acquired))
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        if !acquired {
            return Err(PinetError::LockHeld {
                name: name.to_string(),
            }
            .into());
        }

        debug!(lock_name = %name, "Lock acquired");
        Ok(Self {
            file,
            name: name.to_string(),
            path: lock_path,
        })
    }

    /// Lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ChrootLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
