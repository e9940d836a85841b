//! The client chroot: backups, restores, locking and image rebuilds.
//!
//! - [`backup`]: named full copies of the chroot and staged restores
//! - [`space`]: `du`/`df` measurement behind the [`SpaceProbe`] trait
//! - [`lock`]: the global chroot lock and per-backup locks
//! - [`image`]: NBD image rebuild after the chroot changes

pub mod backup;
pub mod image;
pub mod lock;
pub mod space;

pub use backup::{BackupManager, BackupRecord, SpaceCheck, check_space, validate_backup_name};
pub use image::{RebuildOutcome, mark_rebuild_needed, rebuild_image};
pub use lock::ChrootLock;
pub use space::{DiskSpaceProbe, SpaceProbe};
