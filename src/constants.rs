//! Global constants used throughout the PiNet codebase.
//!
//! Default paths, remote endpoints, thresholds and timeouts. Most of these
//! are only defaults: the values actually used come from
//! [`Settings`](crate::config::Settings), which falls back to them.

use std::time::Duration;

/// Flat `key=value` configuration store shared with the PiNet shell scripts.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/pinet";

/// Optional TOML settings file for this tool.
pub const DEFAULT_SETTINGS_FILE: &str = "/etc/pinet.toml";

/// Environment variable that overrides the settings file location.
pub const SETTINGS_ENV_VAR: &str = "PINET_SETTINGS";

/// Root of the client chroot served to the Raspberry Pis.
pub const DEFAULT_CHROOT_PATH: &str = "/opt/ltsp/armhf";

/// Architecture passed to `ltsp-chroot --arch`.
pub const DEFAULT_CHROOT_ARCH: &str = "armhf";

/// Directory holding named chroot backups.
pub const DEFAULT_BACKUP_ROOT: &str = "/opt/PiNet/chrootBackups";

/// Append-only operator log.
pub const DEFAULT_LOG_FILE: &str = "/var/log/pinet.log";

/// Where the PiNet launcher and its helper script are installed.
pub const DEFAULT_INSTALL_DIR: &str = "/usr/local/bin";

/// Free space (in KB) that must remain after a backup.
pub const DEFAULT_SPACE_THRESHOLD_KB: u64 = 1_000_000;

/// Maximum number of feed entries examined when building a changelog.
pub const DEFAULT_CHANGELOG_MAX_ENTRIES: usize = 10;

/// Connect timeout for network calls (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect timeout for the metrics upload (2 seconds).
pub const METRICS_TIMEOUT: Duration = Duration::from_secs(2);

/// GitHub base for the PiNet repositories.
pub const DEFAULT_REPOSITORY_BASE: &str = "https://github.com/pinet";

/// Raw file base for the PiNet repositories.
pub const DEFAULT_RAW_REPOSITORY_BASE: &str = "https://raw.github.com/pinet";

/// Main PiNet repository name.
pub const DEFAULT_REPOSITORY_NAME: &str = "pinet";

/// Repository holding the boot files served to clients.
pub const DEFAULT_BOOT_REPOSITORY: &str = "PiNet-Boot";

/// Anonymous usage statistics endpoint.
pub const DEFAULT_METRICS_URL: &str = "https://secure.pinet.org.uk/pinetstatsv1.php";

/// Plain-text external IP lookup service.
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org";

/// Hosts tried in order by the quick connectivity probe.
pub const CONNECTIVITY_PROBE_HOSTS: &[&str] =
    &["http://www.google.com", "http://mirrordirector.raspbian.org/", "http://18.62.0.96"];

/// Groups every imported pupil account is added to.
pub const USER_GROUPS: &[&str] =
    &["adm", "dialout", "cdrom", "audio", "users", "video", "games", "plugdev", "input", "pupil"];

/// Reported to the metrics endpoint when no address can be determined.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Name of the lock guarding every chroot mutation.
pub const CHROOT_LOCK_NAME: &str = "chroot";

/// Kernel update checker init script shipped into the chroot.
pub const KERNEL_CHECK_SCRIPT: &str = "kernelCheckUpdate.sh";

/// ScratchGPIO installer script.
pub const SCRATCH_GPIO_INSTALLER_URL: &str = "http://bit.ly/1wxrqdp";

/// Epoptes server defaults file.
pub const EPOPTES_DEFAULTS_FILE: &str = "/etc/default/epoptes";

/// Skeleton copied into every new home directory.
pub const SKEL_DIR: &str = "/etc/skel";
