//! Tool settings loaded from TOML.
//!
//! [`Settings`] holds everything that used to be a hardcoded path or URL in
//! the PiNet scripts. Every field has a default, so the settings file is
//! optional; a file only needs to list the values it overrides.
//!
//! # Resolution Order
//!
//! 1. `--settings <path>` on the command line
//! 2. The `PINET_SETTINGS` environment variable
//! 3. `/etc/pinet.toml` if it exists
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```toml
//! chroot_path = "/opt/ltsp/armhf"
//! backup_root = "/srv/pinet/backups"
//! connect_timeout_secs = 10
//! use_sudo = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants;

/// Tool settings. See the module documentation for the resolution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// The shared `key=value` parameter file.
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,

    /// Root of the client chroot.
    #[serde(default = "default_chroot_path")]
    pub chroot_path: PathBuf,

    /// Architecture passed to `ltsp-chroot --arch`.
    #[serde(default = "default_chroot_arch")]
    pub chroot_arch: String,

    /// Directory holding named chroot backups.
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,

    /// Append-only operator log.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Where self-update artifacts are written.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Connect timeout for every network call, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Free space in KB that must remain after a backup.
    #[serde(default = "default_space_threshold_kb")]
    pub space_threshold_kb: u64,

    /// Feed entries examined when building a changelog.
    #[serde(default = "default_changelog_max_entries")]
    pub changelog_max_entries: usize,

    /// GitHub organisation URL hosting the PiNet repositories.
    #[serde(default = "default_repository_base")]
    pub repository_base: String,

    /// Raw-content base URL for the PiNet repositories.
    #[serde(default = "default_raw_repository_base")]
    pub raw_repository_base: String,

    /// Name of the main repository.
    #[serde(default = "default_repository_name")]
    pub repository_name: String,

    /// Name of the boot-files repository.
    #[serde(default = "default_boot_repository")]
    pub boot_repository: String,

    /// Anonymous statistics endpoint.
    #[serde(default = "default_metrics_url")]
    pub metrics_url: String,

    /// Plain-text external IP lookup endpoint.
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// Prefix privileged commands with `sudo`. Off when PiNet itself runs as root.
    #[serde(default)]
    pub use_sudo: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            chroot_path: default_chroot_path(),
            chroot_arch: default_chroot_arch(),
            backup_root: default_backup_root(),
            log_file: default_log_file(),
            install_dir: default_install_dir(),
            connect_timeout_secs: default_connect_timeout_secs(),
            space_threshold_kb: default_space_threshold_kb(),
            changelog_max_entries: default_changelog_max_entries(),
            repository_base: default_repository_base(),
            raw_repository_base: default_raw_repository_base(),
            repository_name: default_repository_name(),
            boot_repository: default_boot_repository(),
            metrics_url: default_metrics_url(),
            ip_lookup_url: default_ip_lookup_url(),
            use_sudo: false,
        }
    }
}

impl Settings {
    /// Load settings following the documented resolution order.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path).await;
        }

        if let Ok(path) = std::env::var(constants::SETTINGS_ENV_VAR)
            && !path.is_empty()
        {
            return Self::load_from(Path::new(&path)).await;
        }

        let default_path = Path::new(constants::DEFAULT_SETTINGS_FILE);
        if default_path.exists() {
            Self::load_from(default_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from a specific file and expand `~` and `$VAR` in paths.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

        settings.expanded()
    }

    /// Save settings as pretty TOML, creating parent directories as needed.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    fn expanded(mut self) -> Result<Self> {
        self.config_file = expand_path(&self.config_file)?;
        self.chroot_path = expand_path(&self.chroot_path)?;
        self.backup_root = expand_path(&self.backup_root)?;
        self.log_file = expand_path(&self.log_file)?;
        self.install_dir = expand_path(&self.install_dir)?;
        Ok(self)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Atom feed of commits on `branch`.
    #[must_use]
    pub fn feed_url(&self, branch: &str) -> String {
        format!("{}/{}/commits/{branch}.atom", self.repository_base, self.repository_name)
    }

    /// Raw URL of `file` on `branch` of the main repository.
    #[must_use]
    pub fn raw_url(&self, branch: &str, file: &str) -> String {
        format!("{}/{}/{branch}/{file}", self.raw_repository_base, self.repository_name)
    }

    /// Raw URL of `file` on `branch` of the boot-files repository.
    #[must_use]
    pub fn boot_raw_url(&self, branch: &str, file: &str) -> String {
        format!("{}/{}/{branch}/{file}", self.raw_repository_base, self.boot_repository)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path {}", path.display()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn default_config_file() -> PathBuf {
    PathBuf::from(constants::DEFAULT_CONFIG_FILE)
}

fn default_chroot_path() -> PathBuf {
    PathBuf::from(constants::DEFAULT_CHROOT_PATH)
}

fn default_chroot_arch() -> String {
    constants::DEFAULT_CHROOT_ARCH.to_string()
}

fn default_backup_root() -> PathBuf {
    PathBuf::from(constants::DEFAULT_BACKUP_ROOT)
}

fn default_log_file() -> PathBuf {
    PathBuf::from(constants::DEFAULT_LOG_FILE)
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_INSTALL_DIR)
}

const fn default_connect_timeout_secs() -> u64 {
    constants::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

const fn default_space_threshold_kb() -> u64 {
    constants::DEFAULT_SPACE_THRESHOLD_KB
}

const fn default_changelog_max_entries() -> usize {
    constants::DEFAULT_CHANGELOG_MAX_ENTRIES
}

fn default_repository_base() -> String {
    constants::DEFAULT_REPOSITORY_BASE.to_string()
}

fn default_raw_repository_base() -> String {
    constants::DEFAULT_RAW_REPOSITORY_BASE.to_string()
}

fn default_repository_name() -> String {
    constants::DEFAULT_REPOSITORY_NAME.to_string()
}

fn default_boot_repository() -> String {
    constants::DEFAULT_BOOT_REPOSITORY.to_string()
}

fn default_metrics_url() -> String {
    constants::DEFAULT_METRICS_URL.to_string()
}

fn default_ip_lookup_url() -> String {
    constants::DEFAULT_IP_LOOKUP_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chroot_path, PathBuf::from("/opt/ltsp/armhf"));
        assert_eq!(settings.backup_root, PathBuf::from("/opt/PiNet/chrootBackups"));
        assert_eq!(settings.connect_timeout(), Duration::from_secs(5));
        assert_eq!(settings.space_threshold_kb, 1_000_000);
        assert_eq!(settings.changelog_max_entries, 10);
        assert!(!settings.use_sudo);
    }

    #[test]
    fn test_urls() {
        let settings = Settings::default();
        assert_eq!(settings.feed_url("master"), "https://github.com/pinet/pinet/commits/master.atom");
        assert_eq!(settings.raw_url("dev", "pinet"), "https://raw.github.com/pinet/pinet/dev/pinet");
        assert_eq!(
            settings.boot_raw_url("master", "boot/version.txt"),
            "https://raw.github.com/pinet/PiNet-Boot/master/boot/version.txt"
        );
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults_for_missing_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pinet.toml");
        std::fs::write(&path, "connect_timeout_secs = 9\nuse_sudo = true\n").unwrap();

        let settings = Settings::load_from(&path).await.unwrap();
        assert_eq!(settings.connect_timeout_secs, 9);
        assert!(settings.use_sudo);
        assert_eq!(settings.chroot_arch, "armhf");
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("pinet.toml");

        let settings = Settings {
            backup_root: temp.path().join("backups"),
            ..Settings::default()
        };
        settings.save_to(&path).await.unwrap();

        let loaded = Settings::load_from(&path).await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pinet.toml");
        std::fs::write(&path, "connect_timeout_secs = \"soon\"").unwrap();

        assert!(Settings::load_from(&path).await.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_overrides_default_location() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(&path, "chroot_arch = \"arm64\"\n").unwrap();

        // SAFETY: serialised with other environment-touching tests
        unsafe { std::env::set_var(constants::SETTINGS_ENV_VAR, &path) };
        let settings = Settings::load(None).await;
        unsafe { std::env::remove_var(constants::SETTINGS_ENV_VAR) };

        assert_eq!(settings.unwrap().chroot_arch, "arm64");
    }

    #[tokio::test]
    #[serial]
    async fn test_paths_are_shell_expanded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pinet.toml");
        std::fs::write(&path, "backup_root = \"$PINET_TEST_ROOT/backups\"\n").unwrap();

        unsafe { std::env::set_var("PINET_TEST_ROOT", "/srv/pinet") };
        let settings = Settings::load_from(&path).await;
        unsafe { std::env::remove_var("PINET_TEST_ROOT") };

        assert_eq!(settings.unwrap().backup_root, PathBuf::from("/srv/pinet/backups"));
    }
}
