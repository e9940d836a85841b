//! Common test utilities for PiNet integration tests
//!
//! [`TestServer`] lays out a fake LTSP server in a temporary directory (a
//! settings file, `/etc/pinet`, a client chroot and a backup root) and runs
//! the `pinet` binary against it.

// Not every test file uses every helper
#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fake PiNet server rooted in a temporary directory.
pub struct TestServer {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestServer {
    /// Create the layout with an empty `/etc/pinet` and no chroot.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let root = temp_dir.path().to_path_buf();

        let server = Self {
            _temp_dir: temp_dir,
            root,
        };
        let settings = format!(
            r#"config_file = "{}"
chroot_path = "{}"
backup_root = "{}"
log_file = "{}"
install_dir = "{}"
space_threshold_kb = 0
connect_timeout_secs = 1
ip_lookup_url = "http://127.0.0.1:9/"
metrics_url = "http://127.0.0.1:9/"
"#,
            server.config_file().display(),
            server.chroot_path().display(),
            server.backup_root().display(),
            server.log_file().display(),
            server.root.join("bin").display(),
        );
        fs::write(server.settings_path(), settings).expect("write settings");
        fs::write(server.config_file(), "").expect("write config store");
        server
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("pinet.toml")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("pinet")
    }

    pub fn chroot_path(&self) -> PathBuf {
        self.root.join("opt/ltsp/armhf")
    }

    pub fn backup_root(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("pinet.log")
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Replace the contents of `/etc/pinet`.
    pub fn write_config(&self, content: &str) {
        fs::write(self.config_file(), content).expect("write config store");
    }

    pub fn read_config(&self) -> String {
        fs::read_to_string(self.config_file()).expect("read config store")
    }

    /// Build a minimal chroot whose `etc/marker` holds `marker`.
    pub fn make_chroot(&self, marker: &str) {
        make_tree(&self.chroot_path(), marker);
    }

    /// Create a backup directory by hand, optionally without `boot/`.
    pub fn make_backup(&self, name: &str, marker: &str, with_boot: bool) -> PathBuf {
        let path = self.backup_root().join(name);
        make_tree(&path, marker);
        if !with_boot {
            fs::remove_dir_all(path.join("boot")).expect("remove boot dir");
        }
        path
    }

    pub fn chroot_marker(&self) -> String {
        fs::read_to_string(self.chroot_path().join("etc/marker")).expect("read chroot marker")
    }

    /// `pinet` with this server's settings, no dialogs and no spinners.
    pub fn pinet(&self) -> Command {
        let mut cmd = Command::cargo_bin("pinet").expect("pinet binary");
        cmd.arg("--settings")
            .arg(self.settings_path())
            .arg("--yes")
            .arg("--no-progress")
            .env_remove("PINET_SETTINGS")
            .env_remove("SUDO_USER")
            .env("NO_COLOR", "1");
        cmd
    }
}

fn make_tree(root: &Path, marker: &str) {
    fs::create_dir_all(root.join("boot")).expect("create boot dir");
    fs::create_dir_all(root.join("etc")).expect("create etc dir");
    fs::write(root.join("boot/kernel.img"), "kernel").expect("write kernel");
    fs::write(root.join("etc/marker"), marker).expect("write marker");
}
