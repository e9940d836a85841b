//! Filesystem fixtures.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::config::Settings;
use crate::context::PinetContext;

/// Create a minimal chroot tree at `root`: a `boot/` directory and an
/// `etc/marker` file holding `marker`.
pub fn make_chroot(root: &Path, marker: &str) {
    fs::create_dir_all(root.join("boot")).expect("create boot dir");
    fs::create_dir_all(root.join("etc")).expect("create etc dir");
    fs::write(root.join("boot/kernel.img"), "kernel").expect("write kernel");
    fs::write(root.join("etc/marker"), marker).expect("write marker");
}

/// Settings pointing every path into `temp`. Commands run without `sudo`.
pub fn test_settings(temp: &TempDir) -> Settings {
    let root = temp.path();
    Settings {
        config_file: root.join("pinet"),
        chroot_path: root.join("opt/ltsp/armhf"),
        backup_root: root.join("backups"),
        log_file: root.join("pinet.log"),
        install_dir: root.join("bin"),
        use_sudo: false,
        ..Settings::default()
    }
}

/// A context over a fresh temporary directory whose config store holds
/// `store_content`. The directory lives as long as the returned [`TempDir`].
pub async fn test_context(store_content: &str) -> (TempDir, PinetContext) {
    let temp = TempDir::new().expect("create temp dir");
    let settings = test_settings(&temp);
    fs::write(&settings.config_file, store_content).expect("write config store");

    let ctx = PinetContext::build(settings).await.expect("build context");
    (temp, ctx)
}
