use predicates::prelude::*;
use std::fs;

use crate::common::TestServer;

#[test]
fn test_backup_then_restore_round_trip() {
    let server = TestServer::new();
    server.make_chroot("original");

    server
        .pinet()
        .args(["backup", "--name", "weekly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup 'weekly' saved"));
    assert_eq!(fs::read_to_string(server.backup_root().join("weekly/etc/marker")).unwrap(), "original");

    fs::write(server.chroot_path().join("etc/marker"), "broken").unwrap();

    server.pinet().args(["restore", "--name", "weekly"]).assert().code(10);

    assert_eq!(server.chroot_marker(), "original");
    assert!(!server.path("opt/ltsp/.armhf.pinet-staging").exists());
    assert!(!server.path("opt/ltsp/.armhf.pinet-old").exists());
    assert!(server.backup_root().join("weekly/boot").is_dir());
}

#[test]
fn test_restore_without_backups_fails() {
    let server = TestServer::new();
    server.make_chroot("live");

    server
        .pinet()
        .args(["restore", "--name", "weekly"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No chroot backups found"));
    assert_eq!(server.chroot_marker(), "live");
}

#[test]
fn test_restore_corrupt_backup_leaves_chroot_alone() {
    let server = TestServer::new();
    server.make_chroot("live");
    server.make_backup("damaged", "old", false);

    server
        .pinet()
        .args(["restore", "--name", "damaged"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("corrupt"));

    assert_eq!(server.chroot_marker(), "live");
    assert!(!server.path("opt/ltsp/.armhf.pinet-staging").exists());
}

#[test]
fn test_restore_unknown_backup_is_integrity_error() {
    let server = TestServer::new();
    server.make_chroot("live");
    server.make_backup("weekly", "old", true);

    server
        .pinet()
        .args(["restore", "--name", "monthly"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
    assert_eq!(server.chroot_marker(), "live");
}

#[test]
fn test_backup_rejects_name_with_spaces() {
    let server = TestServer::new();
    server.make_chroot("live");

    server
        .pinet()
        .args(["backup", "--name", "my backup"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid backup name"));
    assert!(!server.backup_root().join("my backup").exists());
}

#[test]
fn test_backup_refuses_existing_name() {
    let server = TestServer::new();
    server.make_chroot("live");
    server.make_backup("weekly", "old", true);

    server.pinet().args(["backup", "--name", "weekly"]).assert().code(1);
    assert_eq!(fs::read_to_string(server.backup_root().join("weekly/etc/marker")).unwrap(), "old");
}

#[test]
fn test_restore_rebuilds_image_when_auto_compression_disabled() {
    let server = TestServer::new();
    server.write_config("NBD=true\nNBDuse=false\n");
    server.make_chroot("live");
    server.make_backup("weekly", "old", true);

    server
        .pinet()
        .args(["restore", "--name", "weekly"])
        .assert()
        .code(10)
        .stdout(predicate::str::contains("Auto NBD compressing is disabled"));
    assert_eq!(server.chroot_marker(), "old");
}
