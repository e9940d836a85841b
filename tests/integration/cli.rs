use predicates::prelude::*;

use crate::common::TestServer;

#[test]
fn test_compare_version_newer_exits_10() {
    let server = TestServer::new();
    server
        .pinet()
        .args(["compare-version", "1.2.3", "1.3.0"])
        .assert()
        .code(10)
        .stdout(predicate::str::contains("1.3.0 is newer than 1.2.3"));
}

#[test]
fn test_compare_version_same_or_older_exits_0() {
    let server = TestServer::new();
    server.pinet().args(["compare-version", "1.2.3", "1.2.3"]).assert().code(0);
    server.pinet().args(["compare-version", "2.0.0", "1.9.9"]).assert().code(0);
    server.pinet().args(["compare-version", "1.5.0", "1.4.9"]).assert().code(0);
}

#[test]
fn test_compare_version_malformed_exits_1() {
    let server = TestServer::new();
    server
        .pinet()
        .args(["compare-version", "1.2", "1.3.0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let server = TestServer::new();
    server.pinet().arg("frobnicate").assert().code(2);
}

#[test]
fn test_help_lists_commands() {
    let server = TestServer::new();
    server
        .pinet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check-update"))
        .stdout(predicate::str::contains("restore"));
}

#[test]
fn test_missing_settings_file_is_reported() {
    let server = TestServer::new();
    let mut cmd = assert_cmd::Command::cargo_bin("pinet").unwrap();
    cmd.args(["--settings"])
        .arg(server.path("missing.toml"))
        .args(["--yes", "config", "get", "NBD"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn test_install_software_rejects_unknown_package() {
    let server = TestServer::new();
    server
        .pinet()
        .args(["install-software", "minecraft"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("minecraft"));
}

#[test]
fn test_install_software_needs_names_with_yes() {
    let server = TestServer::new();
    server.pinet().arg("install-software").assert().code(1);
}

#[test]
fn test_errors_are_written_to_log_file() {
    let server = TestServer::new();
    server.pinet().args(["compare-version", "a.b.c", "1.0.0"]).assert().code(1);

    let log = std::fs::read_to_string(server.log_file()).unwrap();
    assert!(log.contains("ERROR"), "log was: {log}");
}
