use predicates::prelude::*;

use crate::common::TestServer;

#[test]
fn test_set_then_get() {
    let server = TestServer::new();
    server.pinet().args(["config", "set", "Foo", "bar"]).assert().success();

    server.pinet().args(["config", "get", "Foo"]).assert().success().stdout("bar\n");
    assert_eq!(server.read_config(), "Foo=bar\n");
}

#[test]
fn test_get_missing_key_prints_none() {
    let server = TestServer::new();
    server.pinet().args(["config", "get", "ServerID"]).assert().success().stdout("None\n");
}

#[test]
fn test_set_replaces_existing_line() {
    let server = TestServer::new();
    server.write_config("NBD=true\nNBDuse=false\nReleaseChannel=Stable\n");

    server.pinet().args(["config", "set", "NBDuse", "true"]).assert().success();

    assert_eq!(server.read_config(), "NBD=true\nNBDuse=true\nReleaseChannel=Stable\n");
}

#[test]
fn test_get_first_match() {
    let server = TestServer::new();
    server.write_config("Key=one\nKey=two\n");

    server.pinet().args(["config", "get", "Key"]).assert().success().stdout("two\n");
    server.pinet().args(["config", "get", "Key", "--first"]).assert().success().stdout("one\n");
}

#[test]
fn test_settings_json_reflects_settings_file() {
    let server = TestServer::new();
    server.write_config("ReleaseChannel=Dev\n");

    let output = server.pinet().args(["config", "settings", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["space_threshold_kb"], 0);
    assert_eq!(json["chroot_path"], server.chroot_path().display().to_string());
}

#[test]
fn test_settings_toml_shows_channel() {
    let server = TestServer::new();
    server.write_config("ReleaseChannel=Custom:feature-x\n");

    server
        .pinet()
        .args(["config", "settings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature-x"));
}
