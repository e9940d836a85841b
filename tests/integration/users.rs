use predicates::prelude::*;
use std::fs;

use crate::common::TestServer;

#[test]
fn test_import_dry_run_shows_summary() {
    let server = TestServer::new();
    let csv = server.path("users.csv");
    fs::write(&csv, "pupil1,secret\npupil2\n").unwrap();

    server
        .pinet()
        .args(["import-users", "--dry-run", "--default-password", "changeme"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Username - pupil1 : Password - secret"))
        .stdout(predicate::str::contains("Username - pupil2 : Password - changeme"))
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn test_import_rejects_names_with_spaces() {
    let server = TestServer::new();
    let csv = server.path("users.csv");
    fs::write(&csv, "pupil1\nmary jones,pw\n").unwrap();

    server
        .pinet()
        .args(["import-users", "--dry-run"])
        .arg(&csv)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_missing_csv_file() {
    let server = TestServer::new();

    server
        .pinet()
        .args(["delete-users", "--dry-run"])
        .arg(server.path("nope.csv"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.csv"));
}
