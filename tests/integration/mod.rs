//! Integration test suite for PiNet
//!
//! These tests drive the built `pinet` binary against a fake server laid out
//! in a temporary directory. Nothing needs root, whiptail or network access:
//! every command runs with `--yes`, and network URLs point at a closed local
//! port.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: argument parsing, `compare-version` and exit codes
//! - **config**: `config get`, `config set` and `config settings`
//! - **backup_restore**: chroot backups and restores with real `cp`/`du`/`df`
//! - **users**: CSV parsing errors and dry runs

#[path = "../common/mod.rs"]
mod common;

mod backup_restore;
mod cli;
mod config;
mod users;
