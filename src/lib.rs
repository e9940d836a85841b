//! PiNet - configure and maintain an LTSP network of Raspberry Pi thin clients
//!
//! PiNet runs on the LTSP server. The Raspberry Pis boot over the network
//! from a client chroot (`/opt/ltsp/armhf`) that the server maintains; this
//! crate holds the operations the PiNet menu invokes on that chroot and on
//! the server itself.
//!
//! # Architecture Overview
//!
//! Every operation takes a [`context::PinetContext`] (settings, the
//! `/etc/pinet` parameter store and the resolved release channel) plus the
//! seams it needs:
//!
//! - [`shell::CommandRunner`] runs external commands (`cp`, `apt-get`,
//!   `ltsp-chroot`, `ltsp-update-image`, ...)
//! - [`dialog::Dialog`] asks the operator questions, via `whiptail` or
//!   non-interactively with `--yes`
//! - [`upgrade::ConnectivityProbe`], [`upgrade::FeedSource`] and
//!   [`upgrade::Fetcher`] reach the network
//!
//! Tests substitute all of them with the doubles in `test_utils`.
//!
//! # Core Modules
//!
//! ## Foundation
//! - [`core`] - Error types and user-facing error display
//! - [`config`] - Tool settings and the `key=value` parameter store
//! - [`context`] - The context object passed to every operation
//! - [`shell`] - External command builder and the continue/retry/abort policy
//! - [`dialog`] - Operator dialogs
//! - [`version`] - `MAJOR.MINOR.PATCH` parsing and comparison
//!
//! ## Operations
//! - [`upgrade`] - Release feed, update decision, self update and boot file checks
//! - [`chroot`] - Backups, restores and the NBD image rebuild
//! - [`software`] - Extra software catalog and installer
//! - [`users`] - Batch account import and deletion
//! - [`stats`] - Anonymous usage statistics
//!
//! ## Surface
//! - [`cli`] - Subcommands and exit codes
//! - [`logging`] - Console and log file setup
//! - [`utils`] - Progress indicators

pub mod constants;
pub mod context;

// Foundation
pub mod config;
pub mod core;
pub mod dialog;
pub mod shell;
pub mod version;

// Operations
pub mod chroot;
pub mod software;
pub mod stats;
pub mod upgrade;
pub mod users;

// Surface
pub mod cli;
pub mod logging;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
