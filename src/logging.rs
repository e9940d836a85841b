//! Logging setup for the `pinet` binary.
//!
//! Two layers share one [`EnvFilter`]: a compact console layer on stderr and
//! an append-only file layer at the configured log path. `RUST_LOG` wins
//! over the verbosity flags when set.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How much the console should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Informational messages
    #[default]
    Normal,
    /// Debug output
    Verbose,
}

impl Verbosity {
    /// Pick a verbosity from the `--verbose` and `--quiet` flags.
    #[must_use]
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Local wall-clock timestamps for the log file.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
///
/// A log file that cannot be opened is reported as a warning and console
/// logging carries on.
pub fn init(verbosity: Verbosity, log_file: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity.directive()))
        .context("Invalid log filter")?;

    let console = fmt::layer().compact().with_writer(std::io::stderr).with_target(false).without_time();

    let (file, open_error) = match open_log_file(log_file) {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };
    let file_layer = file.map(|file| {
        fmt::layer().with_writer(Mutex::new(file)).with_ansi(false).with_target(true).with_timer(LocalTime)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    if let Some(e) = open_error {
        tracing::warn!("Cannot open log file {}: {}", log_file.display(), e);
    }
    Ok(())
}
