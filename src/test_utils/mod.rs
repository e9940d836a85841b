//! Test utilities for PiNet
//!
//! Test doubles for the crate's seams and fixtures for the filesystem
//! layout PiNet works on. Nothing here touches the real system: commands
//! are recorded instead of run, dialogs answer from a script and network
//! access is served from memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use pinet_cli::test_utils::{RecordingRunner, Response, ScriptedDialog};
//! use pinet_cli::dialog::RecoveryChoice;
//!
//! let runner = RecordingRunner::new().fail_times("apt-get", 1);
//! let dialog = ScriptedDialog::new(vec![Response::Recovery(RecoveryChoice::Retry)]);
//! ```

pub mod doubles;
pub mod fixtures;

pub use doubles::{
    FixedSpace, RecordingRunner, Response, ScriptedDialog, StaticFeed, StaticFetcher, StaticProbe,
};
pub use fixtures::{make_chroot, test_context, test_settings};

use std::io;
use std::sync::{Arc, Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, otherwise `RUST_LOG`. With neither, tests run
/// without logging.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Formatted log output kept in memory.
///
/// [`install`](Self::install) routes the current thread's events here, so a
/// `#[tokio::test]` on the default current-thread runtime sees everything its
/// futures log.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make this capture the thread's subscriber until the guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything logged so far.
    pub fn contents(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
