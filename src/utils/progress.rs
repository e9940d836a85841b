//! Progress indicators for long-running operations.
//!
//! Chroot copies and image rebuilds take minutes, so the CLI shows a spinner
//! while they run. Indicators are hidden when `--no-progress` was given or
//! the `PINET_NO_PROGRESS` environment variable is set.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static PROGRESS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Hide every indicator created from now on.
pub fn disable_progress() {
    PROGRESS_DISABLED.store(true, Ordering::Relaxed);
}

fn is_progress_disabled() -> bool {
    PROGRESS_DISABLED.load(Ordering::Relaxed) || std::env::var_os("PINET_NO_PROGRESS").is_some()
}

/// A progress bar or spinner with PiNet styling.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A bar counting up to `len`.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// A spinner for work of unknown length.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    /// Whether this indicator draws anything.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("━╸━"))
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}

/// A spinner already showing `msg`.
pub fn spinner_with_message(msg: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(msg);
    spinner
}
