//! Small helpers shared by the CLI commands.

pub mod progress;

pub use progress::{ProgressBar, disable_progress, spinner_with_message};
