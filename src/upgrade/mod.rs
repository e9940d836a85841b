//! Keeping PiNet itself up to date.
//!
//! PiNet has no release server of its own. New versions are commits on the
//! release branch whose message starts with `Release X.Y.Z`, and the GitHub
//! Atom feed of that branch is the update signal.
//!
//! # Components
//!
//! - [`connectivity`]: the quick online probe and the full site report
//! - [`feed`]: reads the commit feed (latest version, changelog)
//! - [`decision`]: the pure [`evaluate`] decision and the interactive
//!   [`UpdateFlow`]
//! - [`self_updater`]: downloads the launcher and helper script
//! - [`kernel`]: boot file and kernel check script updates
//! - [`fetch`]: the [`Fetcher`] download abstraction shared by the above
//!
//! # Update Flow
//!
//! ```text
//! 1. Probe connectivity (offline ends the check, it is not an error)
//! 2. Read the latest version from the feed and compare with the local one
//! 3. Show the changelog since the local version
//! 4. On confirmation download every artifact, reporting each one
//! ```

pub mod connectivity;
pub mod decision;
pub mod feed;
pub mod fetch;
pub mod kernel;
pub mod self_updater;

pub use connectivity::{ConnectivityProbe, HttpProbe, full_status_check, full_status_report};
pub use decision::{UpdateDecision, UpdateFlow, UpdateOutcome, check_for_update, evaluate};
pub use feed::{FeedSource, ReleaseEntry, ReleaseFeed, render_changelog};
pub use fetch::{Fetcher, HttpFetcher};
pub use self_updater::{Artifact, ArtifactReport, SelfUpdater, release_artifacts};

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{MISSING_VALUE, MatchMode, store};

/// Version recorded in the installed launcher's `version=` line.
///
/// Returns `None` when the launcher is missing or has no version line.
pub async fn installed_version(install_dir: &Path) -> Result<Option<String>> {
    let launcher = install_dir.join("pinet");
    if !launcher.is_file() {
        return Ok(None);
    }

    let content = tokio::fs::read_to_string(&launcher)
        .await
        .with_context(|| format!("Failed to read {}", launcher.display()))?;
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let value = store::lookup(&lines, "version", MatchMode::First);

    if value == MISSING_VALUE {
        Ok(None)
    } else {
        Ok(Some(value.trim().trim_matches('"').to_string()))
    }
}
