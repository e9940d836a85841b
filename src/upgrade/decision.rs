//! Deciding whether to update, and walking the operator through it.
//!
//! ```text
//! CHECKING ──offline──▶ NoConnection
//!    │
//!    ├──not newer──▶ UpToDate
//!    ▼
//! UPDATE_AVAILABLE ──▶ changelog prompt ──cancel──▶ Declined
//!                              │
//!                              ▼
//!                      install artifacts ──▶ Installed | Failed
//! ```

use anyhow::Result;

use super::connectivity::ConnectivityProbe;
use super::feed::{FeedSource, render_changelog};
use super::fetch::Fetcher;
use super::self_updater::{Artifact, SelfUpdater, all_succeeded};
use crate::core::PinetError;
use crate::dialog::Dialog;
use crate::version::is_newer;

/// Result of the update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    /// The quick connectivity probe failed
    NoConnection,
    /// The local version is current
    UpToDate,
    /// The feed declares a newer version
    UpdateAvailable {
        /// Version declared by the newest feed entry
        latest: String,
    },
}

/// Terminal state of the update flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing to install
    UpToDate,
    /// The check could not reach the internet
    NoConnection,
    /// Every artifact was installed
    Installed,
    /// The operator cancelled at the changelog
    Declined,
    /// At least one artifact failed to install
    Failed,
}

/// Decide from the probe result and the two versions.
///
/// `latest` is only consulted when online; a missing latest version while
/// online is a [`PinetError::FormatError`].
pub fn evaluate(online: bool, local: &str, latest: Option<&str>) -> Result<UpdateDecision, PinetError> {
    if !online {
        return Ok(UpdateDecision::NoConnection);
    }

    let latest = latest.ok_or_else(|| PinetError::FormatError {
        input: "release feed".to_string(),
        reason: "no latest version was available".to_string(),
    })?;

    if is_newer(local, latest)? {
        Ok(UpdateDecision::UpdateAvailable {
            latest: latest.to_string(),
        })
    } else {
        Ok(UpdateDecision::UpToDate)
    }
}

/// Probe, fetch the latest version and evaluate.
pub async fn check_for_update<P, F>(probe: &P, feed: &F, local: &str) -> Result<UpdateDecision>
where
    P: ConnectivityProbe,
    F: FeedSource,
{
    if !probe.is_online().await {
        tracing::warn!(target: "upgrade", "No internet connection, skipping update check");
        return Ok(UpdateDecision::NoConnection);
    }

    let latest = feed.latest_version().await?;
    tracing::debug!(target: "upgrade", "Local version {}, latest {}", local, latest);
    Ok(evaluate(true, local, Some(&latest))?)
}

/// Everything the interactive update flow needs.
pub struct UpdateFlow<'a, P, F, D, X> {
    /// Connectivity probe
    pub probe: &'a P,
    /// Release feed
    pub feed: &'a F,
    /// Operator dialogs
    pub dialog: &'a D,
    /// Artifact downloader
    pub fetcher: &'a X,
    /// Artifacts to install on confirmation
    pub artifacts: Vec<Artifact>,
    /// Feed entries examined for the changelog
    pub changelog_max_entries: usize,
}

impl<P, F, D, X> UpdateFlow<'_, P, F, D, X>
where
    P: ConnectivityProbe,
    F: FeedSource,
    D: Dialog,
    X: Fetcher,
{
    /// Check for an update and, if one exists, offer and install it.
    pub async fn run(&self, local: &str) -> Result<UpdateOutcome> {
        let latest = match check_for_update(self.probe, self.feed, local).await? {
            UpdateDecision::NoConnection => return Ok(UpdateOutcome::NoConnection),
            UpdateDecision::UpToDate => {
                tracing::info!(target: "upgrade", "No PiNet software updates found");
                return Ok(UpdateOutcome::UpToDate);
            }
            UpdateDecision::UpdateAvailable {
                latest,
            } => latest,
        };

        self.dialog
            .message(
                "Update detected",
                "An update has been detected for PiNet. Select OK to view the Release History.",
            )
            .await?;

        if !self.confirm_changelog(local, &latest).await? {
            tracing::info!(target: "upgrade", "Update to {} declined", latest);
            return Ok(UpdateOutcome::Declined);
        }

        tracing::info!(target: "upgrade", "Installing PiNet {}", latest);
        let reports = SelfUpdater::new(self.fetcher, self.artifacts.clone()).install().await;
        for report in &reports {
            match &report.error {
                None => println!("Installed {}", report.artifact.name),
                Some(e) => println!("Failed to install {}: {e}", report.artifact.name),
            }
        }

        if all_succeeded(&reports) {
            println!("Update complete");
            Ok(UpdateOutcome::Installed)
        } else {
            println!("Update failed...");
            Ok(UpdateOutcome::Failed)
        }
    }

    /// Show the release history since `local` and ask to install.
    async fn confirm_changelog(&self, local: &str, latest: &str) -> Result<bool> {
        let entries = self.feed.changelog_since(local, self.changelog_max_entries).await?;
        let install_label = match entries.first() {
            Some(entry) => format!("Install {}", entry.title()),
            None => format!("Install Release {latest}"),
        };

        self.dialog
            .confirm_with(
                &format!("Release history (Use arrow keys to scroll) - Release {local}"),
                &render_changelog(&entries),
                &install_label,
                "Cancel",
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_utils::{Response, ScriptedDialog, StaticFeed, StaticFetcher, StaticProbe};
    use crate::upgrade::release_artifacts;
    use tempfile::TempDir;

    #[test]
    fn test_evaluate_offline() {
        assert_eq!(evaluate(false, "1.0.0", None).unwrap(), UpdateDecision::NoConnection);
    }

    #[test]
    fn test_evaluate_versions() {
        assert_eq!(evaluate(true, "1.2.3", Some("1.2.3")).unwrap(), UpdateDecision::UpToDate);
        assert_eq!(
            evaluate(true, "1.2.3", Some("1.3.0")).unwrap(),
            UpdateDecision::UpdateAvailable {
                latest: "1.3.0".to_string()
            }
        );
        assert_eq!(evaluate(true, "2.0.0", Some("1.9.9")).unwrap(), UpdateDecision::UpToDate);
    }

    #[test]
    fn test_evaluate_bad_version_is_format_error() {
        assert!(matches!(evaluate(true, "1.2", Some("1.3.0")), Err(PinetError::FormatError { .. })));
        assert!(matches!(evaluate(true, "1.2.0", None), Err(PinetError::FormatError { .. })));
    }

    struct Harness {
        _temp: TempDir,
        settings: Settings,
        fetcher: StaticFetcher,
    }

    fn harness(with_helper: bool) -> Harness {
        let temp = TempDir::new().unwrap();
        let settings = Settings {
            install_dir: temp.path().to_path_buf(),
            raw_repository_base: "http://raw".to_string(),
            ..Settings::default()
        };
        let mut fetcher = StaticFetcher::new().with("http://raw/pinet/master/pinet", "new launcher");
        if with_helper {
            fetcher = fetcher.with("http://raw/pinet/master/Scripts/pinet_functions_python.py", "helpers");
        }
        Harness {
            _temp: temp,
            settings,
            fetcher,
        }
    }

    fn feed() -> StaticFeed {
        StaticFeed::new(&["Release 1.3.0\nBackups", "Merge branch dev", "Release 1.2.0\nOld"])
    }

    #[tokio::test]
    async fn test_flow_installs_on_confirm() {
        let h = harness(true);
        let probe = StaticProbe::online();
        let feed = feed();
        let dialog = ScriptedDialog::new(vec![Response::Confirm(true)]);
        let flow = UpdateFlow {
            probe: &probe,
            feed: &feed,
            dialog: &dialog,
            fetcher: &h.fetcher,
            artifacts: release_artifacts(&h.settings, "master"),
            changelog_max_entries: 10,
        };

        assert_eq!(flow.run("1.2.0").await.unwrap(), UpdateOutcome::Installed);
        assert!(dialog.is_exhausted());
        let confirm = dialog.confirmations();
        assert!(confirm[0].contains("Install Release 1.3.0"));
        assert!(confirm[0].contains(" - Backups"));
        assert!(!confirm[0].contains("Merge"));
    }

    #[tokio::test]
    async fn test_flow_declined() {
        let h = harness(true);
        let probe = StaticProbe::online();
        let feed = feed();
        let dialog = ScriptedDialog::new(vec![Response::Confirm(false)]);
        let flow = UpdateFlow {
            probe: &probe,
            feed: &feed,
            dialog: &dialog,
            fetcher: &h.fetcher,
            artifacts: release_artifacts(&h.settings, "master"),
            changelog_max_entries: 10,
        };

        assert_eq!(flow.run("1.2.0").await.unwrap(), UpdateOutcome::Declined);
        assert!(!h.settings.install_dir.join("pinet").exists());
    }

    #[tokio::test]
    async fn test_flow_partial_install_is_failed() {
        let h = harness(false);
        let probe = StaticProbe::online();
        let feed = feed();
        let dialog = ScriptedDialog::new(vec![Response::Confirm(true)]);
        let flow = UpdateFlow {
            probe: &probe,
            feed: &feed,
            dialog: &dialog,
            fetcher: &h.fetcher,
            artifacts: release_artifacts(&h.settings, "master"),
            changelog_max_entries: 10,
        };

        assert_eq!(flow.run("1.2.0").await.unwrap(), UpdateOutcome::Failed);
        assert!(h.settings.install_dir.join("pinet").exists());
    }

    #[tokio::test]
    async fn test_flow_offline_and_up_to_date() {
        let h = harness(true);
        let feed = feed();
        let dialog = ScriptedDialog::new(vec![]);

        let offline = StaticProbe::offline();
        let flow = UpdateFlow {
            probe: &offline,
            feed: &feed,
            dialog: &dialog,
            fetcher: &h.fetcher,
            artifacts: vec![],
            changelog_max_entries: 10,
        };
        assert_eq!(flow.run("1.2.0").await.unwrap(), UpdateOutcome::NoConnection);

        let online = StaticProbe::online();
        let flow = UpdateFlow {
            probe: &online,
            ..flow
        };
        assert_eq!(flow.run("1.3.0").await.unwrap(), UpdateOutcome::UpToDate);
        assert!(dialog.messages().is_empty());
    }

    #[tokio::test]
    async fn test_feed_format_error_aborts_check() {
        let probe = StaticProbe::online();
        let feed = StaticFeed::new(&["Merge only"]);

        let err = check_for_update(&probe, &feed, "1.0.0").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PinetError>(), Some(PinetError::FormatError { .. })));
    }
}
