//! Installing a new PiNet release.
//!
//! An update replaces two files in the install directory: the `pinet`
//! launcher and the `pinet_functions_python.py` helper. Each download is
//! attempted and reported on its own; the update only counts as installed
//! when every artifact succeeded.

use std::path::PathBuf;

use super::fetch::{Fetcher, download_to};
use crate::config::Settings;

/// A file installed by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Short name for reports
    pub name: String,
    /// Where it is downloaded from
    pub url: String,
    /// Where it is installed
    pub destination: PathBuf,
    /// Unix permissions after install
    pub mode: u32,
}

/// Outcome of installing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    /// The artifact
    pub artifact: Artifact,
    /// `None` on success, otherwise the failure
    pub error: Option<String>,
}

impl ArtifactReport {
    /// Whether the artifact was installed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Artifacts making up a release on `branch`.
#[must_use]
pub fn release_artifacts(settings: &Settings, branch: &str) -> Vec<Artifact> {
    vec![
        Artifact {
            name: "pinet".to_string(),
            url: settings.raw_url(branch, "pinet"),
            destination: settings.install_dir.join("pinet"),
            mode: 0o755,
        },
        Artifact {
            name: "pinet_functions_python.py".to_string(),
            url: settings.raw_url(branch, "Scripts/pinet_functions_python.py"),
            destination: settings.install_dir.join("pinet_functions_python.py"),
            mode: 0o644,
        },
    ]
}

/// Downloads and installs release artifacts.
pub struct SelfUpdater<'a, F> {
    fetcher: &'a F,
    artifacts: Vec<Artifact>,
}

impl<'a, F: Fetcher> SelfUpdater<'a, F> {
    /// Updater for `artifacts`.
    pub const fn new(fetcher: &'a F, artifacts: Vec<Artifact>) -> Self {
        Self {
            fetcher,
            artifacts,
        }
    }

    /// Install every artifact, continuing past failures.
    pub async fn install(&self) -> Vec<ArtifactReport> {
        let mut reports = Vec::with_capacity(self.artifacts.len());

        for artifact in &self.artifacts {
            let result =
                download_to(self.fetcher, &artifact.url, &artifact.destination, Some(artifact.mode)).await;

            let error = match result {
                Ok(()) => {
                    tracing::info!(target: "upgrade", "Installed {}", artifact.destination.display());
                    None
                }
                Err(e) => {
                    tracing::error!(target: "upgrade", "Failed to install {}: {:#}", artifact.name, e);
                    Some(format!("{e:#}"))
                }
            };

            reports.push(ArtifactReport {
                artifact: artifact.clone(),
                error,
            });
        }

        reports
    }
}

/// Whether every artifact was installed.
#[must_use]
pub fn all_succeeded(reports: &[ArtifactReport]) -> bool {
    reports.iter().all(ArtifactReport::succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticFetcher;
    use tempfile::TempDir;

    fn settings(temp: &TempDir) -> Settings {
        Settings {
            install_dir: temp.path().to_path_buf(),
            raw_repository_base: "http://raw".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_release_artifacts_urls() {
        let settings = Settings::default();
        let artifacts = release_artifacts(&settings, "dev");
        assert_eq!(artifacts[0].url, "https://raw.github.com/pinet/pinet/dev/pinet");
        assert_eq!(
            artifacts[1].url,
            "https://raw.github.com/pinet/pinet/dev/Scripts/pinet_functions_python.py"
        );
        assert_eq!(artifacts[0].destination, PathBuf::from("/usr/local/bin/pinet"));
    }

    #[tokio::test]
    async fn test_install_all_artifacts() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        let fetcher = StaticFetcher::new()
            .with("http://raw/pinet/master/pinet", "launcher")
            .with("http://raw/pinet/master/Scripts/pinet_functions_python.py", "helpers");

        let updater = SelfUpdater::new(&fetcher, release_artifacts(&settings, "master"));
        let reports = updater.install().await;

        assert!(all_succeeded(&reports));
        assert_eq!(std::fs::read_to_string(temp.path().join("pinet")).unwrap(), "launcher");
        assert_eq!(std::fs::read_to_string(temp.path().join("pinet_functions_python.py")).unwrap(), "helpers");
    }

    #[tokio::test]
    async fn test_one_failure_fails_overall_but_others_install() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        let fetcher = StaticFetcher::new().with("http://raw/pinet/master/pinet", "launcher");

        let reports = SelfUpdater::new(&fetcher, release_artifacts(&settings, "master")).install().await;

        assert_eq!(reports.len(), 2);
        assert!(reports[0].succeeded());
        assert!(!reports[1].succeeded());
        assert!(!all_succeeded(&reports));
        assert!(temp.path().join("pinet").exists());
    }
}
