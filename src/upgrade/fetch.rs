//! Downloading files from the PiNet repositories.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use tokio::fs;

use crate::core::PinetError;

/// Fetches the body of a URL.
pub trait Fetcher: Send + Sync {
    /// Download `url` and return its body.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Download `url` as text.
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send {
        async move {
            let body = self.fetch(url).await?;
            Ok(String::from_utf8_lossy(&body).into_owned())
        }
    }
}

/// [`Fetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Fetcher using `client`.
    pub const fn new(client: reqwest::Client) -> Self {
        Self {
            client,
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let network = |reason: String| PinetError::NetworkError {
            operation: format!("downloading {url}"),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {status}")).into());
        }

        let body = response.bytes().await.map_err(|e| network(e.to_string()))?;
        tracing::debug!(target: "upgrade", "Downloaded {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}

/// Download `url` to `destination`.
///
/// The body is written next to the destination first and renamed over it,
/// so a failed download never leaves a truncated file behind. `mode` sets
/// the unix permissions of the result; without it only the owner can read it.
pub async fn download_to<F: Fetcher>(
    fetcher: &F,
    url: &str,
    destination: &Path,
    mode: Option<u32>,
) -> Result<()> {
    let body = fetcher.fetch(url).await?;

    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let partial = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    fs::write(partial.path(), &body)
        .await
        .with_context(|| format!("Failed to write {}", partial.path().display()))?;

    if let Some(mode) = mode {
        set_mode(partial.path(), mode).await?;
    }

    partial
        .persist(destination)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", destination.display()))?;

    tracing::debug!(target: "upgrade", "Saved {} to {}", url, destination.display());
    Ok(())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticFetcher;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_download_to_writes_file() {
        let temp = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new().with("http://x/pinet", "#!/bin/bash\n");
        let dest = temp.path().join("bin/pinet");

        download_to(&fetcher, "http://x/pinet", &dest, Some(0o755)).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "#!/bin/bash\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn test_failed_download_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pinet");
        std::fs::write(&dest, "old").unwrap();

        let err = download_to(&StaticFetcher::new(), "http://x/missing", &dest, None).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<PinetError>(), Some(PinetError::NetworkError { .. })));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_download_replaces_file_without_leftovers() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pinet");
        std::fs::write(&dest, "old").unwrap();
        let fetcher = StaticFetcher::new().with("http://x/pinet", "new");

        download_to(&fetcher, "http://x/pinet", &dest, None).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new");
        let names: Vec<_> = std::fs::read_dir(temp.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("pinet")]);
    }
}
