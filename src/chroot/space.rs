//! Disk usage measurement for chroot backups.
//!
//! Both measurements are in kilobytes, matching what `du -s` and `df`
//! report on the server. The check built on them is read-then-act: another
//! process consuming disk between the measurement and the copy is not
//! detected.

use anyhow::{Context, Result, bail};
use std::future::Future;
use std::path::Path;

use crate::shell::{CommandRunner, ShellCommand};

/// Measures tree sizes and free space.
pub trait SpaceProbe: Send + Sync {
    /// Size of the tree at `path` in KB.
    fn usage_kb(&self, path: &Path) -> impl Future<Output = Result<u64>> + Send;

    /// Free space in KB on the filesystem holding `path`.
    fn free_kb(&self, path: &Path) -> impl Future<Output = Result<u64>> + Send;
}

/// Measures with `du` and `df` through a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct DiskSpaceProbe<'a, R> {
    runner: &'a R,
    use_sudo: bool,
}

impl<'a, R: CommandRunner> DiskSpaceProbe<'a, R> {
    /// Create a probe. `use_sudo` is needed to measure a root-owned chroot.
    pub const fn new(runner: &'a R, use_sudo: bool) -> Self {
        Self {
            runner,
            use_sudo,
        }
    }
}

impl<R: CommandRunner> SpaceProbe for DiskSpaceProbe<'_, R> {
    async fn usage_kb(&self, path: &Path) -> Result<u64> {
        let output = self
            .runner
            .run(
                ShellCommand::new("du")
                    .arg("-sk")
                    .arg(path.display().to_string())
                    .privileged(self.use_sudo)
                    .with_context("measure chroot"),
            )
            .await?;
        parse_du_output(&output.stdout)
            .with_context(|| format!("Failed to measure size of {}", path.display()))
    }

    async fn free_kb(&self, path: &Path) -> Result<u64> {
        let output = self
            .runner
            .run(
                ShellCommand::new("df")
                    .arg("-Pk")
                    .arg(path.display().to_string())
                    .with_context("measure free space"),
            )
            .await?;
        parse_df_output(&output.stdout)
            .with_context(|| format!("Failed to measure free space at {}", path.display()))
    }
}

/// Parse `du -sk` output: `<kb>\t<path>`.
pub fn parse_du_output(output: &str) -> Result<u64> {
    let Some(first) = output.split_whitespace().next() else {
        bail!("Unexpected du output: '{}'", output.trim());
    };
    first.parse().with_context(|| format!("Unexpected du output: '{}'", output.trim()))
}

/// Parse `df -Pk` output: a header line, then
/// `<filesystem> <1024-blocks> <used> <available> <capacity> <mount>`.
pub fn parse_df_output(output: &str) -> Result<u64> {
    let Some(available) = output.lines().nth(1).and_then(|l| l.split_whitespace().nth(3)) else {
        bail!("Unexpected df output: '{}'", output.trim());
    };
    available.parse().context("Failed to parse available space")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::SystemRunner;
    use crate::test_utils::RecordingRunner;
    use tempfile::TempDir;

    #[test]
    fn test_parse_du_output() {
        assert_eq!(parse_du_output("500000\t/opt/ltsp/armhf\n").unwrap(), 500_000);
        assert!(parse_du_output("").is_err());
        assert!(parse_du_output("du: cannot access").is_err());
    }

    const DF_OUTPUT: &str = "Filesystem     1024-blocks     Used Available Capacity Mounted on
/dev/mmcblk0p2    30466528 12345678   2000000      87% /
";

    #[test]
    fn test_parse_df_output() {
        assert_eq!(parse_df_output(DF_OUTPUT).unwrap(), 2_000_000);
        assert!(parse_df_output("Filesystem 1024-blocks Used Available Capacity Mounted on\n").is_err());
        assert!(parse_df_output("Filesystem\n/dev/sda1 100 50 lots 50% /\n").is_err());
        assert!(parse_df_output("Filesystem\n/dev/sda1 100\n").is_err());
    }

    #[tokio::test]
    async fn test_free_space_uses_portable_df() {
        let runner = RecordingRunner::new().with_output("df", DF_OUTPUT);
        let probe = DiskSpaceProbe::new(&runner, false);

        assert_eq!(probe.free_kb(Path::new("/opt/ltsp/armhf")).await.unwrap(), 2_000_000);
        assert_eq!(runner.commands(), vec!["df -Pk /opt/ltsp/armhf"]);
    }

    #[tokio::test]
    async fn test_disk_probe_measures_real_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("file"), vec![0u8; 64 * 1024]).unwrap();

        let runner = SystemRunner;
        let probe = DiskSpaceProbe::new(&runner, false);

        assert!(probe.usage_kb(temp.path()).await.unwrap() >= 64);
        assert!(probe.free_kb(temp.path()).await.unwrap() > 0);
    }
}
