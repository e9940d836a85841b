//! Anonymous usage statistics.
//!
//! When PiNet checks for updates it posts a small report to the PiNet
//! metrics server: a random server ID, the PiNet and boot file versions,
//! the number of pupil accounts, the release channel, the external IP and
//! whatever location details the operator chose to share. Setting
//! `DisableMetrics=true` in `/etc/pinet` blanks everything but the ID and
//! IP. Upload failures are logged and otherwise ignored.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::config::MISSING_VALUE;
use crate::constants::{METRICS_TIMEOUT, UNKNOWN_IP};
use crate::context::{PinetContext, build_http_client};
use crate::dialog::{Dialog, MenuOption};
use crate::upgrade::installed_version;
use crate::upgrade::kernel::parse_boot_version;

const PASSWD_FILE: &str = "/etc/passwd";
const BLANK: &str = "Blank";

/// Organisation types offered to the operator.
pub const ORGANISATION_TYPES: &[&str] = &[
    "Blank",
    "School",
    "Non Commercial Organisation",
    "Commercial Organisation",
    "Raspberry Jam/Club",
    "N/A",
];

/// The report posted to the metrics server, field names as the server
/// expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    #[serde(rename = "ServerID")]
    pub server_id: String,
    #[serde(rename = "PiNetVersion")]
    pub pinet_version: String,
    #[serde(rename = "Users")]
    pub users: String,
    #[serde(rename = "KernelVersion")]
    pub kernel_version: String,
    #[serde(rename = "ReleaseChannel")]
    pub release_channel: String,
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "OrganisationType")]
    pub organisation_type: String,
    #[serde(rename = "OrganisationName")]
    pub organisation_name: String,
}

impl StatsReport {
    /// The report sent when metrics are disabled: only the ID and IP survive.
    #[must_use]
    pub fn blanked(self) -> Self {
        Self {
            server_id: self.server_id,
            pinet_version: "0.0.0".to_string(),
            users: "0".to_string(),
            kernel_version: "000".to_string(),
            release_channel: "0".to_string(),
            ip_address: self.ip_address,
            city: BLANK.to_string(),
            organisation_type: BLANK.to_string(),
            organisation_name: BLANK.to_string(),
        }
    }
}

/// A random 11-digit server ID.
#[must_use]
pub fn generate_server_id() -> u64 {
    let random = u128::from_le_bytes(*uuid::Uuid::new_v4().as_bytes());
    10_000_000_000 + (random % 90_000_000_000) as u64
}

/// Replace every run of non-alphanumeric characters with `_`. Blank input
/// becomes `Blank`.
pub fn sanitize(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(BLANK.to_string());
    }
    let re = Regex::new(r"[^0-9A-Za-z]+").context("Invalid sanitize pattern")?;
    Ok(re.replace_all(input, "_").into_owned())
}

/// Count pupil accounts in `/etc/passwd` content: a UID of four or more
/// digits and a home directory under `/home`.
#[must_use]
pub fn count_users(passwd: &str) -> usize {
    passwd
        .lines()
        .filter(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            fields.len() > 5 && fields[2].len() > 3 && fields[5].starts_with("/home")
        })
        .count()
}

/// Builds and sends statistics reports.
pub struct StatsCollector<'a> {
    ctx: &'a PinetContext,
    passwd_file: PathBuf,
    piboot_version_file: Option<PathBuf>,
}

impl<'a> StatsCollector<'a> {
    pub fn new(ctx: &'a PinetContext, piboot_version_file: Option<PathBuf>) -> Self {
        Self {
            ctx,
            passwd_file: PathBuf::from(PASSWD_FILE),
            piboot_version_file,
        }
    }

    /// Read accounts from `path` instead of `/etc/passwd`.
    #[must_use]
    pub fn with_passwd_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.passwd_file = path.into();
        self
    }

    /// The stored server ID, generating and storing one if there is none.
    pub async fn server_id(&self) -> Result<String> {
        let stored = self.ctx.store.get("ServerID").await?;
        if stored != MISSING_VALUE {
            return Ok(stored);
        }

        let id = generate_server_id().to_string();
        self.ctx.store.set("ServerID", &id).await?;
        tracing::debug!(target: "stats", "Generated server ID");
        Ok(id)
    }

    /// Build the report from the config store and the system.
    pub async fn build_report(&self) -> Result<StatsReport> {
        let store = &self.ctx.store;
        let server_id = self.server_id().await?;
        let ip_address = self.external_ip().await;

        let report = StatsReport {
            server_id,
            pinet_version: installed_version(&self.ctx.settings.install_dir)
                .await?
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
            users: self.user_count().await.to_string(),
            kernel_version: self.kernel_version().await,
            release_channel: store.get("ReleaseChannel").await?,
            ip_address,
            city: store.get("City").await?,
            organisation_type: store.get("OrganisationType").await?,
            organisation_name: store.get("OrganisationName").await?,
        };

        if store.get_flag("DisableMetrics").await? {
            tracing::debug!(target: "stats", "Metrics disabled, sending blank report");
            return Ok(report.blanked());
        }
        Ok(report)
    }

    /// Build and post the report. Network failures are logged, not returned.
    pub async fn send(&self) -> Result<StatsReport> {
        let report = self.build_report().await?;
        let client = build_http_client(METRICS_TIMEOUT)?;

        match client.post(&self.ctx.settings.metrics_url).form(&report).send().await {
            Ok(response) => {
                tracing::debug!(target: "stats", "Metrics server answered {}", response.status());
            }
            Err(e) => tracing::warn!(target: "stats", "Failed to upload stats: {}", e),
        }
        Ok(report)
    }

    /// Like [`send`](Self::send), but any failure is logged and dropped.
    ///
    /// Used after an update check, where stats must never change the result.
    pub async fn send_or_log(&self) -> Option<StatsReport> {
        match self.send().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(target: "stats", "Skipping stats upload: {:#}", e);
                None
            }
        }
    }

    async fn external_ip(&self) -> String {
        let lookup = async {
            let client = self.ctx.http_client()?;
            let body = client.get(&self.ctx.settings.ip_lookup_url).send().await?.text().await?;
            let ip: IpAddr = body.trim().parse()?;
            anyhow::Ok(ip.to_string())
        };

        match lookup.await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::debug!(target: "stats", "External IP lookup failed: {}", e);
                UNKNOWN_IP.to_string()
            }
        }
    }

    async fn user_count(&self) -> usize {
        match tokio::fs::read_to_string(&self.passwd_file).await {
            Ok(content) => count_users(&content),
            Err(e) => {
                tracing::debug!(target: "stats", "Cannot read {}: {}", self.passwd_file.display(), e);
                0
            }
        }
    }

    async fn kernel_version(&self) -> String {
        let Some(path) = self.piboot_version_file.as_deref() else {
            return "000".to_string();
        };
        read_boot_version(path).await.unwrap_or_else(|| "000".to_string())
    }
}

async fn read_boot_version(path: &Path) -> Option<String> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    parse_boot_version(&content).ok().map(|v| v.to_string())
}

/// Show the one-time statistics notice, then ask for the extra details.
/// Returns whether the notice was shown.
pub async fn check_stats_notification<D: Dialog>(ctx: &PinetContext, dialog: &D) -> Result<bool> {
    if ctx.store.get_flag("ShownStatsNotification").await? {
        return Ok(false);
    }

    dialog
        .message(
            "Stats",
            "Please be aware PiNet collects very basic usage stats. These stats are uploaded to the secure PiNet metrics server over an encrypted connection. The stats logged are PiNet version, Raspbian kernel version, number of users, development channel (stable or dev), external IP address, a randomly generated unique ID and any additional information you choose to add. These stats are uploaded in the background when PiNet checks for updates. Should you wish to disable the stats, set DisableMetrics=true in /etc/pinet.",
        )
        .await?;
    ctx.store.set("ShownStatsNotification", "true").await?;

    ask_extra_info(ctx, dialog).await?;
    Ok(true)
}

/// Ask for city and organisation details and store them sanitised.
pub async fn ask_extra_info<D: Dialog>(ctx: &PinetContext, dialog: &D) -> Result<()> {
    dialog
        .message(
            "Additional information",
            "So we can start plotting schools and organisations using PiNet on a map, feel free to add some extra information to your PiNet server. If you do not want to attach any extra information, simply leave the following prompts blank.",
        )
        .await?;

    let city = dialog
        .prompt(
            "Nearest major city",
            "To help with putting a dot on the map for your server, what is your nearest major town or city? Leave blank if you don't want to answer.",
        )
        .await?
        .unwrap_or_default();

    let options: Vec<MenuOption> = ORGANISATION_TYPES.iter().map(|t| MenuOption::tag_only(*t)).collect();
    let organisation_type = dialog
        .select(
            "Organisation type",
            "What type of organisation are you setting PiNet up for? Leave on blank if you don't want to answer.",
            &options,
        )
        .await?
        .unwrap_or_default();

    let organisation_name = dialog
        .prompt(
            "School/organisation name",
            "What is the name of your organisation? Leave blank if you don't want to answer.",
        )
        .await?
        .unwrap_or_default();

    ctx.store.set("City", &sanitize(&city)?).await?;
    ctx.store.set("OrganisationType", &sanitize(&organisation_type)?).await?;
    ctx.store.set("OrganisationName", &sanitize(&organisation_name)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Response, ScriptedDialog, test_context};

    const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash
teacher:x:1000:1000:Teacher:/home/teacher:/bin/bash
pupil1:x:1001:1001::/home/pupil1:/bin/bash
nobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin
svc:x:999:999::/home/svc:/bin/false
";

    async fn offline_context(store: &str) -> (tempfile::TempDir, PinetContext) {
        let (temp, mut ctx) = test_context(store).await;
        ctx.settings.ip_lookup_url = "http://127.0.0.1:9/".to_string();
        ctx.settings.connect_timeout_secs = 1;
        (temp, ctx)
    }

    #[tokio::test]
    async fn test_send_or_log_swallows_report_failures() {
        let (_temp, ctx) = offline_context("").await;
        // An unreadable parameter store makes the report itself fail
        std::fs::remove_file(&ctx.settings.config_file).unwrap();
        std::fs::create_dir(&ctx.settings.config_file).unwrap();

        let collector = StatsCollector::new(&ctx, None);
        assert!(collector.send().await.is_err());
        assert!(collector.send_or_log().await.is_none());
    }

    #[test]
    fn test_server_id_has_eleven_digits() {
        for _ in 0..100 {
            assert_eq!(generate_server_id().to_string().len(), 11);
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("St. Albans, UK").unwrap(), "St_Albans_UK");
        assert_eq!(sanitize("Raspberry Jam/Club").unwrap(), "Raspberry_Jam_Club");
        assert_eq!(sanitize("  ").unwrap(), "Blank");
    }

    #[test]
    fn test_count_users() {
        assert_eq!(count_users(PASSWD), 2);
    }

    #[test]
    fn test_blanked_keeps_id_and_ip() {
        let report = StatsReport {
            server_id: "12345678901".to_string(),
            pinet_version: "1.2.3".to_string(),
            users: "30".to_string(),
            kernel_version: "42".to_string(),
            release_channel: "Dev".to_string(),
            ip_address: "192.0.2.1".to_string(),
            city: "Leeds".to_string(),
            organisation_type: "School".to_string(),
            organisation_name: "Hill_Top".to_string(),
        }
        .blanked();

        assert_eq!(report.server_id, "12345678901");
        assert_eq!(report.ip_address, "192.0.2.1");
        assert_eq!(
            (report.pinet_version.as_str(), report.users.as_str(), report.kernel_version.as_str()),
            ("0.0.0", "0", "000")
        );
        assert_eq!(report.organisation_name, "Blank");
    }

    #[tokio::test]
    async fn test_server_id_generated_once() {
        let (_temp, ctx) = offline_context("").await;
        let collector = StatsCollector::new(&ctx, None);

        let first = collector.server_id().await.unwrap();
        assert_eq!(first.len(), 11);
        assert_eq!(collector.server_id().await.unwrap(), first);
        assert_eq!(ctx.store.get("ServerID").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_build_report_from_store() {
        let (temp, ctx) = offline_context("ServerID=12345678901\nCity=Leeds\nReleaseChannel=Dev\n").await;
        std::fs::create_dir_all(&ctx.settings.install_dir).unwrap();
        std::fs::write(ctx.settings.install_dir.join("pinet"), "version=1.2.3\n").unwrap();
        let passwd = temp.path().join("passwd");
        std::fs::write(&passwd, PASSWD).unwrap();
        let boot = temp.path().join("version.txt");
        std::fs::write(&boot, "17\n").unwrap();

        let report =
            StatsCollector::new(&ctx, Some(boot)).with_passwd_file(&passwd).build_report().await.unwrap();

        assert_eq!(report.server_id, "12345678901");
        assert_eq!(report.pinet_version, "1.2.3");
        assert_eq!(report.users, "2");
        assert_eq!(report.kernel_version, "17");
        assert_eq!(report.release_channel, "Dev");
        assert_eq!(report.city, "Leeds");
        assert_eq!(report.organisation_name, "None");
        assert_eq!(report.ip_address, UNKNOWN_IP);
    }

    #[tokio::test]
    async fn test_disabled_metrics_blank_report() {
        let (_temp, ctx) = offline_context("ServerID=12345678901\nCity=Leeds\nDisableMetrics=true\n").await;
        let report = StatsCollector::new(&ctx, None).build_report().await.unwrap();
        assert_eq!(report.city, "Blank");
        assert_eq!(report.pinet_version, "0.0.0");
    }

    #[tokio::test]
    async fn test_notification_shown_once_and_answers_sanitised() {
        let (_temp, ctx) = offline_context("").await;
        let dialog = ScriptedDialog::new(vec![
            Response::Prompt(Some("Milton Keynes".to_string())),
            Response::Select(Some("Raspberry Jam/Club".to_string())),
            Response::Prompt(None),
        ]);

        assert!(check_stats_notification(&ctx, &dialog).await.unwrap());
        assert!(!check_stats_notification(&ctx, &dialog).await.unwrap());

        assert_eq!(ctx.store.get("City").await.unwrap(), "Milton_Keynes");
        assert_eq!(ctx.store.get("OrganisationType").await.unwrap(), "Raspberry_Jam_Club");
        assert_eq!(ctx.store.get("OrganisationName").await.unwrap(), "Blank");
        assert_eq!(dialog.messages().len(), 2);
    }
}
