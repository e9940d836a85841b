//! Internet reachability checks.
//!
//! [`ConnectivityProbe::is_online`] is the quick check run before every
//! update check. [`full_status_report`] checks each site PiNet depends on
//! and tags it with how much PiNet needs it.

use anyhow::Result;
use std::fmt;
use std::future::Future;

use crate::constants::CONNECTIVITY_PROBE_HOSTS;
use crate::dialog::Dialog;

/// How much PiNet depends on a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Criticality {
    /// Installation and updates cannot work without it
    Critical,
    /// Most features need it
    HighlyRecommended,
    /// Some optional features need it
    Recommended,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::HighlyRecommended => write!(f, "highly recommended"),
            Self::Recommended => write!(f, "recommended"),
        }
    }
}

/// A site PiNet depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    /// Human readable name
    pub name: &'static str,
    /// URL fetched to test reachability
    pub url: &'static str,
    /// How much PiNet needs it
    pub criticality: Criticality,
}

/// Every site checked by the full status report.
pub const SITES: &[Site] = &[
    Site {
        name: "Raspbian archive key",
        url: "http://archive.raspbian.org/raspbian.public.key",
        criticality: Criticality::Critical,
    },
    Site {
        name: "Raspberry Pi archive key",
        url: "http://archive.raspberrypi.org/debian/raspberrypi.gpg.key",
        criticality: Criticality::Critical,
    },
    Site {
        name: "GitHub",
        url: "https://github.com",
        criticality: Criticality::Critical,
    },
    Site {
        name: "Bit.ly",
        url: "http://bit.ly",
        criticality: Criticality::HighlyRecommended,
    },
    Site {
        name: "BitBucket",
        url: "https://bitbucket.org",
        criticality: Criticality::Recommended,
    },
    Site {
        name: "PiNet metrics",
        url: "https://secure.pinet.org.uk",
        criticality: Criticality::Recommended,
    },
];

/// Reachability of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteStatus {
    /// The site checked
    pub site: Site,
    /// Whether it answered
    pub reachable: bool,
}

/// What the full status report means for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusVerdict {
    /// Every site answered
    AllReachable,
    /// Only optional sites are unreachable
    Degraded(Vec<Site>),
    /// At least one critical site is unreachable
    Blocked(Vec<Site>),
}

/// Checks whether URLs can be fetched.
pub trait ConnectivityProbe: Send + Sync {
    /// Whether `url` answered at all.
    fn check_site(&self, url: &str) -> impl Future<Output = bool> + Send;

    /// Quick internet check. Tries each probe host in order and stops at the
    /// first one that answers.
    fn is_online(&self) -> impl Future<Output = bool> + Send {
        async move {
            for host in CONNECTIVITY_PROBE_HOSTS {
                if self.check_site(host).await {
                    tracing::debug!(target: "network", "Online ({} answered)", host);
                    return true;
                }
            }
            tracing::debug!(target: "network", "No probe host answered");
            false
        }
    }
}

/// Probe backed by HTTP GET requests.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Probe using `client`, whose connect timeout bounds every check.
    pub const fn new(client: reqwest::Client) -> Self {
        Self {
            client,
        }
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn check_site(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                tracing::trace!(target: "network", "{} answered {}", url, response.status());
                true
            }
            Err(e) => {
                tracing::debug!(target: "network", "{} unreachable: {}", url, e);
                false
            }
        }
    }
}

/// Check every site in [`SITES`].
pub async fn full_status_report<P: ConnectivityProbe>(probe: &P) -> Vec<SiteStatus> {
    let mut report = Vec::with_capacity(SITES.len());
    for site in SITES {
        let reachable = probe.check_site(site.url).await;
        report.push(SiteStatus {
            site: *site,
            reachable,
        });
    }
    report
}

/// Classify a status report.
#[must_use]
pub fn evaluate_report(report: &[SiteStatus]) -> StatusVerdict {
    let unreachable: Vec<Site> = report.iter().filter(|s| !s.reachable).map(|s| s.site).collect();

    if unreachable.is_empty() {
        StatusVerdict::AllReachable
    } else if unreachable.iter().any(|s| s.criticality == Criticality::Critical) {
        StatusVerdict::Blocked(unreachable)
    } else {
        StatusVerdict::Degraded(unreachable)
    }
}

/// Render a status report as one line per site.
#[must_use]
pub fn render_report(report: &[SiteStatus]) -> String {
    report
        .iter()
        .map(|s| {
            let state = if s.reachable { "OK" } else { "UNREACHABLE" };
            format!("{:<26} {:<12} ({})", s.site.name, state, s.site.criticality)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the full status check and decide whether to proceed.
///
/// A blocked report is shown and returns `false`. A degraded report asks
/// the operator whether to continue anyway.
pub async fn full_status_check<P, D>(probe: &P, dialog: &D) -> Result<bool>
where
    P: ConnectivityProbe,
    D: Dialog,
{
    let report = full_status_report(probe).await;
    match evaluate_report(&report) {
        StatusVerdict::AllReachable => Ok(true),
        StatusVerdict::Blocked(sites) => {
            tracing::error!(target: "network", "{} site(s) unreachable, including critical ones", sites.len());
            dialog
                .message(
                    "Network check failed",
                    &format!(
                        "PiNet cannot reach sites it needs to work. Check the server's internet connection and any proxy or firewall.\n\n{}",
                        render_report(&report)
                    ),
                )
                .await?;
            Ok(false)
        }
        StatusVerdict::Degraded(sites) => {
            tracing::warn!(target: "network", "{} optional site(s) unreachable", sites.len());
            dialog
                .confirm(
                    "Network check",
                    &format!(
                        "Some sites PiNet uses are unreachable. Some features may not work.\n\n{}\n\nContinue anyway?",
                        render_report(&report)
                    ),
                )
                .await
        }
    }
}
