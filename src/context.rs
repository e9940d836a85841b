//! Runtime context shared by every operation.
//!
//! [`PinetContext`] is built once in the CLI and passed by reference to
//! every operation. It bundles the loaded [`Settings`], the `/etc/pinet`
//! [`ConfigStore`] and the release channel resolved from it.

use anyhow::{Context, Result};

use crate::config::{ConfigStore, ReleaseChannel, Settings};
use crate::shell::ShellCommand;

/// Settings, config store and resolved release channel.
#[derive(Debug, Clone)]
pub struct PinetContext {
    /// Tool settings
    pub settings: Settings,
    /// The shared `key=value` store
    pub store: ConfigStore,
    /// Release channel resolved from the store at startup
    pub channel: ReleaseChannel,
}

impl PinetContext {
    /// Build the context, reading the release channel from the store.
    pub async fn build(settings: Settings) -> Result<Self> {
        let store = ConfigStore::new(&settings.config_file);
        let channel = ReleaseChannel::parse(&store.get("ReleaseChannel").await?);
        tracing::debug!("Release channel {} (branch {})", channel, channel.branch());

        Ok(Self {
            settings,
            store,
            channel,
        })
    }

    /// Branch updates are taken from.
    #[must_use]
    pub fn branch(&self) -> &str {
        self.channel.branch()
    }

    /// A command run on the server, with `sudo` if configured.
    pub fn host_command(&self, program: &str) -> ShellCommand {
        ShellCommand::new(program).privileged(self.settings.use_sudo)
    }

    /// A command run inside the client chroot.
    pub fn chroot_command(&self, program: &str) -> ShellCommand {
        ShellCommand::new(program)
            .in_chroot(&self.settings.chroot_arch)
            .privileged(self.settings.use_sudo)
    }

    /// HTTP client with the configured connect timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        build_http_client(self.settings.connect_timeout())
    }
}

/// HTTP client with the PiNet user agent and the given connect timeout.
pub fn build_http_client(connect_timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(concat!("pinet/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
