//! Configuration for PiNet.
//!
//! Two layers of configuration are involved:
//!
//! - [`Settings`]: this tool's own TOML settings (paths, endpoints, timeouts).
//!   Optional; every field has a default.
//! - [`ConfigStore`]: the flat `key=value` file at `/etc/pinet` shared with
//!   the PiNet shell scripts. It holds operator choices such as the release
//!   channel, NBD flags and statistics preferences.
//!
//! [`ReleaseChannel`] is resolved from the store once, when the
//! [`PinetContext`](crate::context::PinetContext) is built.

pub mod settings;
pub mod store;

pub use settings::Settings;
pub use store::{ConfigStore, MISSING_VALUE, MatchMode};

use std::fmt;

/// Which branch of the PiNet repositories updates are taken from.
///
/// Stored in `/etc/pinet` as `ReleaseChannel=Stable`, `ReleaseChannel=Dev` or
/// `ReleaseChannel=Custom:<branch>`. Anything unrecognised, including a
/// missing key, means stable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReleaseChannel {
    /// The `master` branch
    #[default]
    Stable,
    /// The `dev` branch
    Dev,
    /// Any other branch, chosen by the operator
    Custom(String),
}

impl ReleaseChannel {
    /// Parse the stored value. Matching is case-insensitive.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let lower = value.to_ascii_lowercase();

        if lower == "stable" {
            Self::Stable
        } else if lower == "dev" {
            Self::Dev
        } else if lower.starts_with("custom:") {
            let branch = value["custom:".len()..].trim();
            if branch.is_empty() {
                Self::Stable
            } else {
                Self::Custom(branch.to_string())
            }
        } else {
            Self::Stable
        }
    }

    /// Git branch for this channel.
    #[must_use]
    pub fn branch(&self) -> &str {
        match self {
            Self::Stable => "master",
            Self::Dev => "dev",
            Self::Custom(branch) => branch,
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "Stable"),
            Self::Dev => write!(f, "Dev"),
            Self::Custom(branch) => write!(f, "Custom:{branch}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_channel_parse() {
        assert_eq!(ReleaseChannel::parse("Stable"), ReleaseChannel::Stable);
        assert_eq!(ReleaseChannel::parse("dev"), ReleaseChannel::Dev);
        assert_eq!(
            ReleaseChannel::parse("Custom:feature-x"),
            ReleaseChannel::Custom("feature-x".to_string())
        );
        assert_eq!(ReleaseChannel::parse("None"), ReleaseChannel::Stable);
        assert_eq!(ReleaseChannel::parse("Custom:"), ReleaseChannel::Stable);
    }

    #[test]
    fn test_release_channel_branch() {
        assert_eq!(ReleaseChannel::Stable.branch(), "master");
        assert_eq!(ReleaseChannel::Dev.branch(), "dev");
        assert_eq!(ReleaseChannel::Custom("jessie".into()).branch(), "jessie");
    }

    #[test]
    fn test_release_channel_display_round_trips() {
        for channel in [
            ReleaseChannel::Stable,
            ReleaseChannel::Dev,
            ReleaseChannel::Custom("Beta2".into()),
        ] {
            assert_eq!(ReleaseChannel::parse(&channel.to_string()), channel);
        }
    }
}
