//! Release version handling.
//!
//! PiNet releases are tagged `MAJOR.MINOR.PATCH`. [`Version`] parses these
//! strictly: exactly three dot-separated non-negative integers, surrounding
//! whitespace allowed. Anything else is a [`PinetError::FormatError`]; a
//! malformed version is never treated as `0.0.0`, since that would hide real
//! updates.
//!
//! The update decision uses [`comparison::is_newer`], not [`Ord`].

pub mod comparison;

pub use comparison::is_newer;

use std::fmt;
use std::str::FromStr;

use crate::core::PinetError;

/// A three-part release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl Version {
    /// Construct a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `"<int>.<int>.<int>"` string.
    pub fn parse(input: &str) -> Result<Self, PinetError> {
        let trimmed = input.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();

        if parts.len() != 3 {
            return Err(PinetError::FormatError {
                input: input.to_string(),
                reason: format!("expected 3 dot-separated components, found {}", parts.len()),
            });
        }

        let component = |name: &str, raw: &str| -> Result<u64, PinetError> {
            raw.parse::<u64>().map_err(|_| PinetError::FormatError {
                input: input.to_string(),
                reason: format!("{name} component '{raw}' is not a non-negative integer"),
            })
        };

        Ok(Self {
            major: component("major", parts[0])?,
            minor: component("minor", parts[1])?,
            patch: component("patch", parts[2])?,
        })
    }
}

impl FromStr for Version {
    type Err = PinetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
