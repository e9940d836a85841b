//! Update comparison between the installed and published versions.
//!
//! [`is_newer`] decides whether the published ("web") version should be
//! offered as an update over the installed ("local") one. The major
//! component short-circuits: a smaller web major is never newer, whatever
//! its minor and patch. Minor is only consulted when majors are equal, and
//! patch only when minors are equal too.
//!
//! This behaviour is pinned by the tests below and is kept in its own
//! function rather than derived from an ordering so that any future change
//! to update policy is an explicit, reviewed edit here.

use super::Version;
use crate::core::PinetError;

/// Whether `web` should be offered as an update over `local`.
///
/// Both arguments must be `"<int>.<int>.<int>"`; otherwise a
/// [`PinetError::FormatError`] is returned.
///
/// # Examples
///
/// ```rust
/// use pinet_cli::version::is_newer;
///
/// assert!(is_newer("1.2.3", "1.3.0").unwrap());
/// assert!(!is_newer("2.0.0", "1.9.9").unwrap());
/// assert!(is_newer("1.2", "1.2.3").is_err());
/// ```
pub fn is_newer(local: &str, web: &str) -> Result<bool, PinetError> {
    let local = Version::parse(local)?;
    let web = Version::parse(web)?;
    Ok(is_newer_version(&local, &web))
}

/// [`is_newer`] on already-parsed versions.
#[must_use]
pub const fn is_newer_version(local: &Version, web: &Version) -> bool {
    if web.major > local.major {
        return true;
    }
    if web.major < local.major {
        return false;
    }

    if web.minor > local.minor {
        return true;
    }
    if web.minor < local.minor {
        return false;
    }

    web.patch > local.patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_versions_are_not_newer() {
        assert!(!is_newer("1.2.3", "1.2.3").unwrap());
    }

    #[test]
    fn test_minor_bump_is_newer() {
        assert!(is_newer("1.2.3", "1.3.0").unwrap());
    }

    #[test]
    fn test_major_bump_is_newer() {
        assert!(is_newer("1.9.9", "2.0.0").unwrap());
    }

    #[test]
    fn test_patch_bump_is_newer() {
        assert!(is_newer("1.2.3", "1.2.4").unwrap());
    }

    #[test]
    fn test_smaller_major_short_circuits() {
        assert!(!is_newer("2.0.0", "1.9.9").unwrap());
    }

    #[test]
    fn test_smaller_minor_ignores_larger_patch() {
        assert!(!is_newer("1.5.0", "1.4.9").unwrap());
    }

    #[test]
    fn test_malformed_input_fails_instead_of_defaulting() {
        assert!(matches!(is_newer("1.2", "1.2.3"), Err(PinetError::FormatError { .. })));
        assert!(matches!(is_newer("1.2.3", "a.b.c"), Err(PinetError::FormatError { .. })));
        // A malformed local version must not make every release look newer
        assert!(is_newer("garbage", "0.0.1").is_err());
    }
}
