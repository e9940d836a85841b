//! Release feed reader.
//!
//! PiNet publishes releases as commits whose message starts with
//! `Release X.Y.Z`. The GitHub Atom feed of commits on the release branch
//! is the update signal: the newest entry gives the latest version, and
//! the entries down to the installed version form the changelog.
//!
//! Each `<entry>` carries an HTML-escaped `<content>` element. Its visible
//! text, split on newlines, gives the entry's lines.

use anyhow::{Context, Result};
use regex::Regex;
use std::future::Future;

use crate::core::PinetError;
use crate::version::Version;

/// One commit from the release feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// Text lines of the commit message
    pub lines: Vec<String>,
}

impl ReleaseEntry {
    /// Build an entry from its message text.
    pub fn from_text(text: &str) -> Self {
        let mut lines: Vec<String> = text.split('\n').map(|l| l.trim_end().to_string()).collect();

        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        let leading_blank = lines.iter().take_while(|l| l.is_empty()).count();
        lines.drain(..leading_blank);

        Self {
            lines,
        }
    }

    /// First line of the message.
    #[must_use]
    pub fn title(&self) -> &str {
        self.lines.first().map_or("", String::as_str)
    }

    /// Every line after the first.
    #[must_use]
    pub fn details(&self) -> &[String] {
        self.lines.get(1..).unwrap_or_default()
    }

    /// Tag from the first line starting with `Release `, if any.
    ///
    /// The tag is returned as written; [`FeedSource::latest_version`] checks
    /// that it parses.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.lines
            .iter()
            .find_map(|l| l.strip_prefix("Release "))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }

    /// Whether this is a merge commit.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.title().starts_with("Merge")
    }
}

/// Source of release feed entries, newest first.
pub trait FeedSource: Send + Sync {
    /// Fetch every entry currently in the feed.
    fn fetch_entries(&self) -> impl Future<Output = Result<Vec<ReleaseEntry>>> + Send;

    /// Version declared by the newest entry.
    ///
    /// Fails with [`PinetError::FormatError`] when the newest entry has no
    /// `Release ` line or its tag is not a three-part version.
    fn latest_version(&self) -> impl Future<Output = Result<String>> + Send {
        async move {
            let entries = self.fetch_entries().await?;
            let first = entries.first().ok_or_else(|| PinetError::FormatError {
                input: "release feed".to_string(),
                reason: "the feed has no entries".to_string(),
            })?;

            let tag = first.version().ok_or_else(|| PinetError::FormatError {
                input: first.title().to_string(),
                reason: "the newest entry has no 'Release' line".to_string(),
            })?;
            Version::parse(tag)?;
            Ok(tag.to_string())
        }
    }

    /// Entries newer than `current_version`, newest first.
    ///
    /// Re-fetches the feed on every call. See [`select_changelog`].
    fn changelog_since(
        &self,
        current_version: &str,
        max_entries: usize,
    ) -> impl Future<Output = Result<Vec<ReleaseEntry>>> + Send {
        async move {
            let entries = self.fetch_entries().await?;
            Ok(select_changelog(entries, current_version, max_entries))
        }
    }
}

/// Pick changelog entries from a feed.
///
/// Walks from the newest entry and stops at the entry whose version equals
/// `current_version`, or once `max_entries` entries have been examined.
/// Merge commits are skipped. The result never exceeds `max_entries`.
pub fn select_changelog(
    entries: Vec<ReleaseEntry>,
    current_version: &str,
    max_entries: usize,
) -> Vec<ReleaseEntry> {
    let current_version = current_version.trim();
    entries
        .into_iter()
        .take(max_entries)
        .take_while(|e| e.version() != Some(current_version))
        .filter(|e| !e.is_merge())
        .collect()
}

/// Render entries the way the release history dialog shows them.
#[must_use]
pub fn render_changelog(entries: &[ReleaseEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry.title());
        out.push('\n');
        for line in entry.details() {
            out.push_str(" - ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Parse an Atom feed document into entries.
pub fn parse_feed(document: &str) -> Result<Vec<ReleaseEntry>> {
    if !document.contains("<feed") {
        return Err(PinetError::FormatError {
            input: "release feed".to_string(),
            reason: "the response is not an Atom feed".to_string(),
        }
        .into());
    }

    let entry_re = Regex::new(r"(?s)<entry\b[^>]*>(.*?)</entry>").context("Invalid entry pattern")?;
    let content_re =
        Regex::new(r"(?s)<content\b[^>]*>(.*?)</content>").context("Invalid content pattern")?;
    let tag_re = Regex::new(r"(?s)<[^>]*>").context("Invalid tag pattern")?;

    let mut entries = Vec::new();
    for entry in entry_re.captures_iter(document) {
        let Some(content) = content_re.captures(&entry[1]) else {
            continue;
        };
        let raw = content[1].trim();

        let html = match raw.strip_prefix("<![CDATA[").and_then(|s| s.strip_suffix("]]>")) {
            Some(cdata) => cdata.to_string(),
            None => unescape_entities(raw),
        };
        let text = unescape_entities(&tag_re.replace_all(&html, ""));
        entries.push(ReleaseEntry::from_text(&text));
    }

    Ok(entries)
}

/// Decode the XML/HTML entities GitHub uses in feeds.
fn unescape_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];

        let decoded = after.find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &after[1..end];
            let ch = match name {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Reads the release feed over HTTP.
#[derive(Debug, Clone)]
pub struct ReleaseFeed {
    client: reqwest::Client,
    url: String,
}

impl ReleaseFeed {
    /// Feed at `url`, fetched with `client`.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Feed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeedSource for ReleaseFeed {
    async fn fetch_entries(&self) -> Result<Vec<ReleaseEntry>> {
        tracing::debug!(target: "upgrade", "Fetching release feed {}", self.url);

        let network = |reason: String| PinetError::NetworkError {
            operation: "fetching release feed".to_string(),
            reason,
        };

        let response = self.client.get(&self.url).send().await.map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("{} returned HTTP {status}", self.url)).into());
        }

        let body = response.text().await.map_err(|e| network(e.to_string()))?;
        parse_feed(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en-US">
  <title>Recent Commits to pinet:master</title>
  <entry>
    <title>Release 1.3.0</title>
    <content type="html">&lt;pre style=&#39;white-space:pre-wrap;width:81ex&#39;&gt;Release 1.3.0

Added backup manager
Fixed &amp;quot;quotes&amp;quot;&lt;/pre&gt;</content>
  </entry>
  <entry>
    <title>Merge pull request #12</title>
    <content type="html">&lt;pre&gt;Merge pull request #12 from someone/branch&lt;/pre&gt;</content>
  </entry>
  <entry>
    <title>Release 1.2.3</title>
    <content type="html">&lt;pre&gt;Release 1.2.3
Small fixes&lt;/pre&gt;</content>
  </entry>
  <entry>
    <title>Release 1.2.2</title>
    <content type="html"><![CDATA[<pre>Release 1.2.2</pre>]]></content>
  </entry>
</feed>"#;

    fn entry(text: &str) -> ReleaseEntry {
        ReleaseEntry::from_text(text)
    }

    #[test]
    fn test_parse_feed_extracts_entries() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].title(), "Release 1.3.0");
        assert_eq!(entries[0].version(), Some("1.3.0"));
        assert_eq!(entries[0].details(), &["", "Added backup manager", "Fixed \"quotes\""]);
        assert!(entries[1].is_merge());
        assert_eq!(entries[3].version(), Some("1.2.2"));
    }

    #[test]
    fn test_parse_feed_rejects_non_feed() {
        let err = parse_feed("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err.downcast_ref::<PinetError>(), Some(PinetError::FormatError { .. })));
    }

    #[test]
    fn test_version_uses_first_release_line() {
        let e = entry("Fix typo\nRelease 2.0.1   \nRelease 9.9.9");
        assert_eq!(e.version(), Some("2.0.1"));
        assert_eq!(entry("No release here").version(), None);
    }

    #[test]
    fn test_version_needs_release_word_and_tag() {
        assert_eq!(entry("Releasenotes updated").version(), None);
        assert_eq!(entry("Release").version(), None);
        assert_eq!(entry("Release   ").version(), None);
    }

    #[test]
    fn test_changelog_stops_at_current_version_and_skips_merges() {
        let entries = parse_feed(FEED).unwrap();
        let changelog = select_changelog(entries, "1.2.3", 10);
        assert_eq!(changelog.len(), 1);
        assert_eq!(changelog[0].title(), "Release 1.3.0");
    }

    #[test]
    fn test_changelog_never_exceeds_max_entries() {
        let entries: Vec<ReleaseEntry> =
            (0..25).map(|i| entry(&format!("Release 1.0.{}", 100 - i))).collect();
        let changelog = select_changelog(entries, "0.0.1", 10);
        assert_eq!(changelog.len(), 10);

        let changelog = select_changelog(parse_feed(FEED).unwrap(), "0.0.1", 2);
        assert_eq!(changelog.len(), 1, "merge within the examined window is dropped");
    }

    #[test]
    fn test_changelog_excludes_merge_entries() {
        let entries = vec![entry("Merge branch 'dev'"), entry("Release 1.1.0"), entry("Merge x")];
        let changelog = select_changelog(entries, "1.0.0", 10);
        assert!(changelog.iter().all(|e| !e.is_merge()));
        assert_eq!(changelog.len(), 1);
    }

    #[test]
    fn test_render_changelog() {
        let rendered = render_changelog(&[entry("Release 1.3.0\nAdded X\nFixed Y")]);
        assert_eq!(rendered, "Release 1.3.0\n - Added X\n - Fixed Y\n\n");
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(unescape_entities("a &lt;b&gt; &amp; &#39;c&#39; &#x41;"), "a <b> & 'c' A");
        assert_eq!(unescape_entities("fish & chips"), "fish & chips");
        assert_eq!(unescape_entities("&unknown;"), "&unknown;");
    }

    struct StaticFeed<'a>(&'a str);

    impl FeedSource for StaticFeed<'_> {
        async fn fetch_entries(&self) -> Result<Vec<ReleaseEntry>> {
            parse_feed(self.0)
        }
    }

    #[tokio::test]
    async fn test_latest_version_from_source() {
        assert_eq!(StaticFeed(FEED).latest_version().await.unwrap(), "1.3.0");
    }

    #[tokio::test]
    async fn test_latest_version_empty_feed_is_format_error() {
        let err = StaticFeed("<feed></feed>").latest_version().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PinetError>(), Some(PinetError::FormatError { .. })));
    }

    #[tokio::test]
    async fn test_latest_version_without_release_line_is_format_error() {
        let feed = r#"<feed><entry><content type="html">Merge stuff</content></entry></feed>"#;
        let err = StaticFeed(feed).latest_version().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PinetError>(), Some(PinetError::FormatError { .. })));
    }

    #[tokio::test]
    async fn test_latest_version_rejects_unparseable_release_lines() {
        for content in ["Releasenotes updated", "Release", "Release candidate"] {
            let feed = format!(r#"<feed><entry><content type="html">{content}</content></entry></feed>"#);

            let err = StaticFeed(&feed).latest_version().await.unwrap_err();
            assert!(
                matches!(err.downcast_ref::<PinetError>(), Some(PinetError::FormatError { .. })),
                "{content:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_network_error() {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let feed = ReleaseFeed::new(client, "http://127.0.0.1:9/feed.atom");

        let err = feed.latest_version().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PinetError>(), Some(PinetError::NetworkError { .. })));
    }
}
