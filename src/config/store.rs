//! Flat `key=value` parameter store.
//!
//! `/etc/pinet` is shared with the PiNet shell scripts, so the format is kept
//! deliberately simple: one `Key=Value` pair per line, no sections, no
//! quoting. Lookups match lines that start with `Key=`; a missing key reads as
//! the literal string `"None"`, which is what the scripts expect.
//!
//! Writes rewrite the whole file in place. There is no atomic replace, so a
//! crash mid-write can leave a truncated file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Value returned for keys that are absent or empty.
pub const MISSING_VALUE: &str = "None";

/// Which match wins when a key appears on several lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The first matching line
    First,
    /// The last matching line (the default for most call sites)
    Last,
}

/// Handle to a `key=value` parameter file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a handle for the store at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value, last match wins. Returns `"None"` when missing.
    pub async fn get(&self, key: &str) -> Result<String> {
        self.get_with(key, MatchMode::Last).await
    }

    /// Read a value, first match wins. Returns `"None"` when missing.
    pub async fn get_first(&self, key: &str) -> Result<String> {
        self.get_with(key, MatchMode::First).await
    }

    /// Read a value using an explicit [`MatchMode`].
    pub async fn get_with(&self, key: &str, mode: MatchMode) -> Result<String> {
        let lines = self.read_lines().await?;
        Ok(lookup(&lines, key, mode))
    }

    /// Read a boolean flag. Only a case-insensitive `true` counts as set.
    pub async fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.eq_ignore_ascii_case("true"))
    }

    /// Set `key` to `value`, replacing the existing line or appending a new one.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut lines = self.read_lines().await?;
        set_line(&mut lines, key, value);
        debug!("Setting {}={} in {}", key, value, self.path.display());
        self.write_lines(&lines).await
    }

    /// Replace every line containing `search` with `line`, or append `line`
    /// if nothing matched.
    pub async fn replace_line_or_add(&self, search: &str, line: &str) -> Result<()> {
        let mut lines = self.read_lines().await?;
        replace_line_or_add(&mut lines, search, line);
        self.write_lines(&lines).await
    }

    /// Substitute `search` with `replacement` inside every line.
    pub async fn replace_bit(&self, search: &str, replacement: &str) -> Result<()> {
        let lines: Vec<String> = self
            .read_lines()
            .await?
            .into_iter()
            .map(|l| l.replace(search, replacement))
            .collect();
        self.write_lines(&lines).await
    }

    /// Whether any line contains `search`.
    pub async fn contains(&self, search: &str) -> Result<bool> {
        Ok(self.read_lines().await?.iter().any(|l| l.contains(search)))
    }

    async fn read_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(|l| l.trim_end().to_string()).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read config file {}", self.path.display())),
        }
    }

    async fn write_lines(&self, lines: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write config file {}", self.path.display()))
    }
}

/// Find the value for `key` among `lines`.
pub fn lookup(lines: &[String], key: &str, mode: MatchMode) -> String {
    let prefix = format!("{key}=");
    let mut matches = lines.iter().filter_map(|l| l.trim_start().strip_prefix(&prefix));

    let value = match mode {
        MatchMode::First => matches.next(),
        MatchMode::Last => matches.last(),
    };

    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => MISSING_VALUE.to_string(),
    }
}

/// Replace the first line whose key is `key`, or append `key=value`.
pub fn set_line(lines: &mut Vec<String>, key: &str, value: &str) {
    let prefix = format!("{key}=");
    let new_line = format!("{key}={value}");

    match lines.iter_mut().find(|l| l.trim_start().starts_with(&prefix)) {
        Some(existing) => *existing = new_line,
        None => lines.push(new_line),
    }
}

/// Replace every line containing `search`, or append `line`.
pub fn replace_line_or_add(lines: &mut Vec<String>, search: &str, line: &str) {
    let mut found = false;
    for existing in lines.iter_mut().filter(|l| l.contains(search)) {
        *existing = line.to_string();
        found = true;
    }
    if !found {
        lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_lookup_missing_key_returns_none_string() {
        assert_eq!(lookup(&lines("NBD=true"), "Foo", MatchMode::Last), "None");
    }

    #[test]
    fn test_lookup_empty_value_returns_none_string() {
        assert_eq!(lookup(&lines("ServerID="), "ServerID", MatchMode::Last), "None");
    }

    #[test]
    fn test_lookup_first_and_last() {
        let content = lines("Key=one\nOther=x\nKey=two");
        assert_eq!(lookup(&content, "Key", MatchMode::First), "one");
        assert_eq!(lookup(&content, "Key", MatchMode::Last), "two");
    }

    #[test]
    fn test_lookup_does_not_match_key_suffix() {
        let content = lines("NBDuse=false\nNBD=true");
        assert_eq!(lookup(&content, "NBD", MatchMode::First), "true");
        assert_eq!(lookup(&content, "NBDuse", MatchMode::First), "false");
    }

    #[test]
    fn test_set_line_replaces_instead_of_duplicating() {
        let mut content = lines("Foo=old\nBar=1");
        set_line(&mut content, "Foo", "new");
        assert_eq!(content, lines("Foo=new\nBar=1"));
    }

    #[test]
    fn test_replace_line_or_add_appends_when_absent() {
        let mut content = lines("A=1");
        replace_line_or_add(&mut content, "SOCKET_GROUP", "SOCKET_GROUP=teacher");
        assert_eq!(content, lines("A=1\nSOCKET_GROUP=teacher"));

        replace_line_or_add(&mut content, "SOCKET_GROUP", "SOCKET_GROUP=staff");
        assert_eq!(content, lines("A=1\nSOCKET_GROUP=staff"));
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("pinet"));

        assert_eq!(store.get("Foo").await.unwrap(), "None");
        store.set("Foo", "bar").await.unwrap();
        assert_eq!(store.get("Foo").await.unwrap(), "bar");

        store.set("Foo", "baz").await.unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("Foo=").count(), 1);
        assert_eq!(store.get("Foo").await.unwrap(), "baz");
    }

    #[tokio::test]
    async fn test_get_flag() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("pinet"));
        store.set("NBD", "True").await.unwrap();
        store.set("NBDuse", "false").await.unwrap();

        assert!(store.get_flag("NBD").await.unwrap());
        assert!(!store.get_flag("NBDuse").await.unwrap());
        assert!(!store.get_flag("Missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_bit_and_contains() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("epoptes");
        std::fs::write(&path, "SOCKET_GROUP=staff\n").unwrap();
        let store = ConfigStore::new(&path);

        store.replace_bit("staff", "teacher").await.unwrap();
        assert!(store.contains("SOCKET_GROUP=teacher").await.unwrap());
        assert!(!store.contains("staff").await.unwrap());
    }
}
