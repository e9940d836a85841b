//! In-memory implementations of the crate's traits.

use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::chroot::SpaceProbe;
use crate::core::PinetError;
use crate::dialog::{Dialog, MenuOption, RecoveryChoice};
use crate::shell::{CommandOutput, CommandRunner, ShellCommand};
use crate::upgrade::{ConnectivityProbe, FeedSource, Fetcher, ReleaseEntry};

use super::LogCapture;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Records commands instead of running them.
///
/// Every command succeeds with empty output unless configured otherwise.
/// Failures are matched on the program name, ignoring `sudo` and chroot
/// wrapping.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ShellCommand>>,
    failing: HashSet<String>,
    fail_counts: Mutex<HashMap<String, usize>>,
    outputs: HashMap<String, String>,
}

impl RecordingRunner {
    /// Runner where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run of `program` fail.
    pub fn fail_on(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    /// Make the first `times` runs of `program` fail.
    pub fn fail_times(self, program: &str, times: usize) -> Self {
        lock(&self.fail_counts).insert(program.to_string(), times);
        self
    }

    /// Return `stdout` from every run of `program`.
    pub fn with_output(mut self, program: &str, stdout: &str) -> Self {
        self.outputs.insert(program.to_string(), stdout.to_string());
        self
    }

    /// Command lines run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls).iter().map(ShellCommand::command_line).collect()
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<ShellCommand> {
        lock(&self.calls).clone()
    }

    fn should_fail(&self, program: &str) -> bool {
        if self.failing.contains(program) {
            return true;
        }
        let mut counts = lock(&self.fail_counts);
        match counts.get_mut(program) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, command: ShellCommand) -> Result<CommandOutput> {
        let program = command.program().to_string();
        let command_line = command.command_line();
        lock(&self.calls).push(command);

        if self.should_fail(&program) {
            return Err(PinetError::ProcessError {
                command: command_line,
                code: Some(1),
                stderr: "simulated failure".to_string(),
            }
            .into());
        }

        Ok(CommandOutput {
            stdout: self.outputs.get(&program).cloned().unwrap_or_default(),
            stderr: String::new(),
        })
    }
}

/// A scripted answer for [`ScriptedDialog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer to `confirm` / `confirm_with`
    Confirm(bool),
    /// Answer to `prompt`
    Prompt(Option<String>),
    /// Answer to `select`
    Select(Option<String>),
    /// Answer to `multiselect`
    Multi(Option<Vec<String>>),
    /// Answer to `choose_recovery`
    Recovery(RecoveryChoice),
}

/// Dialog answering from a fixed script.
///
/// Messages need no answer and are only recorded. Any other question takes
/// the next scripted response and fails the test if it has the wrong kind
/// or the script has run out.
#[derive(Debug, Default)]
pub struct ScriptedDialog {
    responses: Mutex<Vec<Response>>,
    messages: Mutex<Vec<String>>,
    confirmations: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
    log: Option<LogCapture>,
    logs_seen: Mutex<Vec<String>>,
}

impl ScriptedDialog {
    /// Dialog answering with `responses`, in order.
    pub fn new(mut responses: Vec<Response>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            ..Self::default()
        }
    }

    /// Snapshot `log` each time a message is shown or a question is asked.
    pub fn observing(mut self, log: LogCapture) -> Self {
        self.log = Some(log);
        self
    }

    /// What the observed log held when each dialog appeared, in order.
    pub fn logs_seen(&self) -> Vec<String> {
        lock(&self.logs_seen).clone()
    }

    fn snapshot_log(&self) {
        if let Some(log) = &self.log {
            lock(&self.logs_seen).push(log.contents());
        }
    }

    /// Messages shown, as `title\ntext`.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    /// Confirmations asked, as `title\ntext\n[yes/no]`.
    pub fn confirmations(&self) -> Vec<String> {
        lock(&self.confirmations).clone()
    }

    /// Titles of every question asked, including confirmations.
    pub fn questions(&self) -> Vec<String> {
        lock(&self.questions).clone()
    }

    /// Whether every scripted response was used.
    pub fn is_exhausted(&self) -> bool {
        lock(&self.responses).is_empty()
    }

    fn next(&self, title: &str) -> Result<Response> {
        self.snapshot_log();
        lock(&self.questions).push(title.to_string());
        lock(&self.responses).pop().ok_or_else(|| anyhow!("unexpected dialog '{title}'"))
    }
}

impl Dialog for ScriptedDialog {
    async fn message(&self, title: &str, text: &str) -> Result<()> {
        self.snapshot_log();
        lock(&self.messages).push(format!("{title}\n{text}"));
        Ok(())
    }

    async fn confirm_with(&self, title: &str, text: &str, yes_label: &str, no_label: &str) -> Result<bool> {
        lock(&self.confirmations).push(format!("{title}\n{text}\n[{yes_label}/{no_label}]"));
        match self.next(title)? {
            Response::Confirm(answer) => Ok(answer),
            other => Err(anyhow!("expected a confirmation for '{title}', script has {other:?}")),
        }
    }

    async fn prompt(&self, title: &str, _text: &str) -> Result<Option<String>> {
        match self.next(title)? {
            Response::Prompt(answer) => Ok(answer),
            other => Err(anyhow!("expected a prompt for '{title}', script has {other:?}")),
        }
    }

    async fn select(&self, title: &str, _text: &str, _options: &[MenuOption]) -> Result<Option<String>> {
        match self.next(title)? {
            Response::Select(answer) => Ok(answer),
            other => Err(anyhow!("expected a menu for '{title}', script has {other:?}")),
        }
    }

    async fn multiselect(&self, title: &str, _text: &str, _options: &[MenuOption]) -> Result<Option<Vec<String>>> {
        match self.next(title)? {
            Response::Multi(answer) => Ok(answer),
            other => Err(anyhow!("expected a checklist for '{title}', script has {other:?}")),
        }
    }

    async fn choose_recovery(&self, title: &str, _text: &str) -> Result<RecoveryChoice> {
        match self.next(title)? {
            Response::Recovery(choice) => Ok(choice),
            other => Err(anyhow!("expected a recovery choice for '{title}', script has {other:?}")),
        }
    }
}

/// Space probe with fixed answers.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpace {
    usage_kb: u64,
    free_kb: u64,
}

impl FixedSpace {
    /// Probe reporting `usage_kb` for any tree and `free_kb` for any volume.
    pub const fn new(usage_kb: u64, free_kb: u64) -> Self {
        Self {
            usage_kb,
            free_kb,
        }
    }
}

impl SpaceProbe for FixedSpace {
    async fn usage_kb(&self, _path: &Path) -> Result<u64> {
        Ok(self.usage_kb)
    }

    async fn free_kb(&self, _path: &Path) -> Result<u64> {
        Ok(self.free_kb)
    }
}

/// Connectivity probe answering from a fixed set of reachable URLs.
#[derive(Debug, Default)]
pub struct StaticProbe {
    reachable: Option<HashSet<String>>,
    checked: Mutex<Vec<String>>,
}

impl StaticProbe {
    /// Every URL is reachable.
    pub fn online() -> Self {
        Self::default()
    }

    /// No URL is reachable.
    pub fn offline() -> Self {
        Self::reachable(&[])
    }

    /// Only `urls` are reachable.
    pub fn reachable(urls: &[&str]) -> Self {
        Self {
            reachable: Some(urls.iter().map(|u| (*u).to_string()).collect()),
            checked: Mutex::default(),
        }
    }

    /// URLs checked so far, in order.
    pub fn checked(&self) -> Vec<String> {
        lock(&self.checked).clone()
    }
}

impl ConnectivityProbe for StaticProbe {
    async fn check_site(&self, url: &str) -> bool {
        lock(&self.checked).push(url.to_string());
        self.reachable.as_ref().is_none_or(|set| set.contains(url))
    }
}

/// Release feed served from memory.
#[derive(Debug, Clone)]
pub struct StaticFeed {
    entries: Vec<ReleaseEntry>,
}

impl StaticFeed {
    /// Feed with one entry per commit message, newest first.
    pub fn new(messages: &[&str]) -> Self {
        Self {
            entries: messages.iter().map(|m| ReleaseEntry::from_text(m)).collect(),
        }
    }
}

impl FeedSource for StaticFeed {
    async fn fetch_entries(&self) -> Result<Vec<ReleaseEntry>> {
        Ok(self.entries.clone())
    }
}

/// Fetcher serving fixed bodies. Unknown URLs fail with a network error.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    /// Fetcher with no URLs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    pub fn with(mut self, url: impl Into<String>, body: impl AsRef<[u8]>) -> Self {
        self.bodies.insert(url.into(), body.as_ref().to_vec());
        self
    }
}

impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.bodies.get(url).cloned().ok_or_else(|| {
            PinetError::NetworkError {
                operation: format!("downloading {url}"),
                reason: "HTTP 404 Not Found".to_string(),
            }
            .into()
        })
    }
}
