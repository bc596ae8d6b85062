//! Expectation-based terminal driver.
//!
//! Commands are written in groups; after each group the driver reads output
//! until one of the group's patterns matches or the timeout elapses. A
//! timeout is reported in the [`TerminalResponse`], never as an error; only
//! transport failures are errors.

use std::io::Write;
use std::time::Duration;

use anyhow::anyhow;
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;
use crate::transport::Transport;

/// Commands plus the output patterns that signal they are done.
#[derive(Debug, Clone, Default)]
pub struct ExpectationGroup {
    commands: Vec<String>,
    expectations: Vec<Regex>,
    failures: Vec<Regex>,
    sensitive: bool,
}

impl ExpectationGroup {
    /// A group that finishes when any of `expectations` matches.
    pub fn new(expectations: Vec<Regex>) -> Self {
        ExpectationGroup {
            expectations,
            ..Default::default()
        }
    }

    pub fn expecting(pattern: &Regex) -> Self {
        Self::new(vec![pattern.clone()])
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Patterns that end the run with [`ResponseCode::Failure`].
    pub fn with_failures(mut self, failures: Vec<Regex>) -> Self {
        self.failures = failures;
        self
    }

    /// Keep this group's commands out of the logs.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    Timeout,
    /// A failure pattern matched.
    Failure,
}

/// Result of [`TerminalDriver::run_groups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalResponse {
    /// Everything read while the groups ran.
    pub output: String,
    pub code: ResponseCode,
    /// Text matched by the last expectation, or by the failure pattern.
    pub matched: Option<String>,
    /// Number of groups that finished successfully.
    pub completed: usize,
}

impl TerminalResponse {
    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }
}

enum Outcome {
    Matched(Option<String>),
    Failed(String),
    TimedOut,
}

/// The last complete line plus the line being received.
///
/// Patterns are tested against this window when a line completes and again
/// after each chunk, so prompts without a trailing newline still match and
/// the cost per chunk stays independent of the total output.
#[derive(Debug, Default)]
struct LineWindow {
    previous: String,
    current: String,
}

impl LineWindow {
    fn text(&self) -> String {
        format!("{}{}", self.previous, self.current)
    }

    fn shift(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    fn clear(&mut self) {
        self.previous.clear();
        self.current.clear();
    }
}

/// Drives one interactive shell.
pub struct TerminalDriver {
    transport: Box<dyn Transport>,
    timeout: Duration,
    sink: Option<Box<dyn Write + Send>>,
    window: LineWindow,
    /// Text received after the last match, not yet scanned.
    pending: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    undecoded: Vec<u8>,
}

impl TerminalDriver {
    pub fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        TerminalDriver {
            transport,
            timeout,
            sink: None,
            window: LineWindow::default(),
            pending: String::new(),
            undecoded: Vec::new(),
        }
    }

    /// Copy all raw output to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `groups` in order, stopping at the first timeout or failure.
    pub async fn run_groups(&mut self, groups: &[ExpectationGroup]) -> Result<TerminalResponse> {
        let mut output = String::new();
        let mut matched = None;
        for (i, group) in groups.iter().enumerate() {
            self.window.clear();
            for command in &group.commands {
                if group.sensitive {
                    debug!(command = "<redacted>", "send");
                } else {
                    debug!(%command, "send");
                }
                self.transport.send(format!("{command}\n").as_bytes()).await?;
            }
            match self.await_group(group, &mut output).await? {
                Outcome::Matched(text) => matched = text,
                Outcome::Failed(text) => {
                    warn!(matched = %text, "failure pattern matched");
                    return Ok(TerminalResponse {
                        output,
                        code: ResponseCode::Failure,
                        matched: Some(text),
                        completed: i,
                    });
                }
                Outcome::TimedOut => {
                    debug!(timeout = ?self.timeout, group = i, "expectation timed out");
                    return Ok(TerminalResponse {
                        output,
                        code: ResponseCode::Timeout,
                        matched: None,
                        completed: i,
                    });
                }
            }
        }
        Ok(TerminalResponse {
            output,
            code: ResponseCode::Success,
            matched,
            completed: groups.len(),
        })
    }

    async fn await_group(&mut self, group: &ExpectationGroup, output: &mut String) -> Result<Outcome> {
        if group.expectations.is_empty() && group.failures.is_empty() {
            return Ok(Outcome::Matched(None));
        }

        let pending = std::mem::take(&mut self.pending);
        if let Some(outcome) = self.scan(&pending, group) {
            return Ok(outcome);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let chunk = match tokio::time::timeout(remaining, self.transport.recv()).await {
                Err(_) => return Ok(Outcome::TimedOut),
                Ok(chunk) => chunk?,
            };
            let Some(bytes) = chunk else {
                return Err(anyhow!("remote shell closed the connection").into());
            };
            self.copy_to_sink(&bytes);
            let text = self.decode(&bytes);
            output.push_str(&text);
            if let Some(outcome) = self.scan(&text, group) {
                return Ok(outcome);
            }
        }
    }

    /// Feed `text` through the line window. On a match, whatever follows the
    /// matching line is kept for the next group.
    fn scan(&mut self, text: &str, group: &ExpectationGroup) -> Option<Outcome> {
        for (i, c) in text.char_indices() {
            self.window.current.push(c);
            if c == '\n' {
                if let Some(outcome) = self.test(group) {
                    self.pending = text[i + 1..].to_string();
                    self.window.clear();
                    return Some(outcome);
                }
                self.window.shift();
            }
        }
        let outcome = self.test(group)?;
        self.window.clear();
        Some(outcome)
    }

    fn test(&self, group: &ExpectationGroup) -> Option<Outcome> {
        let text = self.window.text();
        if let Some(m) = group.failures.iter().find_map(|p| p.find(&text)) {
            return Some(Outcome::Failed(m.as_str().to_string()));
        }
        group
            .expectations
            .iter()
            .find_map(|p| p.find(&text))
            .map(|m| Outcome::Matched(Some(m.as_str().to_string())))
    }

    fn decode(&mut self, bytes: &[u8]) -> String {
        self.undecoded.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.undecoded) {
            Ok(_) => self.undecoded.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                let text = String::from_utf8_lossy(&self.undecoded).into_owned();
                self.undecoded.clear();
                return text;
            }
        };
        let rest = self.undecoded.split_off(valid);
        let text = String::from_utf8_lossy(&self.undecoded).into_owned();
        self.undecoded = rest;
        text
    }

    fn copy_to_sink(&mut self, bytes: &[u8]) {
        if let Some(sink) = &mut self.sink {
            if let Err(e) = sink.write_all(bytes) {
                warn!(error = %e, "failed to write terminal output to log");
            }
        }
    }

    /// Flush the log sink and close the transport.
    pub async fn close(mut self) -> Result<()> {
        if let Some(sink) = &mut self.sink {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "failed to flush terminal log");
            }
        }
        self.transport.close().await?;
        Ok(())
    }
}
