//! In-process transport doubles.
//!
//! [`ScriptedTransport`] plays the remote shell: each write is answered with
//! the response of the first rule matching one of the written lines, and
//! every line is recorded so tests can check what a session sent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{Connector, FileTransfer, Transport};
use crate::paths::RemoteFile;
use crate::subject::Subject;

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    response: String,
}

/// A fake shell answering written lines from a rule table.
pub struct ScriptedTransport {
    rules: Vec<Rule>,
    sent: Arc<Mutex<Vec<String>>>,
    tx: UnboundedSender<Vec<u8>>,
    rx: UnboundedReceiver<Vec<u8>>,
    closed: bool,
}

impl ScriptedTransport {
    /// A transport that prints `greeting` as soon as it is opened.
    pub fn new(greeting: &str) -> Self {
        let (tx, rx) = unbounded_channel();
        if !greeting.is_empty() {
            let _ = tx.send(greeting.as_bytes().to_vec());
        }
        ScriptedTransport {
            rules: Vec::new(),
            sent: Arc::default(),
            tx,
            rx,
            closed: false,
        }
    }

    /// Answer writes containing a line matching `pattern` with `response`.
    /// Rules are tried in the order they were added.
    pub fn on(mut self, pattern: &str, response: &str) -> Result<Self> {
        self.rules.push(Rule {
            pattern: Regex::new(pattern)?,
            response: response.to_string(),
        });
        Ok(self)
    }

    /// Lines written so far, shared with the test.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(anyhow!("transport is closed"));
        }
        let text = String::from_utf8_lossy(data);
        let lines: Vec<&str> = text.lines().collect();
        self.sent
            .lock()
            .extend(lines.iter().map(|line| line.to_string()));
        let response = self
            .rules
            .iter()
            .find(|rule| lines.iter().any(|line| rule.pattern.is_match(line)))
            .map(|rule| rule.response.clone());
        if let Some(response) = response {
            let _ = self.tx.send(response.into_bytes());
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Hands out [`ScriptedTransport`]s built from one rule table.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    greeting: String,
    rules: Vec<Rule>,
    sent: Arc<Mutex<Vec<String>>>,
    refuse: Option<String>,
}

impl ScriptedConnector {
    pub fn new(greeting: &str) -> Self {
        ScriptedConnector {
            greeting: greeting.to_string(),
            ..Default::default()
        }
    }

    pub fn on(mut self, pattern: &str, response: &str) -> Result<Self> {
        self.rules.push(Rule {
            pattern: Regex::new(pattern)?,
            response: response.to_string(),
        });
        Ok(self)
    }

    /// Make every connection attempt fail with `reason`.
    pub fn refusing(mut self, reason: &str) -> Self {
        self.refuse = Some(reason.to_string());
        self
    }

    /// Lines written by every session this connector opened.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, subject: &Subject) -> Result<Box<dyn Transport>> {
        if let Some(reason) = &self.refuse {
            return Err(anyhow!("connection to {} refused: {reason}", subject.destination()));
        }
        let mut transport = ScriptedTransport::new(&self.greeting);
        transport.rules = self.rules.clone();
        transport.sent = self.sent.clone();
        Ok(Box::new(transport))
    }
}

/// One file moved through a [`RecordingTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transferred {
    Upload { local: PathBuf, remote: String },
    Download { remote: String, local: PathBuf },
}

/// A [`FileTransfer`] that only records what it was asked to move.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransfer {
    log: Arc<Mutex<Vec<Transferred>>>,
}

impl RecordingTransfer {
    pub fn transferred(&self) -> Vec<Transferred> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl FileTransfer for RecordingTransfer {
    async fn upload(&self, _subject: &Subject, local: &Path, remote: &RemoteFile) -> Result<()> {
        self.log.lock().push(Transferred::Upload {
            local: local.to_path_buf(),
            remote: remote.shell_path(),
        });
        Ok(())
    }

    async fn download(&self, _subject: &Subject, remote: &str, local: &Path) -> Result<()> {
        self.log.lock().push(Transferred::Download {
            remote: remote.to_string(),
            local: local.to_path_buf(),
        });
        Ok(())
    }
}
