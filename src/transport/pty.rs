use anyhow::{Context, Result};
use async_trait::async_trait;
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};
use std::io::Write;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use super::reader::spawn_reader;
use super::{Connector, Transport};
use crate::record::MAX_LINE_WIDTH;
use crate::subject::Subject;

/// Manages a remote shell running inside a PTY
pub struct PtySession {
    #[allow(dead_code)]
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output: UnboundedReceiver<Vec<u8>>,
}

impl PtySession {
    /// Spawn `command` in a PTY as wide as the interpreter's line limit
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        let pty_system = portable_pty::native_pty_system();

        let pty_size = PtySize {
            rows: 24,
            cols: MAX_LINE_WIDTH as u16,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(pty_size)
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(command);
        for arg in args {
            cmd.arg(arg);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn {command}"))?;

        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;

        Ok(PtySession {
            master: pair.master,
            child,
            writer,
            output: spawn_reader(reader),
        })
    }

    /// Check if the child process is still running
    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }
}

#[async_trait]
impl Transport for PtySession {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.output.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        if self.is_running() {
            self.child.kill().context("Failed to stop remote shell")?;
        }
        self.child.wait().context("Failed to reap remote shell")?;
        Ok(())
    }
}

/// Opens sessions by spawning a shell command in a PTY.
#[derive(Debug, Clone)]
pub struct PtyConnector {
    program: String,
    args: Vec<String>,
    append_destination: bool,
}

impl PtyConnector {
    /// `ssh -tt user@host`, relying on already configured key authentication.
    pub fn ssh() -> Self {
        PtyConnector {
            program: "ssh".to_string(),
            args: vec!["-tt".to_string()],
            append_destination: true,
        }
    }

    /// Run an arbitrary command; the subject's destination is not appended.
    pub fn command(program: impl Into<String>, args: Vec<String>) -> Self {
        PtyConnector {
            program: program.into(),
            args,
            append_destination: false,
        }
    }
}

#[async_trait]
impl Connector for PtyConnector {
    async fn connect(&self, subject: &Subject) -> Result<Box<dyn Transport>> {
        let mut args = self.args.clone();
        if self.append_destination {
            args.push(subject.destination());
        }
        debug!(program = %self.program, ?args, "spawning remote shell");
        let session = PtySession::spawn(&self.program, &args)?;
        Ok(Box::new(session))
    }
}
