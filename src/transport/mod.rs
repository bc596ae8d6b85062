//! Connections to the remote host.
//!
//! A [`Transport`] is one interactive shell; a [`Connector`] opens them.
//! Files move separately through a [`FileTransfer`].

mod pty;
mod reader;
mod scp;
mod scripted;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::paths::RemoteFile;
use crate::subject::Subject;

pub use pty::{PtyConnector, PtySession};
pub use reader::spawn_reader;
pub use scp::ScpTransfer;
pub use scripted::{RecordingTransfer, ScriptedConnector, ScriptedTransport, Transferred};

/// A connected interactive shell. Reads and writes are strictly sequential.
#[async_trait]
pub trait Transport: Send {
    /// Write raw bytes to the shell's input.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait for the next chunk of output; `None` once the shell has gone away.
    ///
    /// Must be cancel-safe: the driver drops this future when an expectation
    /// times out.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens an already-authenticated shell for a subject.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, subject: &Subject) -> Result<Box<dyn Transport>>;
}

/// Bulk file movement that bypasses the terminal.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn upload(&self, subject: &Subject, local: &Path, remote: &RemoteFile) -> Result<()>;

    /// `remote` is a shell path such as `$cer_temp/x.lis`.
    async fn download(&self, subject: &Subject, remote: &str, local: &Path) -> Result<()>;
}
