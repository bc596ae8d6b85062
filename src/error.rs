//! Error types shared by the engine.

use std::time::Duration;

use crate::record::RecordError;

/// Errors raised while building a command queue or driving a session.
///
/// An expectation timeout is not an error at the driver level (see
/// [`crate::terminal::ResponseCode`]); the executor only turns it into
/// [`Error::Timeout`] for steps that cannot continue without a prompt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connecting to, reading from or writing to the transport failed.
    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    /// Rejected at adder build time (blank names, bad extensions, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A step that needs a prompt never saw one.
    #[error("timed out after {waited:?} waiting for {step}")]
    Timeout { step: String, waited: Duration },

    /// The interpreter rejected the login.
    #[error("login failed: {matched}")]
    LoginFailed { matched: String },

    /// The interpreter reported an error banner or failing tests.
    #[error("command execution failed for {script}: {reason}")]
    CommandFailed { script: String, reason: String },
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
