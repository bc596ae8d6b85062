//! The [`CommandQueue`] and the [`QueueAdder`] trait its intents implement.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::{self, RemoteFile};
use crate::record::SharedRecord;
use crate::registry::EngineContext;

/// Printed before each reply document an execution captures.
pub const REPLY_BEGIN_MARKER: &str = ">>>CCLEXPECT-REPLY-BEGIN<<<";
/// Printed after each reply document an execution captures.
pub const REPLY_END_MARKER: &str = ">>>CCLEXPECT-REPLY-END<<<";

/// An interpreter statement that prints `marker` on a line of its own.
///
/// The marker is split in two so the echoed input line never contains it.
pub fn echo_marker(marker: &str) -> String {
    let (head, tail) = marker.split_at(marker.len() / 2);
    format!("call echo(concat(\"{head}\", \"{tail}\"))")
}

/// One intent's contribution to the in-session phase.
#[derive(Debug, Clone)]
pub struct InSessionCommand {
    script: String,
    commands: Vec<String>,
    check_tests: bool,
    captures: Vec<SharedRecord>,
}

impl InSessionCommand {
    pub fn new(script: impl Into<String>, commands: Vec<String>) -> Self {
        InSessionCommand {
            script: script.into(),
            commands,
            check_tests: false,
            captures: Vec::new(),
        }
    }

    /// Fail when the output reports failing tests.
    pub fn checking_tests(mut self) -> Self {
        self.check_tests = true;
        self
    }

    /// Records to fill from the reply documents, in output order.
    pub fn capturing(mut self, captures: Vec<SharedRecord>) -> Self {
        self.captures = captures;
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn check_tests(&self) -> bool {
        self.check_tests
    }

    pub fn captures(&self) -> &[SharedRecord] {
        &self.captures
    }
}

/// A local file and where it goes on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: RemoteFile,
}

/// A remote file fetched after a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Shell path, e.g. `$cer_temp/x.lis`.
    pub remote: String,
    pub local: PathBuf,
}

/// Everything one session will do, split into phases.
///
/// Built by committing [`QueueAdder`]s; run by
/// [`SessionExecutor::execute`](crate::executor::SessionExecutor::execute).
pub struct CommandQueue {
    context: Arc<EngineContext>,
    pre_session: Vec<String>,
    in_session: Vec<InSessionCommand>,
    post_session: Vec<String>,
    uploads: Vec<Upload>,
    downloads: Vec<Download>,
    generated: Vec<PathBuf>,
    scratch: Option<TempDir>,
    requires_identity: bool,
}

impl CommandQueue {
    pub fn new(context: Arc<EngineContext>) -> Self {
        CommandQueue {
            context,
            pre_session: Vec::new(),
            in_session: Vec::new(),
            post_session: Vec::new(),
            uploads: Vec::new(),
            downloads: Vec::new(),
            generated: Vec::new(),
            scratch: None,
            requires_identity: false,
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Commit `adder` to this queue.
    pub fn add(&mut self, adder: Box<dyn QueueAdder>) -> Result<()> {
        debug!(intent = adder.name(), "adding to queue");
        adder.add_to(self)
    }

    /// Run `command` at the OS shell before the interpreter starts.
    pub fn add_pre_session(&mut self, command: impl Into<String>) {
        self.pre_session.push(command.into());
    }

    pub(crate) fn push_in_session(&mut self, command: InSessionCommand) {
        self.in_session.push(command);
    }

    pub(crate) fn push_post_session(&mut self, command: String) {
        self.post_session.push(command);
    }

    /// Queue `local` for upload to the directory the path resolver picks.
    pub(crate) fn push_upload(&mut self, local: &Path) -> Result<()> {
        let remote = paths::resolve(local, self.context.registry())?;
        self.push_upload_to(local, remote);
        Ok(())
    }

    /// Queue `local` for upload to an already resolved `remote`.
    pub(crate) fn push_upload_to(&mut self, local: &Path, remote: RemoteFile) {
        debug!(local = %local.display(), remote = %remote.shell_path(), "queued upload");
        self.uploads.push(Upload {
            local: local.to_path_buf(),
            remote,
        });
    }

    pub(crate) fn push_download(&mut self, download: Download) {
        self.downloads.push(download);
    }

    /// Private directory for files generated while building this queue.
    /// Created on first use and removed with the queue.
    pub(crate) fn scratch_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.scratch {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new().prefix("cclexpect-").tempdir()?;
        let path = dir.path().to_path_buf();
        debug!(scratch = %path.display(), "created scratch directory");
        self.scratch = Some(dir);
        Ok(path)
    }

    pub(crate) fn push_generated(&mut self, path: PathBuf) {
        self.generated.push(path);
    }

    pub(crate) fn require_identity(&mut self) {
        self.requires_identity = true;
    }

    pub fn pre_session(&self) -> &[String] {
        &self.pre_session
    }

    pub fn in_session(&self) -> &[InSessionCommand] {
        &self.in_session
    }

    pub fn post_session(&self) -> &[String] {
        &self.post_session
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    pub fn downloads(&self) -> &[Download] {
        &self.downloads
    }

    /// Files written into the scratch directory. They are deleted when the
    /// queue is dropped.
    pub fn generated_files(&self) -> &[PathBuf] {
        &self.generated
    }

    /// Whether some intent needs the interpreter login.
    pub fn requires_identity(&self) -> bool {
        self.requires_identity
    }

    /// True when nothing has to run in a terminal.
    pub fn is_terminal_free(&self) -> bool {
        self.pre_session.is_empty() && self.in_session.is_empty() && self.post_session.is_empty()
    }
}

/// One intent that contributes to a [`CommandQueue`].
///
/// To add an intent:
///
/// 1. Define `pub const NAME: &'static str` on the struct, the plan-file
///    keyword used by the parser.
/// 2. Give it an inherent `commit(self, &mut CommandQueue)`; taking `self`
///    makes each builder single-use.
/// 3. Re-export it from `src/commands/mod.rs` and add
///    `(MyIntent::NAME, MyIntent::parse_boxed)` to the registry in
///    [`crate::parser`].
pub trait QueueAdder: 'static {
    /// The intent name, available through a trait object.
    fn name(&self) -> &'static str;

    /// Parse the intent from the plan-file arguments after its keyword.
    fn parse(args: &str) -> Result<Self>
    where
        Self: Sized;

    /// Parse and box. This is the function-pointer type the parser registry
    /// stores.
    fn parse_boxed(args: &str) -> Result<Box<dyn QueueAdder>>
    where
        Self: Sized,
    {
        Ok(Box::new(Self::parse(args)?))
    }

    /// Commit through a trait object.
    fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> Result<()>;
}

/// Reject blank names.
pub(crate) fn require_name(what: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid(format!("{what} must not be blank")));
    }
    Ok(name.to_string())
}

/// Reject paths that are not existing files.
pub(crate) fn require_file(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::invalid("file path must not be blank"));
    }
    if !path.is_file() {
        return Err(Error::invalid(format!("{} is not a file", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::TerminalProperties;

    #[test]
    fn test_echo_marker_hides_marker() {
        let command = echo_marker(REPLY_BEGIN_MARKER);
        assert!(!command.contains(REPLY_BEGIN_MARKER));
        assert_eq!(
            command,
            r#"call echo(concat(">>>CCLEXPECT-", "REPLY-BEGIN<<<"))"#
        );
    }

    #[test]
    fn test_pre_session_and_flags() {
        let mut queue = CommandQueue::new(EngineContext::new(TerminalProperties::default()));
        assert!(queue.is_terminal_free());
        assert!(!queue.requires_identity());
        queue.add_pre_session("export X=1");
        queue.require_identity();
        assert_eq!(queue.pre_session(), ["export X=1"]);
        assert!(queue.requires_identity());
        assert!(!queue.is_terminal_free());
    }

    #[test]
    fn test_require_name() {
        assert_eq!(require_name("script name", "  abc ").unwrap(), "abc");
        assert!(matches!(
            require_name("script name", "  "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.prg");
        std::fs::write(&file, "x").unwrap();
        assert!(require_file(&file).is_ok());
        assert!(require_file(dir.path()).is_err());
        assert!(require_file(Path::new("")).is_err());
    }
}
