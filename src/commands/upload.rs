//! [`ResourceUpload`] intent: copy files to the remote host without running
//! anything.
//!
//! Plan syntax: `upload "prices.csv" ["other.ksh"...]`

use std::path::PathBuf;

use crate::command::{CommandQueue, QueueAdder, require_file};
use crate::error::{Error, Result};
use crate::parser::tokenize;

/// Files for the bulk-upload path. Each file's remote directory comes from
/// [`crate::paths::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResourceUpload {
    files: Vec<PathBuf>,
}

impl ResourceUpload {
    pub const NAME: &'static str = "upload";

    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ResourceUpload {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.files.push(file.into());
        self
    }

    pub fn commit(self, queue: &mut CommandQueue) -> Result<()> {
        if self.files.is_empty() {
            return Err(Error::invalid("upload needs at least one file"));
        }
        for file in &self.files {
            require_file(file)?;
        }
        for file in &self.files {
            queue.push_upload(file)?;
        }
        Ok(())
    }
}

impl QueueAdder for ResourceUpload {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        Ok(Self::new(tokenize(args)?.into_iter().map(|t| t.into_text())))
    }

    fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> Result<()> {
        (*self).commit(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::RemoteDirectory;
    use crate::properties::TerminalProperties;
    use crate::registry::EngineContext;

    #[test]
    fn test_uploads_resolve_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("Prices.csv");
        let ksh = dir.path().join("load.ksh");
        std::fs::write(&csv, "").unwrap();
        std::fs::write(&ksh, "").unwrap();

        let mut queue = CommandQueue::new(EngineContext::new(TerminalProperties::default()));
        ResourceUpload::new([&csv]).with_file(&ksh).commit(&mut queue).unwrap();

        let uploads = queue.uploads();
        assert_eq!(uploads[0].remote.directory, RemoteDirectory::Install);
        assert_eq!(uploads[0].remote.name, "Prices.csv");
        assert_eq!(uploads[1].remote.directory, RemoteDirectory::Proc);
        assert!(queue.is_terminal_free());
    }

    #[test]
    fn test_nothing_queued_when_a_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("a.csv");
        std::fs::write(&csv, "").unwrap();
        let mut queue = CommandQueue::new(EngineContext::new(TerminalProperties::default()));
        let result = ResourceUpload::new([csv, dir.path().join("missing.csv")]).commit(&mut queue);
        assert!(result.is_err());
        assert!(queue.uploads().is_empty());
    }

    #[test]
    fn test_empty_upload() {
        let mut queue = CommandQueue::new(EngineContext::new(TerminalProperties::default()));
        assert!(ResourceUpload::default().commit(&mut queue).is_err());
    }
}
