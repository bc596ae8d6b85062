//! [`ScriptCompiler`] intent: upload a `.prg` file and compile it.
//!
//! Plan syntax: `compile "orders.prg" ["dependency.inc"...]`

use std::path::{Path, PathBuf};

use crate::command::{CommandQueue, Download, InSessionCommand, QueueAdder, require_file};
use crate::error::{Error, Result};
use crate::parser::tokenize;
use crate::paths::{RemoteDirectory, RemoteFile, resolve};

/// Listing target used when no listing was requested.
pub const NO_LISTING: &str = "nl:";

/// Compiles one script source.
///
/// Dependencies (includes, subroutines) are uploaded along with the source.
/// A requested listing is written to the remote temp directory and fetched
/// after the session.
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    source: PathBuf,
    dependencies: Vec<PathBuf>,
    listing: Option<PathBuf>,
}

impl ScriptCompiler {
    pub const NAME: &'static str = "compile";

    pub fn new(source: impl Into<PathBuf>) -> Self {
        ScriptCompiler {
            source: source.into(),
            dependencies: Vec::new(),
            listing: None,
        }
    }

    pub fn with_dependency(mut self, file: impl Into<PathBuf>) -> Self {
        self.dependencies.push(file.into());
        self
    }

    pub fn with_dependencies<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.dependencies.extend(files.into_iter().map(Into::into));
        self
    }

    /// Save the compiler listing to `local`.
    pub fn with_listing(mut self, local: impl Into<PathBuf>) -> Self {
        self.listing = Some(local.into());
        self
    }

    pub fn commit(self, queue: &mut CommandQueue) -> Result<()> {
        require_file(&self.source)?;
        let name = script_name(&self.source, "prg")?;
        for dependency in &self.dependencies {
            require_file(dependency)?;
        }

        let registry = queue.context().registry();
        let mut uploads = Vec::with_capacity(self.dependencies.len() + 1);
        for dependency in &self.dependencies {
            uploads.push((dependency.as_path(), resolve(dependency, registry)?));
        }
        let source = resolve(&self.source, registry)?;
        uploads.push((self.source.as_path(), source.clone()));

        registry.register_compiled(&name);
        for (local, remote) in uploads {
            queue.push_upload_to(local, remote);
        }
        let listing = match self.listing {
            Some(local) => {
                let remote = RemoteFile::new(RemoteDirectory::Temp, format!("{name}.lis"));
                queue.push_download(Download {
                    remote: remote.shell_path(),
                    local,
                });
                remote.logical_path()
            }
            None => NO_LISTING.to_string(),
        };
        queue.push_in_session(InSessionCommand::new(
            &name,
            vec![compile_command(&source, &listing)],
        ));
        Ok(())
    }
}

impl QueueAdder for ScriptCompiler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let mut tokens = tokenize(args)?.into_iter().map(|t| t.into_text());
        let source = tokens
            .next()
            .ok_or_else(|| Error::invalid("compile needs a source file"))?;
        Ok(Self::new(source).with_dependencies(tokens))
    }

    fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> Result<()> {
        (*self).commit(queue)
    }
}

/// `call compile("<logical source>", "<listing>") go`
pub(crate) fn compile_command(source: &RemoteFile, listing: &str) -> String {
    format!(
        "call compile(\"{}\", \"{listing}\") go",
        source.logical_path()
    )
}

/// Lowercased file stem of `file`, which must carry `extension`.
pub(crate) fn script_name(file: &Path, extension: &str) -> Result<String> {
    let actual = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if actual.as_deref() != Some(extension) {
        return Err(Error::invalid(format!(
            "{} must have a .{extension} extension",
            file.display()
        )));
    }
    file.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::invalid(format!("{} has no file name", file.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Upload;
    use crate::properties::TerminalProperties;
    use crate::registry::EngineContext;

    fn queue() -> CommandQueue {
        CommandQueue::new(EngineContext::new(TerminalProperties::default()))
    }

    #[test]
    fn test_compile_queues_upload_and_command() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Orders.PRG");
        let include = dir.path().join("util.inc");
        std::fs::write(&source, "drop program orders go").unwrap();
        std::fs::write(&include, "").unwrap();

        let mut queue = queue();
        ScriptCompiler::new(&source)
            .with_dependency(&include)
            .commit(&mut queue)
            .unwrap();

        assert_eq!(
            queue.in_session()[0].commands(),
            [r#"call compile("cclsource:orders.prg", "nl:") go"#]
        );
        assert_eq!(queue.in_session()[0].script(), "orders");
        assert_eq!(
            queue.uploads(),
            [
                Upload {
                    local: include.clone(),
                    remote: RemoteFile::new(RemoteDirectory::CclSource, "util.inc"),
                },
                Upload {
                    local: source.clone(),
                    remote: RemoteFile::new(RemoteDirectory::CclSource, "orders.prg"),
                },
            ]
        );
        assert!(queue.context().registry().is_compiled("ORDERS"));
        assert!(!queue.requires_identity());
    }

    #[test]
    fn test_listing_is_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.prg");
        std::fs::write(&source, "").unwrap();
        let mut queue = queue();
        ScriptCompiler::new(&source)
            .with_listing(dir.path().join("a.lis"))
            .commit(&mut queue)
            .unwrap();
        assert_eq!(
            queue.in_session()[0].commands(),
            [r#"call compile("cclsource:a.prg", "cer_temp:a.lis") go"#]
        );
        assert_eq!(queue.downloads()[0].remote, "$cer_temp/a.lis");
    }

    #[test]
    fn test_rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.inc");
        std::fs::write(&source, "").unwrap();
        let err = ScriptCompiler::new(&source).commit(&mut queue()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got: {err}");
    }

    #[test]
    fn test_rejects_missing_files() {
        assert!(ScriptCompiler::new("/nonexistent/a.prg").commit(&mut queue()).is_err());
    }

    #[test]
    fn test_parse() {
        let compiler = ScriptCompiler::parse(r#""a.prg" "b.inc" c.sub"#).unwrap();
        assert_eq!(compiler.source, PathBuf::from("a.prg"));
        assert_eq!(compiler.dependencies, [PathBuf::from("b.inc"), PathBuf::from("c.sub")]);
        assert!(ScriptCompiler::parse("").is_err());
    }
}
