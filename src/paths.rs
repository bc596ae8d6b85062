//! Where local files live on the remote host.

use std::path::Path;

use crate::error::{Error, Result};
use crate::registry::ScriptRegistry;

/// A remote directory, named both as a shell variable and as an
/// interpreter logical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDirectory {
    /// Script sources and includes.
    CclSource,
    /// Shell scripts.
    Proc,
    /// Everything else.
    Install,
    /// Generated wrapper scripts and listings.
    Temp,
}

impl RemoteDirectory {
    pub fn shell_path(&self) -> &'static str {
        match self {
            RemoteDirectory::CclSource => "$CCLSOURCE",
            RemoteDirectory::Proc => "$cer_proc",
            RemoteDirectory::Install => "$cer_install",
            RemoteDirectory::Temp => "$cer_temp",
        }
    }

    pub fn logical(&self) -> &'static str {
        match self {
            RemoteDirectory::CclSource => "cclsource",
            RemoteDirectory::Proc => "cer_proc",
            RemoteDirectory::Install => "cer_install",
            RemoteDirectory::Temp => "cer_temp",
        }
    }
}

/// A file name placed in a remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub directory: RemoteDirectory,
    pub name: String,
}

impl RemoteFile {
    pub fn new(directory: RemoteDirectory, name: impl Into<String>) -> Self {
        RemoteFile {
            directory,
            name: name.into(),
        }
    }

    /// e.g. `$CCLSOURCE/x.prg`
    pub fn shell_path(&self) -> String {
        format!("{}/{}", self.directory.shell_path(), self.name)
    }

    /// e.g. `cclsource:x.prg`
    pub fn logical_path(&self) -> String {
        format!("{}:{}", self.directory.logical(), self.name)
    }
}

/// Resolve the remote location of `file`.
///
/// Scripts registered as dynamic go to the temp directory. Otherwise
/// `.prg`/`.inc`/`.sub` go to the source directory with a lowercased name,
/// `.ksh` to the proc directory and anything else to the install directory,
/// both keeping their case.
pub fn resolve(file: &Path, registry: &ScriptRegistry) -> Result<RemoteFile> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| Error::invalid(format!("{} has no file name", file.display())))?;
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if registry.is_dynamic(stem) {
        return Ok(RemoteFile::new(RemoteDirectory::Temp, name.to_ascii_lowercase()));
    }
    Ok(match extension.as_str() {
        "prg" | "inc" | "sub" => RemoteFile::new(RemoteDirectory::CclSource, name.to_ascii_lowercase()),
        "ksh" => RemoteFile::new(RemoteDirectory::Proc, name),
        _ => RemoteFile::new(RemoteDirectory::Install, name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        script     = { "a.prg", RemoteDirectory::CclSource, "a.prg" },
        include    = { "A.INC", RemoteDirectory::CclSource, "a.inc" },
        subroutine = { "dir/Util.Sub", RemoteDirectory::CclSource, "util.sub" },
        shell      = { "X.ksh", RemoteDirectory::Proc, "X.ksh" },
        resource   = { "Data.CSV", RemoteDirectory::Install, "Data.CSV" },
        no_ext     = { "README", RemoteDirectory::Install, "README" },
    )]
    fn resolves_by_extension(file: &str, directory: RemoteDirectory, name: &str) {
        let registry = ScriptRegistry::default();
        let remote = resolve(Path::new(file), &registry).unwrap();
        assert_eq!(remote, RemoteFile::new(directory, name));
    }

    #[test]
    fn test_dynamic_scripts_go_to_temp() {
        let registry = ScriptRegistry::default();
        registry.register_dynamic("jdoe_wrap");
        let remote = resolve(Path::new("/tmp/JDOE_WRAP.prg"), &registry).unwrap();
        assert_eq!(remote.directory, RemoteDirectory::Temp);
        assert_eq!(remote.shell_path(), "$cer_temp/jdoe_wrap.prg");
        assert_eq!(remote.logical_path(), "cer_temp:jdoe_wrap.prg");
    }

    #[test]
    fn test_compiled_but_not_dynamic_uses_extension() {
        let registry = ScriptRegistry::default();
        registry.register_compiled("a");
        let remote = resolve(Path::new("a.prg"), &registry).unwrap();
        assert_eq!(remote.directory, RemoteDirectory::CclSource);
    }

    #[test]
    fn test_missing_file_name() {
        let registry = ScriptRegistry::default();
        assert!(resolve(Path::new("/"), &registry).is_err());
    }
}
