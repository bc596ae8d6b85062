//! [`DynamicCompiler`] intent: compile an include or subroutine file inside a
//! generated throwaway program.
//!
//! Plan syntax: `compile-dynamic "pricing.inc" ["wrapper_name"]`

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::compile::{NO_LISTING, compile_command};
use super::drop::drop_command;
use crate::command::{CommandQueue, InSessionCommand, QueueAdder, require_file, require_name};
use crate::error::{Error, Result};
use crate::parser::tokenize;
use crate::paths::{RemoteDirectory, RemoteFile, resolve};

/// Longest program name the interpreter accepts.
pub const MAX_SCRIPT_NAME: usize = 30;

const FALLBACK_USER: &str = "cclexpect";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Wraps a `.inc`/`.sub` file in a generated program so it can be compiled
/// on its own. The wrapper is dropped again after the session.
#[derive(Debug, Clone)]
pub struct DynamicCompiler {
    source: PathBuf,
    name: Option<String>,
    dependencies: Vec<PathBuf>,
}

impl DynamicCompiler {
    pub const NAME: &'static str = "compile-dynamic";

    pub fn new(source: impl Into<PathBuf>) -> Self {
        DynamicCompiler {
            source: source.into(),
            name: None,
            dependencies: Vec::new(),
        }
    }

    /// Use `name` for the wrapper instead of a generated one.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_dependency(mut self, file: impl Into<PathBuf>) -> Self {
        self.dependencies.push(file.into());
        self
    }

    pub fn commit(self, queue: &mut CommandQueue) -> Result<()> {
        require_file(&self.source)?;
        let extension = self
            .source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(extension.as_deref(), Some("inc" | "sub")) {
            return Err(Error::invalid(format!(
                "{} must be an .inc or .sub file",
                self.source.display()
            )));
        }
        for dependency in &self.dependencies {
            require_file(dependency)?;
        }
        let name = match self.name {
            Some(name) => wrapper_name(&name)?,
            None => generate_name(),
        };

        let registry = queue.context().registry();
        let mut uploads = Vec::with_capacity(self.dependencies.len() + 2);
        for dependency in &self.dependencies {
            uploads.push((dependency.clone(), resolve(dependency, registry)?));
        }
        let include = resolve(&self.source, registry)?;
        uploads.push((self.source.clone(), include.clone()));

        let wrapper = queue.scratch_dir()?.join(format!("{name}.prg"));
        std::fs::write(&wrapper, wrapper_source(&name, &include.logical_path()))?;
        debug!(wrapper = %wrapper.display(), "wrote dynamic wrapper");
        let remote = RemoteFile::new(RemoteDirectory::Temp, format!("{name}.prg"));
        uploads.push((wrapper.clone(), remote.clone()));

        // Infallible from here on.
        queue.context().registry().register_dynamic(&name);
        queue.push_generated(wrapper);
        for (local, remote) in &uploads {
            queue.push_upload_to(local, remote.clone());
        }
        queue.push_in_session(InSessionCommand::new(
            &name,
            vec![compile_command(&remote, NO_LISTING)],
        ));
        queue.push_post_session(drop_command(&name));
        Ok(())
    }
}

impl QueueAdder for DynamicCompiler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let mut tokens = tokenize(args)?.into_iter().map(|t| t.into_text());
        let source = tokens
            .next()
            .ok_or_else(|| Error::invalid("compile-dynamic needs a source file"))?;
        let mut compiler = Self::new(source);
        if let Some(name) = tokens.next() {
            compiler = compiler.with_name(name);
        }
        if tokens.next().is_some() {
            return Err(Error::invalid("compile-dynamic takes a file and an optional name"));
        }
        Ok(compiler)
    }

    fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> Result<()> {
        (*self).commit(queue)
    }
}

/// Validate an explicit wrapper name: lowercase letters, digits and `_`, at
/// most [`MAX_SCRIPT_NAME`] characters.
fn wrapper_name(name: &str) -> Result<String> {
    let name = require_name("wrapper name", name)?.to_ascii_lowercase();
    if name.len() > MAX_SCRIPT_NAME {
        return Err(Error::invalid(format!(
            "wrapper name {name} is longer than {MAX_SCRIPT_NAME} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid(format!(
            "wrapper name {name} may only contain letters, digits and underscores"
        )));
    }
    Ok(name)
}

/// The generated program: drop any previous copy, then include the file.
fn wrapper_source(name: &str, include: &str) -> String {
    format!("drop program {name} go\ncreate program {name}\n%i {include}\nend go\n")
}

/// A wrapper name derived from the local user name plus a time-based suffix,
/// at most [`MAX_SCRIPT_NAME`] characters.
pub fn generate_name() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    name_for(&user, unique_suffix())
}

fn unique_suffix() -> u128 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    nanos.wrapping_add(u128::from(SEQUENCE.fetch_add(1, Ordering::Relaxed)))
}

fn name_for(user: &str, disambiguator: u128) -> String {
    let mut user: String = user
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase();
    if user.is_empty() {
        user = FALLBACK_USER.to_string();
    }
    let suffix = format!("_{}", base36(disambiguator));
    user.truncate(MAX_SCRIPT_NAME.saturating_sub(suffix.len()));
    user + &suffix
}

fn base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.iter().rev().map(|&b| b as char).collect()
}
