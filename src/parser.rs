//! Plan-file parser: one intent per line.
//!
//! The top-level entry points are [`parse_str`] and [`parse_file`].
//!
//! ```text
//! # build and run the unit tests
//! compile "src/orders.prg" "src/orders_util.inc"
//! compile-dynamic "src/pricing.inc"
//! execute "orders_test" "ALL" 10 0.5
//! drop "orders_test"
//! upload "data/prices.csv"
//! ```

use std::path::Path;

use crate::command::QueueAdder;
use crate::commands::{
    DynamicCompiler, ResourceUpload, ScriptCompiler, ScriptDrop, ScriptExecution,
};
use crate::error::{Error, Result};

/// Parse a plan from a string slice and return its intents in order.
///
/// Lines that are empty or start with `#` are ignored. Inline comments
/// (` # ...`) are stripped while preserving `#` inside quoted strings.
///
/// # Errors
///
/// Returns an error naming the line if it holds an unknown intent, a
/// malformed argument or an unclosed quoted string.
///
/// # Example
///
/// ```
/// use cclexpect::parse_str;
///
/// let intents = parse_str("drop \"old_script\"\nupload \"Cargo.toml\"\n").unwrap();
/// assert_eq!(intents.len(), 2);
/// ```
pub fn parse_str(content: &str) -> Result<Vec<Box<dyn QueueAdder>>> {
    let mut intents = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = strip_inline_comment(line);
        let intent = parse_line(line).map_err(|e| {
            Error::invalid(format!("failed to parse line {}: {line}: {e}", line_num + 1))
        })?;
        intents.push(intent);
    }
    Ok(intents)
}

/// Parse a plan file. Reads the whole file and delegates to [`parse_str`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Box<dyn QueueAdder>>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_str(&content)
}

type ParseFn = fn(&str) -> Result<Box<dyn QueueAdder>>;

static REGISTRY: &[(&str, ParseFn)] = &[
    (ScriptCompiler::NAME, ScriptCompiler::parse_boxed),
    (DynamicCompiler::NAME, DynamicCompiler::parse_boxed),
    (ScriptExecution::NAME, ScriptExecution::parse_boxed),
    (ScriptDrop::NAME, ScriptDrop::parse_boxed),
    (ResourceUpload::NAME, ResourceUpload::parse_boxed),
];

/// Dispatch one non-empty, non-comment line to its intent's parser.
fn parse_line(line: &str) -> Result<Box<dyn QueueAdder>> {
    let (name, args) = line.split_once(' ').unwrap_or((line, ""));
    REGISTRY
        .iter()
        .find(|(intent, _)| *intent == name)
        .map(|(_, parse)| parse(args))
        .unwrap_or_else(|| Err(Error::invalid(format!("unknown intent: {name}"))))
}

/// Strip inline comments from a line, preserving `#` inside quoted strings.
fn strip_inline_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if ch == '#' && !in_quotes {
            return line[..i].trim();
        }
    }
    line
}

/// One argument of a plan line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// A double-quoted string with escapes processed.
    Quoted(String),
    Bare(String),
}

impl Token {
    /// The token's text, quoted or not.
    pub(crate) fn into_text(self) -> String {
        match self {
            Token::Quoted(s) | Token::Bare(s) => s,
        }
    }
}

/// Split arguments on whitespace, keeping double-quoted strings together and
/// processing `\n`, `\t`, `\"` and `\\` inside them.
pub(crate) fn tokenize(args: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = args.trim().chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some(other) => text.push(other),
                        None => break,
                    },
                    other => text.push(other),
                }
            }
            if !closed {
                return Err(Error::invalid("unclosed quoted string"));
            }
            tokens.push(Token::Quoted(text));
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token::Bare(text));
        }
    }
    Ok(tokens)
}
