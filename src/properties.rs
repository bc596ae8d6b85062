//! Terminal configuration: prompt patterns, timeouts and logging switches.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::Result;

/// How long an expectation waits for its prompt unless configured otherwise.
pub const DEFAULT_EXPECTATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// The interpreter's primary prompt (` 1)` on a line of its own).
pub const DEFAULT_CCL_PROMPT: &str = r"(?m)^\s*1\)\s*$";

/// Prompts printed by the interpreter's security login.
pub const DEFAULT_LOGIN_PROMPT: &str = r"(?i)(username|domain|password)\s*:\s*$";

/// Output that means the interpreter refused the login.
pub const DEFAULT_LOGIN_FAILURES: &[&str] = &[
    r"V500 SECURITY LOGIN FAILURE",
    r"V500 SECURITY LOGIN WARNING",
    r"(?i)retry\s*\(y/n\)",
    r"(?i)repeat new password",
];

/// What goes to the transcript log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogScope {
    /// Everything the terminal printed.
    Full,
    /// Only output between the session boundary markers.
    #[default]
    Session,
}

/// Immutable snapshot of terminal settings.
///
/// Built with [`TerminalProperties::builder`]; all patterns are compiled up
/// front so a bad expression fails before any connection is opened.
#[derive(Debug, Clone)]
pub struct TerminalProperties {
    os_prompt: Option<Regex>,
    ccl_prompt: Regex,
    login_prompt: Regex,
    login_success: Vec<Regex>,
    login_failures: Vec<Regex>,
    expectation_timeout: Duration,
    skip_envset: bool,
    skip_login: bool,
    debug_interpreter: bool,
    log_file: Option<PathBuf>,
    log_scope: LogScope,
}

impl TerminalProperties {
    pub fn builder() -> TerminalPropertiesBuilder {
        TerminalPropertiesBuilder::default()
    }

    /// Explicit OS prompt, if one was configured.
    pub fn os_prompt(&self) -> Option<&Regex> {
        self.os_prompt.as_ref()
    }

    /// The configured OS prompt, or the default derived from the login.
    pub fn os_prompt_for(&self, host: &str, user: &str, environment: Option<&str>) -> Result<Regex> {
        match &self.os_prompt {
            Some(prompt) => Ok(prompt.clone()),
            None => default_os_prompt(host, user, environment),
        }
    }

    pub fn ccl_prompt(&self) -> &Regex {
        &self.ccl_prompt
    }

    pub fn login_prompt(&self) -> &Regex {
        &self.login_prompt
    }

    pub fn login_success(&self) -> &[Regex] {
        &self.login_success
    }

    pub fn login_failures(&self) -> &[Regex] {
        &self.login_failures
    }

    pub fn expectation_timeout(&self) -> Duration {
        self.expectation_timeout
    }

    pub fn skip_envset(&self) -> bool {
        self.skip_envset
    }

    pub fn skip_login(&self) -> bool {
        self.skip_login
    }

    pub fn debug_interpreter(&self) -> bool {
        self.debug_interpreter
    }

    /// Command that starts the interpreter.
    pub fn interpreter_command(&self) -> &'static str {
        if self.debug_interpreter {
            "cclora_dbg"
        } else {
            "ccl"
        }
    }

    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    pub fn log_scope(&self) -> LogScope {
        self.log_scope
    }
}

impl Default for TerminalProperties {
    fn default() -> Self {
        TerminalProperties {
            os_prompt: None,
            ccl_prompt: compile(DEFAULT_CCL_PROMPT),
            login_prompt: compile(DEFAULT_LOGIN_PROMPT),
            login_success: vec![compile(DEFAULT_CCL_PROMPT)],
            login_failures: DEFAULT_LOGIN_FAILURES.iter().map(|p| compile(p)).collect(),
            expectation_timeout: DEFAULT_EXPECTATION_TIMEOUT,
            skip_envset: false,
            skip_login: false,
            debug_interpreter: false,
            log_file: None,
            log_scope: LogScope::default(),
        }
    }
}

// The built-in patterns are constants covered by tests.
#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern compiles")
}

/// Prompt shaped like `user:env@host:/some/dir` followed by a `#` line.
///
/// A missing environment matches any environment segment.
pub fn default_os_prompt(host: &str, user: &str, environment: Option<&str>) -> Result<Regex> {
    let environment = environment
        .map(regex::escape)
        .unwrap_or_else(|| "[^@]*".to_string());
    let pattern = format!(
        r"{}:{environment}@{}:[^\r\n]*[\r\n]+#\s*$",
        regex::escape(user),
        regex::escape(host)
    );
    Ok(Regex::new(&pattern)?)
}

/// Builder for [`TerminalProperties`]. Patterns are kept as text until
/// [`build`](Self::build) compiles them.
#[derive(Debug, Clone, Default)]
pub struct TerminalPropertiesBuilder {
    os_prompt: Option<String>,
    ccl_prompt: Option<String>,
    login_prompt: Option<String>,
    login_success: Option<Vec<String>>,
    login_failures: Option<Vec<String>>,
    expectation_timeout: Option<Duration>,
    skip_envset: bool,
    skip_login: bool,
    debug_interpreter: bool,
    log_file: Option<PathBuf>,
    log_scope: LogScope,
}

impl TerminalPropertiesBuilder {
    pub fn with_os_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.os_prompt = Some(pattern.into());
        self
    }

    pub fn with_ccl_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.ccl_prompt = Some(pattern.into());
        self
    }

    pub fn with_login_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.login_prompt = Some(pattern.into());
        self
    }

    pub fn with_login_success(mut self, patterns: Vec<String>) -> Self {
        self.login_success = Some(patterns);
        self
    }

    pub fn with_login_failures(mut self, patterns: Vec<String>) -> Self {
        self.login_failures = Some(patterns);
        self
    }

    pub fn with_expectation_timeout(mut self, timeout: Duration) -> Self {
        self.expectation_timeout = Some(timeout);
        self
    }

    pub fn with_skip_envset(mut self, skip: bool) -> Self {
        self.skip_envset = skip;
        self
    }

    pub fn with_skip_login(mut self, skip: bool) -> Self {
        self.skip_login = skip;
        self
    }

    pub fn with_debug_interpreter(mut self, debug: bool) -> Self {
        self.debug_interpreter = debug;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_log_scope(mut self, scope: LogScope) -> Self {
        self.log_scope = scope;
        self
    }

    pub fn build(self) -> Result<TerminalProperties> {
        let defaults = TerminalProperties::default();
        let ccl_prompt = match self.ccl_prompt {
            Some(p) => Regex::new(&p)?,
            None => defaults.ccl_prompt,
        };
        let login_success = match self.login_success {
            Some(patterns) => compile_all(&patterns)?,
            None => vec![ccl_prompt.clone()],
        };
        Ok(TerminalProperties {
            os_prompt: self.os_prompt.as_deref().map(Regex::new).transpose()?,
            login_prompt: match self.login_prompt {
                Some(p) => Regex::new(&p)?,
                None => defaults.login_prompt,
            },
            login_failures: match self.login_failures {
                Some(patterns) => compile_all(&patterns)?,
                None => defaults.login_failures,
            },
            ccl_prompt,
            login_success,
            expectation_timeout: self
                .expectation_timeout
                .unwrap_or(defaults.expectation_timeout),
            skip_envset: self.skip_envset,
            skip_login: self.skip_login,
            debug_interpreter: self.debug_interpreter,
            log_file: self.log_file,
            log_scope: self.log_scope,
        })
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    Ok(patterns
        .iter()
        .map(|p| Regex::new(p))
        .collect::<std::result::Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let props = TerminalProperties::default();
        assert_eq!(props.expectation_timeout(), DEFAULT_EXPECTATION_TIMEOUT);
        assert_eq!(props.interpreter_command(), "ccl");
        assert!(props.ccl_prompt().is_match("output\n 1)"));
        assert!(!props.ccl_prompt().is_match(" 2)"));
        assert!(props.login_prompt().is_match("Username: "));
        assert!(props.login_failures()[0].is_match("V500 SECURITY LOGIN FAILURE"));
        assert_eq!(props.log_scope(), LogScope::Session);
    }

    #[yare::parameterized(
        failure  = { "%CCL-I V500 SECURITY LOGIN FAILURE for JDOE", 0 },
        warning  = { "V500 SECURITY LOGIN WARNING: password expires", 1 },
        retry    = { "Retry (Y/N)? ", 2 },
        expired  = { "Repeat New Password: ", 3 },
    )]
    fn default_login_failure_matches(output: &str, index: usize) {
        let failures = TerminalProperties::default().login_failures().to_vec();
        assert!(failures[index].is_match(output));
        let others: Vec<_> = (0..failures.len()).filter(|&i| i != index).collect();
        assert!(others.iter().all(|&i| !failures[i].is_match(output)), "{output}");
    }

    #[test]
    fn test_builder_overrides() {
        let props = TerminalProperties::builder()
            .with_ccl_prompt(r"ccl>\s*$")
            .with_expectation_timeout(Duration::from_secs(5))
            .with_debug_interpreter(true)
            .with_skip_envset(true)
            .build()
            .unwrap();
        assert_eq!(props.expectation_timeout(), Duration::from_secs(5));
        assert_eq!(props.interpreter_command(), "cclora_dbg");
        assert!(props.skip_envset());
        assert!(props.login_success()[0].is_match("ccl> "));
    }

    #[test]
    fn test_bad_pattern_fails_build() {
        assert!(
            TerminalProperties::builder()
                .with_os_prompt("(")
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_default_os_prompt() {
        let prompt = default_os_prompt("node1", "d_user", Some("build")).unwrap();
        assert!(prompt.is_match("d_user:build@node1:/cerner/d_build\r\n# "));
        assert!(!prompt.is_match("d_user:other@node1:/cerner\r\n# "));

        let any_env = default_os_prompt("node1", "d_user", None).unwrap();
        assert!(any_env.is_match("d_user:other@node1:/cerner\n#"));
    }
}
