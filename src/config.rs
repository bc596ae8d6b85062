//! TOML session configuration for the command-line front end.
//!
//! ```toml
//! host = "node1"
//! user = "d_build"
//! environment = "build"
//! ccl_user = "jdoe"
//! ccl_domain = "build"
//! timeout_secs = 600
//! log_file = "session.log"
//! log_scope = "full"
//!
//! [prompts]
//! ccl = '^\s*1\)\s*$'
//! login_failures = ["V500 SECURITY LOGIN FAILURE"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::properties::{LogScope, TerminalProperties};
use crate::subject::{InterpreterLogin, Subject};

/// Prompt pattern overrides. Unset entries keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    pub os: Option<String>,
    pub ccl: Option<String>,
    pub login: Option<String>,
    pub login_success: Option<Vec<String>>,
    pub login_failures: Option<Vec<String>>,
}

/// Everything needed to open a session, as read from a config file and
/// then overridden by command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub environment: Option<String>,
    pub ccl_user: Option<String>,
    pub ccl_domain: Option<String>,
    pub timeout_secs: Option<u64>,
    pub skip_envset: bool,
    pub skip_login: bool,
    pub debug_interpreter: bool,
    pub log_file: Option<PathBuf>,
    pub log_scope: LogScope,
    pub prompts: PromptConfig,
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Terminal properties with this config's overrides applied.
    pub fn to_properties(&self) -> Result<TerminalProperties> {
        let mut builder = TerminalProperties::builder()
            .with_skip_envset(self.skip_envset)
            .with_skip_login(self.skip_login)
            .with_debug_interpreter(self.debug_interpreter)
            .with_log_scope(self.log_scope);
        if let Some(secs) = self.timeout_secs {
            builder = builder.with_expectation_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = &self.log_file {
            builder = builder.with_log_file(path);
        }
        let prompts = &self.prompts;
        if let Some(p) = &prompts.os {
            builder = builder.with_os_prompt(p);
        }
        if let Some(p) = &prompts.ccl {
            builder = builder.with_ccl_prompt(p);
        }
        if let Some(p) = &prompts.login {
            builder = builder.with_login_prompt(p);
        }
        if let Some(p) = &prompts.login_success {
            builder = builder.with_login_success(p.clone());
        }
        if let Some(p) = &prompts.login_failures {
            builder = builder.with_login_failures(p.clone());
        }
        builder.build()
    }

    /// The session subject. The interpreter login is attached when a user
    /// and a password are both known; the domain defaults to the
    /// environment.
    pub fn subject(&self, password: Option<String>) -> Result<Subject> {
        let host = non_blank(self.host.as_deref())
            .ok_or_else(|| Error::invalid("a host is required"))?;
        let user = non_blank(self.user.as_deref())
            .ok_or_else(|| Error::invalid("a user is required"))?;
        let mut subject = Subject::new(host, user);
        if let Some(environment) = non_blank(self.environment.as_deref()) {
            subject = subject.with_environment(environment);
        }
        if let (Some(ccl_user), Some(password)) = (non_blank(self.ccl_user.as_deref()), password) {
            let domain = non_blank(self.ccl_domain.as_deref())
                .or(non_blank(self.environment.as_deref()))
                .ok_or_else(|| Error::invalid("an interpreter login needs a domain"))?;
            subject = subject.with_login(InterpreterLogin::new(ccl_user, domain, password));
        }
        Ok(subject)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
host = "node1"
user = "d_build"
environment = "build"
ccl_user = "jdoe"
timeout_secs = 30
skip_envset = true
log_file = "session.log"
log_scope = "full"

[prompts]
ccl = 'ccl>\s*$'
login_failures = ["DENIED"]
"#;

    #[test]
    fn test_parse_and_apply() {
        let config = SessionConfig::parse(FULL).unwrap();
        assert_eq!(config.host.as_deref(), Some("node1"));
        assert_eq!(config.log_scope, LogScope::Full);

        let properties = config.to_properties().unwrap();
        assert_eq!(properties.expectation_timeout(), Duration::from_secs(30));
        assert!(properties.skip_envset());
        assert!(properties.ccl_prompt().is_match("ccl> "));
        assert!(properties.login_failures()[0].is_match("ACCESS DENIED"));
        assert_eq!(properties.log_file(), Some(&PathBuf::from("session.log")));
    }

    #[test]
    fn test_subject_login_uses_environment_as_domain() {
        let config = SessionConfig::parse(FULL).unwrap();
        let subject = config.subject(Some("secret".into())).unwrap();
        assert_eq!(subject.destination(), "d_build@node1");
        let login = subject.login.unwrap();
        assert_eq!(login.domain, "build");
        assert_eq!(login.password(), "secret");

        let without_password = config.subject(None).unwrap();
        assert!(without_password.login.is_none());
    }

    #[test]
    fn test_defaults_and_missing_host() {
        let config = SessionConfig::parse("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(config.to_properties().is_ok());
        assert!(matches!(config.subject(None), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            SessionConfig::parse("hots = \"x\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bad_prompt_rejected() {
        let config = SessionConfig::parse("[prompts]\nos = \"(\"").unwrap();
        assert!(matches!(config.to_properties(), Err(Error::Regex(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cclexpect.toml");
        std::fs::write(&path, FULL).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap().user.as_deref(), Some("d_build"));
        assert!(SessionConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
