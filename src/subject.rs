//! Who a session runs as.

use std::fmt;

/// Login details for the interpreter's security login.
#[derive(Clone, PartialEq, Eq)]
pub struct InterpreterLogin {
    pub username: String,
    pub domain: String,
    password: String,
}

impl InterpreterLogin {
    pub fn new(
        username: impl Into<String>,
        domain: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        InterpreterLogin {
            username: username.into(),
            domain: domain.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for InterpreterLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterLogin")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The host account a session connects to and, optionally, the identity it
/// logs into the interpreter with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub host: String,
    pub os_user: String,
    /// Environment passed to `envset`; also the middle segment of the OS prompt.
    pub environment: Option<String>,
    pub login: Option<InterpreterLogin>,
}

impl Subject {
    pub fn new(host: impl Into<String>, os_user: impl Into<String>) -> Self {
        Subject {
            host: host.into(),
            os_user: os_user.into(),
            environment: None,
            login: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_login(mut self, login: InterpreterLogin) -> Self {
        self.login = Some(login);
        self
    }

    /// `user@host`, as understood by ssh and scp.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.os_user, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_not_in_debug_output() {
        let subject = Subject::new("node1", "d_build")
            .with_login(InterpreterLogin::new("jdoe", "build", "hunter2"));
        let text = format!("{subject:?}");
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<redacted>"));
        assert_eq!(subject.destination(), "d_build@node1");
    }
}
