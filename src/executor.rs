//! Runs a [`CommandQueue`] against one remote host.
//!
//! A session goes: uploads, connect, OS prompt, `envset`, pre-session
//! commands, start the interpreter, log in, in-session commands, then the
//! post-session commands, which run whenever the interpreter started, even
//! after an in-session failure. Downloads happen only after a clean session.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use regex::Regex;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::command::{CommandQueue, InSessionCommand, REPLY_BEGIN_MARKER, REPLY_END_MARKER, echo_marker};
use crate::demux::{FanOut, MarkerFilter, SharedSink};
use crate::error::{Error, Result};
use crate::properties::{LogScope, TerminalProperties};
use crate::record::put_from_json;
use crate::registry::EngineContext;
use crate::subject::Subject;
use crate::terminal::{ExpectationGroup, ResponseCode, TerminalDriver, TerminalResponse};
use crate::transport::{Connector, FileTransfer};

/// Printed by the interpreter for compile and runtime errors.
pub const COMPILE_ERROR_BANNER: &str = "%CCL-E-";

/// Completion banner of a test run; a non-zero count fails the execution.
pub const TEST_FAILURE_BANNER: &str = r"(\d+) test\(s\) failed";

/// Printed once the interpreter is logged in and ready.
pub const SESSION_BEGIN_MARKER: &str = ">>>CCLEXPECT-SESSION-BEGIN<<<";
/// Printed after the last in-session command.
pub const SESSION_END_MARKER: &str = ">>>CCLEXPECT-SESSION-END<<<";

const LOGIN_COMMAND: &str = "cclseclogin go";

/// Drives command queues through a [`Connector`] and a [`FileTransfer`].
pub struct SessionExecutor {
    context: Arc<EngineContext>,
    connector: Arc<dyn Connector>,
    transfer: Arc<dyn FileTransfer>,
    properties: Option<Arc<TerminalProperties>>,
    outputs: Vec<SharedSink<dyn Write + Send>>,
}

impl SessionExecutor {
    pub fn new(
        context: Arc<EngineContext>,
        connector: Arc<dyn Connector>,
        transfer: Arc<dyn FileTransfer>,
    ) -> Self {
        SessionExecutor {
            context,
            connector,
            transfer,
            properties: None,
            outputs: Vec::new(),
        }
    }

    /// Use `properties` instead of the context's installed ones.
    pub fn with_properties(mut self, properties: TerminalProperties) -> Self {
        self.properties = Some(Arc::new(properties));
        self
    }

    /// Also send the session's output (between the session markers) to
    /// `sink`. The executor never closes it.
    pub fn with_output<W: Write + Send + 'static>(mut self, sink: SharedSink<W>) -> Self {
        self.outputs.push(sink.into_dyn());
        self
    }

    /// Run `queue` as `subject`.
    ///
    /// # Errors
    ///
    /// The first failure of the session: a transport error, a timeout on a
    /// step that needs a prompt, a rejected login, or
    /// [`Error::CommandFailed`] when the interpreter reported an error
    /// banner or failing tests.
    pub async fn execute(&self, queue: CommandQueue, subject: &Subject) -> Result<()> {
        let span = info_span!("session", destination = %subject.destination());
        self.run(queue, subject).instrument(span).await
    }

    async fn run(&self, queue: CommandQueue, subject: &Subject) -> Result<()> {
        let properties = self
            .properties
            .clone()
            .unwrap_or_else(|| self.context.properties());
        self.run_session(&queue, subject, &properties).await?;

        for download in queue.downloads() {
            info!(remote = %download.remote, local = %download.local.display(), "downloading");
            self.transfer
                .download(subject, &download.remote, &download.local)
                .await?;
        }
        info!("session complete");
        Ok(())
    }

    async fn run_session(
        &self,
        queue: &CommandQueue,
        subject: &Subject,
        properties: &TerminalProperties,
    ) -> Result<()> {
        for upload in queue.uploads() {
            info!(local = %upload.local.display(), remote = %upload.remote.shell_path(), "uploading");
            self.transfer
                .upload(subject, &upload.local, &upload.remote)
                .await?;
        }
        if queue.is_terminal_free() {
            debug!("nothing to run in a terminal");
            return Ok(());
        }

        let transport = self.connector.connect(subject).await?;
        let mut driver = TerminalDriver::new(transport, properties.expectation_timeout());
        if let Some(sink) = self.transcript_sink(properties)? {
            driver = driver.with_sink(sink);
        }

        let mut outcome = Session {
            driver: &mut driver,
            properties,
            subject,
        }
        .drive(queue)
        .await;
        keep_first(&mut outcome, driver.close().await);
        outcome
    }

    /// Where the raw terminal output goes: the log file (full or
    /// session-bounded) plus the caller's outputs (session-bounded).
    fn transcript_sink(&self, properties: &TerminalProperties) -> Result<Option<Box<dyn Write + Send>>> {
        let mut fan: FanOut<Box<dyn Write + Send>> = FanOut::default();
        if let Some(path) = properties.log_file() {
            let file = File::create(path)?;
            match properties.log_scope() {
                LogScope::Full => fan.push(Box::new(file)),
                LogScope::Session => fan.push(Box::new(MarkerFilter::new(
                    file,
                    SESSION_BEGIN_MARKER,
                    SESSION_END_MARKER,
                ))),
            }
        }
        if !self.outputs.is_empty() {
            fan.push(Box::new(MarkerFilter::new(
                FanOut::new(self.outputs.clone()),
                SESSION_BEGIN_MARKER,
                SESSION_END_MARKER,
            )));
        }
        Ok((!fan.is_empty()).then(|| Box::new(fan) as Box<dyn Write + Send>))
    }
}

/// One connected session.
struct Session<'a> {
    driver: &'a mut TerminalDriver,
    properties: &'a TerminalProperties,
    subject: &'a Subject,
}

impl Session<'_> {
    async fn drive(&mut self, queue: &CommandQueue) -> Result<()> {
        self.start_interpreter(queue).await?;

        let mut outcome = self.run_in_session(queue).await;
        let ccl_prompt = self.properties.ccl_prompt().clone();
        let cleanup = std::iter::once(echo_marker(SESSION_END_MARKER) + " go")
            .chain(queue.post_session().iter().cloned());
        for command in cleanup {
            let group = ExpectationGroup::expecting(&ccl_prompt).with_command(command.as_str());
            let result = self.expect(&command, &[group]).await.map(drop);
            keep_first(&mut outcome, result);
        }
        let exit = self
            .driver
            .run_groups(&[ExpectationGroup::default().with_command("exit")])
            .await
            .map(drop);
        keep_first(&mut outcome, exit);
        outcome
    }

    /// OS prompt, `envset`, pre-session commands and the interpreter itself.
    async fn start_interpreter(&mut self, queue: &CommandQueue) -> Result<()> {
        let (properties, subject) = (self.properties, self.subject);
        let os_prompt = properties.os_prompt_for(
            &subject.host,
            &subject.os_user,
            subject.environment.as_deref(),
        )?;
        self.expect("OS prompt", &[ExpectationGroup::expecting(&os_prompt)])
            .await?;

        if let Some(environment) = &subject.environment {
            if properties.skip_envset() {
                debug!("skipping envset");
            } else {
                let command = format!("envset {environment}");
                let group = ExpectationGroup::expecting(&os_prompt).with_command(command.as_str());
                self.expect(&command, &[group]).await?;
            }
        }
        for command in queue.pre_session() {
            let group = ExpectationGroup::expecting(&os_prompt).with_command(command.as_str());
            self.expect(command, &[group]).await?;
        }

        let interpreter = properties.interpreter_command();
        info!(interpreter, "starting interpreter");
        let group = ExpectationGroup::expecting(properties.ccl_prompt()).with_command(interpreter);
        self.expect("interpreter prompt", &[group]).await?;
        Ok(())
    }

    async fn run_in_session(&mut self, queue: &CommandQueue) -> Result<()> {
        if self.properties.skip_login() || !queue.requires_identity() {
            debug!("skipping interpreter login");
        } else {
            self.login().await?;
        }

        let begin = echo_marker(SESSION_BEGIN_MARKER) + " go";
        let group = ExpectationGroup::expecting(self.properties.ccl_prompt()).with_command(begin);
        self.expect("session begin marker", &[group]).await?;

        for command in queue.in_session() {
            self.run_command(command).await?;
        }
        Ok(())
    }

    async fn login(&mut self) -> Result<()> {
        let (properties, subject) = (self.properties, self.subject);
        let login = subject.login.as_ref().ok_or_else(|| {
            Error::invalid("the queue needs an interpreter login but the subject has none")
        })?;
        let prompt = properties.login_prompt();
        let failures = properties.login_failures().to_vec();
        let groups = [
            ExpectationGroup::expecting(prompt).with_command(LOGIN_COMMAND),
            ExpectationGroup::expecting(prompt)
                .with_command(login.username.as_str())
                .with_failures(failures.clone()),
            ExpectationGroup::expecting(prompt)
                .with_command(login.domain.as_str())
                .with_failures(failures.clone()),
            ExpectationGroup::new(properties.login_success().to_vec())
                .with_command(login.password())
                .with_failures(failures)
                .sensitive(),
        ];
        let response = self.driver.run_groups(&groups).await?;
        match response.code {
            ResponseCode::Success => {
                info!(username = %login.username, domain = %login.domain, "logged in");
                Ok(())
            }
            ResponseCode::Failure => Err(Error::LoginFailed {
                matched: response.matched.unwrap_or_default(),
            }),
            ResponseCode::Timeout => Err(Error::Timeout {
                step: "interpreter login".to_string(),
                waited: self.driver.timeout(),
            }),
        }
    }

    async fn run_command(&mut self, command: &InSessionCommand) -> Result<()> {
        info!(script = command.script(), "running");
        let prompt = self.properties.ccl_prompt().clone();
        let groups: Vec<_> = command
            .commands()
            .iter()
            .map(|c| ExpectationGroup::expecting(&prompt).with_command(c.as_str()))
            .collect();
        let response = self.expect(command.script(), &groups).await?;
        check_banners(command, &response.output)?;

        let replies = extract_replies(&response.output);
        if replies.len() != command.captures().len() {
            return Err(Error::CommandFailed {
                script: command.script().to_string(),
                reason: format!(
                    "expected {} reply document(s), found {}",
                    command.captures().len(),
                    replies.len()
                ),
            });
        }
        for (reply, record) in replies.iter().zip(command.captures()) {
            put_from_json(reply, &mut record.lock())?;
        }
        Ok(())
    }

    /// Run `groups`, treating a timeout or failure match as an error.
    async fn expect(&mut self, step: &str, groups: &[ExpectationGroup]) -> Result<TerminalResponse> {
        let response = self.driver.run_groups(groups).await?;
        match response.code {
            ResponseCode::Success => Ok(response),
            ResponseCode::Timeout => Err(Error::Timeout {
                step: step.to_string(),
                waited: self.driver.timeout(),
            }),
            ResponseCode::Failure => Err(Error::CommandFailed {
                script: step.to_string(),
                reason: response.matched.unwrap_or_default(),
            }),
        }
    }
}

/// Fail on an error banner, or on a non-zero failed-test count when the
/// command checks tests.
fn check_banners(command: &InSessionCommand, output: &str) -> Result<()> {
    if let Some(line) = output.lines().find(|l| l.contains(COMPILE_ERROR_BANNER)) {
        return Err(Error::CommandFailed {
            script: command.script().to_string(),
            reason: line.trim().to_string(),
        });
    }
    if command.check_tests() {
        let banner = Regex::new(TEST_FAILURE_BANNER)?;
        for captures in banner.captures_iter(output) {
            let failed: u64 = captures[1].parse().unwrap_or(u64::MAX);
            if failed > 0 {
                return Err(Error::CommandFailed {
                    script: command.script().to_string(),
                    reason: format!("{failed} test(s) failed"),
                });
            }
        }
    }
    Ok(())
}

/// The reply documents printed between reply markers, in order. Lines are
/// joined without separators to undo terminal wrapping.
fn extract_replies(output: &str) -> Vec<String> {
    let mut replies = Vec::new();
    let mut current: Option<String> = None;
    for line in output.lines() {
        if line.contains(REPLY_BEGIN_MARKER) {
            current = Some(String::new());
        } else if line.contains(REPLY_END_MARKER) {
            replies.extend(current.take());
        } else if let Some(reply) = &mut current {
            reply.push_str(line.trim_end_matches('\r'));
        }
    }
    replies
}

/// Record `next` unless an earlier error already holds the slot.
fn keep_first(outcome: &mut Result<()>, next: Result<()>) {
    if let Err(e) = next {
        if outcome.is_err() {
            warn!(error = %e, "cleanup failed after an earlier error");
        } else {
            *outcome = Err(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_replies_joins_wrapped_lines() {
        let output = format!(
            "echo line\r\n{REPLY_BEGIN_MARKER}\r\n{{\"REPLY\":{{\"A\"\r\n:1}}}}\r\n{REPLY_END_MARKER}\r\n 1)"
        );
        assert_eq!(extract_replies(&output), [r#"{"REPLY":{"A":1}}"#]);
        assert!(extract_replies("nothing here").is_empty());
    }

    #[test]
    fn test_banners() {
        let command = InSessionCommand::new("t", Vec::new()).checking_tests();
        assert!(check_banners(&command, "10 test(s) passed, 0 test(s) failed").is_ok());
        let err = check_banners(&command, "3 test(s) failed\r\n").unwrap_err();
        assert!(matches!(err, Error::CommandFailed { ref reason, .. } if reason == "3 test(s) failed"));

        let compile = InSessionCommand::new("c", Vec::new());
        assert!(check_banners(&compile, "3 test(s) failed").is_ok());
        let err = check_banners(&compile, "ok\n%CCL-E-18-X(1,2) bad token\n").unwrap_err();
        assert!(err.to_string().contains("%CCL-E-18-X(1,2) bad token"));
    }

    #[test]
    fn test_keep_first() {
        let mut outcome = Ok(());
        keep_first(&mut outcome, Ok(()));
        assert!(outcome.is_ok());
        keep_first(&mut outcome, Err(Error::invalid("first")));
        keep_first(&mut outcome, Err(Error::invalid("second")));
        assert_eq!(outcome.unwrap_err().to_string(), "invalid input: first");
    }
}
