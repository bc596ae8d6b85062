//! [`ScriptExecution`] intent: run a compiled program, optionally replacing
//! its request/reply records.
//!
//! Plan syntax: `execute "orders_test" ["text" 42 0.5 ...]`

use crate::command::{
    CommandQueue, InSessionCommand, QueueAdder, REPLY_BEGIN_MARKER, REPLY_END_MARKER,
    echo_marker, require_name,
};
use crate::error::{Error, Result};
use crate::parser::{Token, tokenize};
use crate::record::{
    MAX_LINE_WIDTH, SharedRecord, declaration_commands, format_float, quote_literal,
    setter_commands,
};

/// A positional argument passed to the program.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    String(String),
    Integer(i64),
    Float(f64),
}

impl Argument {
    /// The argument as interpreter text.
    pub fn render(&self) -> String {
        match self {
            Argument::String(s) => quote_literal(s),
            Argument::Integer(i) => i.to_string(),
            Argument::Float(f) => format_float(*f),
        }
    }

    fn from_token(token: Token) -> Result<Self> {
        match token {
            Token::Quoted(s) => Ok(Argument::String(s)),
            Token::Bare(s) => {
                if let Ok(i) = s.parse() {
                    Ok(Argument::Integer(i))
                } else if let Ok(f) = s.parse() {
                    Ok(Argument::Float(f))
                } else {
                    Err(Error::invalid(format!(
                        "argument {s} is neither a number nor a quoted string"
                    )))
                }
            }
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::String(value)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Integer(value)
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Integer(value.into())
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Argument::Float(value)
    }
}

/// Runs one program.
///
/// Each replaced record is declared and populated before the program runs,
/// handed to it with `with replace(...)`, and read back afterwards: its
/// contents are printed as JSON between reply markers and written into the
/// same [`SharedRecord`].
#[derive(Debug, Clone)]
pub struct ScriptExecution {
    name: String,
    arguments: Vec<Argument>,
    replacements: Vec<(String, SharedRecord)>,
    requires_identity: bool,
}

impl ScriptExecution {
    pub const NAME: &'static str = "execute";

    pub fn new(name: impl Into<String>) -> Self {
        ScriptExecution {
            name: name.into(),
            arguments: Vec::new(),
            replacements: Vec::new(),
            requires_identity: true,
        }
    }

    pub fn with_argument(mut self, argument: impl Into<Argument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    /// Replace the program's `structure` record (e.g. `"REQUEST"`) with
    /// `record`.
    pub fn with_replace(mut self, structure: &str, record: SharedRecord) -> Self {
        self.replacements.push((structure.trim().to_ascii_uppercase(), record));
        self
    }

    /// Whether the program needs the interpreter login. Defaults to true.
    pub fn with_identity(mut self, required: bool) -> Self {
        self.requires_identity = required;
        self
    }

    pub fn commit(self, queue: &mut CommandQueue) -> Result<()> {
        let name = require_name("script name", &self.name)?.to_ascii_lowercase();
        let mut commands = Vec::new();
        let mut captures = Vec::new();
        let mut replace = Vec::new();

        for (structure, record) in &self.replacements {
            if structure.is_empty() {
                return Err(Error::invalid("replaced structure name must not be blank"));
            }
            let guard = record.lock();
            let variable = guard.name().to_ascii_lowercase();
            commands.extend(declaration_commands(&variable, guard.structure()));
            commands.extend(setter_commands(&guard)?);
            replace.push(format!("replace(\"{structure}\", {variable})"));
            drop(guard);
            captures.push(record.clone());
        }

        commands.push(self.execute_command(&name, &replace)?);
        for record in &captures {
            let variable = record.lock().name().to_ascii_lowercase();
            commands.push(capture_command(&variable));
        }

        if self.requires_identity {
            queue.require_identity();
        }
        queue.push_in_session(
            InSessionCommand::new(&name, commands)
                .checking_tests()
                .capturing(captures),
        );
        Ok(())
    }

    fn execute_command(&self, name: &str, replace: &[String]) -> Result<String> {
        let head = format!("execute {name}");
        if head.len() > MAX_LINE_WIDTH {
            return Err(Error::invalid(format!(
                "script name {name} does not fit on one line"
            )));
        }
        let arguments: Vec<String> = self.arguments.iter().map(Argument::render).collect();
        let mut lines = Vec::new();
        let single = if arguments.is_empty() {
            head.clone()
        } else {
            format!("{head} {}", arguments.join(", "))
        };
        if single.len() <= MAX_LINE_WIDTH {
            lines.push(single);
        } else {
            lines.push(head);
            let last = arguments.len().saturating_sub(1);
            for (i, argument) in arguments.iter().enumerate() {
                let line = if i < last {
                    format!("{argument},")
                } else {
                    argument.clone()
                };
                if line.len() > MAX_LINE_WIDTH {
                    return Err(Error::invalid(format!(
                        "argument {} of {name} does not fit on one line",
                        i + 1
                    )));
                }
                lines.push(line);
            }
        }
        for (i, clause) in replace.iter().enumerate() {
            if i == 0 {
                lines.push(format!("with {clause}"));
            } else {
                lines.push(format!(", {clause}"));
            }
        }
        lines.push("go".to_string());
        Ok(lines.join("\n"))
    }
}

impl QueueAdder for ScriptExecution {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let mut tokens = tokenize(args)?.into_iter();
        let name = tokens
            .next()
            .ok_or_else(|| Error::invalid("execute needs a script name"))?
            .into_text();
        let arguments = tokens.map(Argument::from_token).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(name).with_arguments(arguments))
    }

    fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> Result<()> {
        (*self).commit(queue)
    }
}

/// Print `variable` as JSON between the reply markers.
fn capture_command(variable: &str) -> String {
    format!(
        "{}\ncall echojson({variable}, \"MINE\")\n{} go",
        echo_marker(REPLY_BEGIN_MARKER),
        echo_marker(REPLY_END_MARKER)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::TerminalProperties;
    use crate::record::{DataType, Record, Structure};
    use crate::registry::EngineContext;

    fn queue() -> CommandQueue {
        CommandQueue::new(EngineContext::new(TerminalProperties::default()))
    }

    #[test]
    fn test_plain_execution() {
        let mut queue = queue();
        ScriptExecution::new("Orders_Test")
            .with_argument("MINE")
            .with_argument(10)
            .with_argument(0.5)
            .commit(&mut queue)
            .unwrap();
        let command = &queue.in_session()[0];
        assert_eq!(command.script(), "orders_test");
        assert!(command.check_tests());
        assert_eq!(
            command.commands(),
            ["execute orders_test 'MINE', 10, 0.500000\ngo"]
        );
        assert!(queue.requires_identity());
    }

    #[test]
    fn test_identity_can_be_waived() {
        let mut queue = queue();
        ScriptExecution::new("x")
            .with_identity(false)
            .commit(&mut queue)
            .unwrap();
        assert!(!queue.requires_identity());
    }

    #[test]
    fn test_replaced_records_are_declared_set_and_captured() {
        let structure = Structure::builder()
            .scalar("id", DataType::F8)
            .scalar("note", DataType::String)
            .build()
            .unwrap();
        let mut request = Record::new("request", structure.clone());
        request.set_f8("id", 4.0).unwrap();
        let request = request.shared();
        let reply = Record::new("reply", structure).shared();

        let mut queue = queue();
        ScriptExecution::new("orders_test")
            .with_replace("request", request)
            .with_replace("REPLY", reply)
            .commit(&mut queue)
            .unwrap();

        let command = &queue.in_session()[0];
        assert_eq!(command.captures().len(), 2);
        let commands = command.commands();
        assert_eq!(commands[0], "record request (\n1 id = f8\n1 note = vc\n) go");
        assert_eq!(commands[1], "set request->id = 4.000000 go");
        assert_eq!(commands[2], "record reply (\n1 id = f8\n1 note = vc\n) go");
        assert_eq!(
            commands[3],
            "execute orders_test\nwith replace(\"REQUEST\", request)\n, replace(\"REPLY\", reply)\ngo"
        );
        assert!(commands[4].contains("call echojson(request, \"MINE\")"));
        assert!(!commands[4].contains(REPLY_BEGIN_MARKER));
        assert!(commands[5].contains("call echojson(reply, \"MINE\")"));
        assert!(commands[5].ends_with(" go"));
    }

    #[test]
    fn test_long_argument_list_wraps() {
        let long = "x".repeat(100);
        let mut queue = queue();
        ScriptExecution::new("p")
            .with_argument(long.as_str())
            .with_argument(long.as_str())
            .commit(&mut queue)
            .unwrap();
        let command = &queue.in_session()[0].commands()[0];
        assert!(command.lines().all(|l| l.len() <= MAX_LINE_WIDTH));
        assert_eq!(command.lines().count(), 4);
    }

    #[test]
    fn test_overlong_name_rejected() {
        let mut queue = queue();
        let err = ScriptExecution::new("p".repeat(130))
            .commit(&mut queue)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got: {err}");
        assert!(queue.in_session().is_empty());
    }

    #[test]
    fn test_long_name_wraps_its_argument() {
        let name = "p".repeat(120);
        let mut queue = queue();
        ScriptExecution::new(name.as_str())
            .with_argument("some text")
            .commit(&mut queue)
            .unwrap();
        let command = &queue.in_session()[0].commands()[0];
        assert_eq!(
            command.as_str(),
            format!("execute {name}\n'some text'\ngo")
        );
    }

    #[test]
    fn test_blank_name() {
        assert!(ScriptExecution::new(" ").commit(&mut queue()).is_err());
    }

    #[test]
    fn test_parse_arguments() {
        let execution = ScriptExecution::parse(r#""p" "text" 42 -1.5"#).unwrap();
        assert_eq!(execution.name, "p");
        assert_eq!(
            execution.arguments,
            [
                Argument::String("text".into()),
                Argument::Integer(42),
                Argument::Float(-1.5),
            ]
        );
        assert!(ScriptExecution::parse("p word").is_err());
        assert!(ScriptExecution::parse("").is_err());
    }

    #[test]
    fn test_argument_render() {
        assert_eq!(Argument::from("it's").render(), r#"concat('it', "'", 's')"#);
        assert_eq!(Argument::Integer(-3).render(), "-3");
    }
}
