//! [`ScriptDrop`] intent: remove a program after the session.
//!
//! Plan syntax: `drop "orders_test"`

use crate::command::{CommandQueue, QueueAdder, require_name};
use crate::error::{Error, Result};
use crate::parser::tokenize;

#[derive(Debug, Clone)]
pub struct ScriptDrop {
    name: String,
}

impl ScriptDrop {
    pub const NAME: &'static str = "drop";

    pub fn new(name: impl Into<String>) -> Self {
        ScriptDrop { name: name.into() }
    }

    pub fn commit(self, queue: &mut CommandQueue) -> Result<()> {
        let name = require_name("script name", &self.name)?;
        queue.push_post_session(drop_command(&name));
        Ok(())
    }
}

impl QueueAdder for ScriptDrop {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let mut tokens = tokenize(args)?.into_iter().map(|t| t.into_text());
        match (tokens.next(), tokens.next()) {
            (Some(name), None) => Ok(Self::new(name)),
            _ => Err(Error::invalid("drop takes exactly one script name")),
        }
    }

    fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> Result<()> {
        (*self).commit(queue)
    }
}

pub(crate) fn drop_command(name: &str) -> String {
    format!("drop program {} go", name.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::TerminalProperties;
    use crate::registry::EngineContext;

    #[test]
    fn test_drop_goes_post_session() {
        let mut queue = CommandQueue::new(EngineContext::new(TerminalProperties::default()));
        ScriptDrop::new("Orders_Test").commit(&mut queue).unwrap();
        assert_eq!(queue.post_session(), ["drop program orders_test go"]);
        assert!(queue.in_session().is_empty());
    }

    #[test]
    fn test_blank_name() {
        let mut queue = CommandQueue::new(EngineContext::new(TerminalProperties::default()));
        assert!(ScriptDrop::new("").commit(&mut queue).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!(ScriptDrop::parse("\"x\"").unwrap().name, "x");
        assert_eq!(ScriptDrop::parse("x").unwrap().name, "x");
        assert!(ScriptDrop::parse("").is_err());
        assert!(ScriptDrop::parse("a b").is_err());
    }
}
