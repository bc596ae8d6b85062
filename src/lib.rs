//! # cclexpect
//!
//! Terminal automation and record marshalling for a remote CCL interpreter.
//!
//! Callers describe what a session should do as intents (compile a script,
//! execute it with request/reply records, upload files, drop a script). The
//! intents build a [`CommandQueue`]; a [`SessionExecutor`] then drives an
//! interactive shell on the remote host through it, expect-style, and writes
//! the interpreter's JSON replies back into the caller's records.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cclexpect::{
//!     CommandQueue, DataType, EngineContext, InterpreterLogin, PtyConnector, Record,
//!     ScpTransfer, ScriptCompiler, ScriptExecution, SessionExecutor, Structure, Subject,
//! };
//!
//! #[tokio::main]
//! async fn main() -> cclexpect::Result<()> {
//!     let context = EngineContext::global();
//!
//!     let structure = Structure::builder()
//!         .scalar("status", DataType::Character(1))
//!         .scalar("message", DataType::String)
//!         .build()?;
//!     let reply = Record::new("reply", structure).shared();
//!
//!     let mut queue = CommandQueue::new(context.clone());
//!     ScriptCompiler::new("src/orders.prg").commit(&mut queue)?;
//!     ScriptExecution::new("orders")
//!         .with_argument("MINE")
//!         .with_replace("REPLY", reply.clone())
//!         .commit(&mut queue)?;
//!
//!     let subject = Subject::new("node1", "d_build")
//!         .with_environment("build")
//!         .with_login(InterpreterLogin::new("jdoe", "build", "secret"));
//!     let executor = SessionExecutor::new(
//!         context,
//!         Arc::new(PtyConnector::ssh()),
//!         Arc::new(ScpTransfer::default()),
//!     );
//!     executor.execute(queue, &subject).await?;
//!
//!     println!("status = {}", reply.lock().get_string("status")?);
//!     Ok(())
//! }
//! ```
//!
//! ## Plan files
//!
//! The `cclexpect run` subcommand reads intents from a file with
//! [`parse_file`], one per line:
//!
//! | Intent | Description |
//! |--------|-------------|
//! | `compile "x.prg" ["dep.inc"...]` | Upload and compile a program |
//! | `compile-dynamic "x.inc" ["name"]` | Compile an include inside a generated wrapper |
//! | `execute "name" [args...]` | Run a program; quoted args are strings, bare ones numbers |
//! | `drop "name"` | Drop a program after the session |
//! | `upload "file"...` | Copy files to their remote directories |
//! | `# comment` | Full-line or inline comment |
//!
//! ## Records
//!
//! [`Record`] values cross the wire twice: [`setter_commands`] turns one into
//! `set ... go` assignments that never exceed the interpreter's 132-column
//! line limit, and [`put_from_json`] fills one from the interpreter's JSON
//! output.
//!
//! ## Adding an intent
//!
//! Implement [`QueueAdder`] and register the type in [`parser`]:
//!
//! ```no_run
//! use cclexpect::command::{CommandQueue, QueueAdder};
//!
//! pub struct Touch;
//!
//! impl Touch {
//!     pub const NAME: &'static str = "touch";
//!
//!     pub fn commit(self, queue: &mut CommandQueue) -> cclexpect::Result<()> {
//!         queue.add_pre_session("touch $cer_temp/marker");
//!         Ok(())
//!     }
//! }
//!
//! impl QueueAdder for Touch {
//!     fn name(&self) -> &'static str { Self::NAME }
//!
//!     fn parse(_args: &str) -> cclexpect::Result<Self> {
//!         Ok(Self)
//!     }
//!
//!     fn add_to(self: Box<Self>, queue: &mut CommandQueue) -> cclexpect::Result<()> {
//!         (*self).commit(queue)
//!     }
//! }
//! ```

pub mod command;
pub mod commands;
pub mod config;
pub mod demux;
pub mod error;
pub mod executor;
pub mod parser;
pub mod paths;
pub mod properties;
pub mod record;
pub mod registry;
pub mod subject;
pub mod terminal;
pub mod transport;

pub use command::{CommandQueue, InSessionCommand, QueueAdder};
pub use commands::{
    Argument, DynamicCompiler, ResourceUpload, ScriptCompiler, ScriptDrop, ScriptExecution,
};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use executor::{COMPILE_ERROR_BANNER, SessionExecutor, TEST_FAILURE_BANNER};
pub use parser::{parse_file, parse_str};
pub use paths::{RemoteDirectory, RemoteFile, resolve};
pub use properties::{
    DEFAULT_EXPECTATION_TIMEOUT, LogScope, TerminalProperties, TerminalPropertiesBuilder,
};
pub use record::{
    DataType, Record, RecordError, SharedRecord, Structure, put_from_json, setter_commands,
};
pub use registry::{EngineContext, ScriptRegistry};
pub use subject::{InterpreterLogin, Subject};
pub use terminal::{ExpectationGroup, ResponseCode, TerminalDriver, TerminalResponse};
pub use transport::{Connector, FileTransfer, PtyConnector, ScpTransfer, Transport};
