mod compile;
mod drop;
mod dynamic_compile;
mod execute;
mod upload;

pub use compile::ScriptCompiler;
pub use drop::ScriptDrop;
pub use dynamic_compile::{DynamicCompiler, MAX_SCRIPT_NAME, generate_name};
pub use execute::{Argument, ScriptExecution};
pub use upload::ResourceUpload;
