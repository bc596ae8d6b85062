use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cclexpect::{
    CommandQueue, DynamicCompiler, EngineContext, ResourceUpload, ScpTransfer, ScriptCompiler,
    ScriptDrop, ScriptExecution, SessionConfig, SessionExecutor, demux::SharedSink,
    parse_file, transport::PtyConnector,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "cclexpect",
    about = "Compile, run and drop CCL programs on a remote host",
    version
)]
struct Args {
    /// TOML file with session settings; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote host
    #[arg(long)]
    host: Option<String>,

    /// Remote OS user
    #[arg(short, long)]
    user: Option<String>,

    /// Environment passed to envset
    #[arg(short, long)]
    environment: Option<String>,

    /// Interpreter login user
    #[arg(long)]
    ccl_user: Option<String>,

    /// Interpreter login domain (defaults to the environment)
    #[arg(long)]
    ccl_domain: Option<String>,

    /// Interpreter login password
    #[arg(long, env = "CCLEXPECT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Seconds to wait for each prompt
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not run envset before starting the interpreter
    #[arg(long)]
    skip_envset: bool,

    /// Start the debug interpreter
    #[arg(long)]
    debug_ccl: bool,

    /// Write the terminal transcript here
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload and compile a .prg file
    Compile {
        file: PathBuf,
        /// Include or subroutine files to upload with it
        #[arg(short, long)]
        dependency: Vec<PathBuf>,
        /// Save the compiler listing here
        #[arg(short, long)]
        listing: Option<PathBuf>,
    },
    /// Compile an .inc or .sub file inside a generated wrapper
    CompileDynamic {
        file: PathBuf,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Execute a compiled program
    Execute {
        name: String,
        /// Arguments; numbers are passed as numbers, anything else as text
        args: Vec<String>,
    },
    /// Drop a program
    Drop { name: String },
    /// Copy files to their remote directories
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run every intent in a plan file
    Run { plan: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let context = EngineContext::new(
        config
            .to_properties()
            .context("Invalid terminal settings")?,
    );

    // Build the whole queue before connecting so bad input fails fast.
    let mut queue = CommandQueue::new(context.clone());
    add_intents(&args.command, &mut queue).context("Invalid request")?;
    let subject = config.subject(args.password.clone())?;

    let executor = SessionExecutor::new(
        context,
        Arc::new(PtyConnector::ssh()),
        Arc::new(ScpTransfer::default()),
    )
    .with_output(SharedSink::new(std::io::stdout()));
    executor
        .execute(queue, &subject)
        .await
        .with_context(|| format!("Session on {} failed", subject.destination()))?;
    Ok(())
}

/// The config file, if any, with command-line flags applied on top.
fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let overrides = [
        (&mut config.host, &args.host),
        (&mut config.user, &args.user),
        (&mut config.environment, &args.environment),
        (&mut config.ccl_user, &args.ccl_user),
        (&mut config.ccl_domain, &args.ccl_domain),
    ];
    for (slot, flag) in overrides {
        if flag.is_some() {
            slot.clone_from(flag);
        }
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = Some(secs);
    }
    if args.log_file.is_some() {
        config.log_file.clone_from(&args.log_file);
    }
    config.skip_envset |= args.skip_envset;
    config.debug_interpreter |= args.debug_ccl;
    Ok(config)
}

fn add_intents(command: &Command, queue: &mut CommandQueue) -> cclexpect::Result<()> {
    match command {
        Command::Compile {
            file,
            dependency,
            listing,
        } => {
            let mut compiler = ScriptCompiler::new(file).with_dependencies(dependency);
            if let Some(listing) = listing {
                compiler = compiler.with_listing(listing);
            }
            compiler.commit(queue)
        }
        Command::CompileDynamic { file, name } => {
            let mut compiler = DynamicCompiler::new(file);
            if let Some(name) = name {
                compiler = compiler.with_name(name);
            }
            compiler.commit(queue)
        }
        Command::Execute { name, args } => ScriptExecution::new(name)
            .with_arguments(args.iter().map(String::as_str).map(parse_argument))
            .commit(queue),
        Command::Drop { name } => ScriptDrop::new(name).commit(queue),
        Command::Upload { files } => ResourceUpload::new(files).commit(queue),
        Command::Run { plan } => {
            for intent in parse_file(plan)? {
                queue.add(intent)?;
            }
            Ok(())
        }
    }
}

fn parse_argument(arg: &str) -> cclexpect::Argument {
    if let Ok(i) = arg.parse() {
        cclexpect::Argument::Integer(i)
    } else if let Ok(f) = arg.parse() {
        cclexpect::Argument::Float(f)
    } else {
        cclexpect::Argument::String(arg.to_string())
    }
}
