use anyhow::{anyhow, bail, Context};
use clap::Parser;
use ember_vm::{disassemble, BytecodeCompiler, InterpretError, ScriptCompiler, VmConfig, VM};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Ember - NaN-boxed bytecode virtual machine
#[derive(Parser)]
#[command(name = "ember")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run precompiled Ember bytecode", long_about = "Ember bytecode runner\n\nExecutes a function prototype serialized as JSON:\n  - runs it to completion, including every fiber it spawns\n  - or prints its disassembly with --disassemble")]
struct Cli {
    /// Bytecode file to execute
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// VM configuration as JSON (fields not given keep their defaults)
    #[arg(short, long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Print the disassembled bytecode instead of running it
    #[arg(long)]
    disassemble: bool,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the default filter
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ember=warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("Error reading file '{}'", cli.file.display()))?;
    if source.trim().is_empty() {
        bail!("File '{}' is empty", cli.file.display());
    }

    let proto = BytecodeCompiler
        .compile(&source)
        .map_err(|err| anyhow!("Compile error in '{}':\n{}", cli.file.display(), err))?;
    debug!(function = %proto.name, bytes = proto.code.len(), "loaded bytecode");

    if cli.disassemble {
        print!("{}", disassemble(&proto));
        return Ok(());
    }

    let mut vm = VM::with_config(config);
    vm.interpret(&proto).map_err(|err| anyhow!(report(&err)))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VmConfig> {
    match path {
        Some(path) => VmConfig::from_path(path)
            .with_context(|| format!("Error loading config '{}'", path.display())),
        None => Ok(VmConfig::default()),
    }
}

/// Error message followed by the backtrace, one frame per line
fn report(err: &InterpretError) -> String {
    match err {
        InterpretError::Compile(err) => format!("Compile error:\n{}", err),
        InterpretError::Runtime { error, backtrace } => {
            let mut text = format!("Runtime error: {}", error);
            for frame in backtrace {
                text.push_str("\n  ");
                text.push_str(frame);
            }
            text
        }
    }
}
