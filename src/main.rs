/// Lilium CLI: compile sources to modules, link and execute modules, dump modules
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use itertools::Itertools;
use tracing::{debug, info, warn, Level};

use lilium::backend::bytecode::{
    compile_source, disassemble, load_file, load_modules, module_name, BytecodeVM, CompileError, LinkError,
    Linker, LoadError, RuntimeError,
};
use lilium::config::{Config, ConfigError};

#[derive(Debug, Parser)]
#[command(name = "lilium", version, about = "Register-machine compiler, linker and VM")]
struct Cli {
    /// Configuration file (default: ./lilium.toml, then the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Raise the log level (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile source files, one module file per source
    Compile {
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Directory for the module files (overrides compiler.output_dir)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Link module files in the given order and run the first one's entry section
    Execute {
        #[arg(required = true)]
        modules: Vec<PathBuf>,

        /// Trace every executed instruction and call
        #[arg(long)]
        trace: bool,

        /// Instruction budget, 0 for unlimited (overrides vm.max_steps)
        #[arg(long, value_name = "N")]
        max_steps: Option<u64>,
    },
    /// Print a module file as assembly text
    Dump { module: PathBuf },
}

#[derive(Debug)]
enum Error {
    Config(ConfigError),
    Io(PathBuf, std::io::Error),
    Compile(PathBuf, CompileError),
    Load(LoadError),
    Link(LinkError),
    Runtime(RuntimeError),
    /// Some of several sources failed; each failure was already reported
    Failed(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{}", e),
            Error::Io(path, e) => write!(f, "{}: {}", path.display(), e),
            Error::Compile(path, e) => write!(f, "{}: {}", path.display(), e),
            Error::Load(e) => write!(f, "Load error: {}", e),
            Error::Link(e) => write!(f, "Link error: {}", e),
            Error::Runtime(e) => write!(f, "Runtime error: {}", e),
            Error::Failed(n) => write!(f, "{} source file(s) failed to compile", n),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Error::Load(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

fn init_logging(verbose: u8, trace: bool) {
    let level = match verbose {
        _ if trace => Level::TRACE,
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn compile_one(config: &Config, source: &Path) -> Result<PathBuf, Error> {
    let text = fs::read_to_string(source).map_err(|e| Error::Io(source.to_path_buf(), e))?;
    let compiled =
        compile_source(&module_name(source), &text).map_err(|e| Error::Compile(source.to_path_buf(), e))?;

    let output = config.output_path(source);
    if let Some(dir) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| Error::Io(dir.to_path_buf(), e))?;
    }
    fs::write(&output, compiled.bytes()).map_err(|e| Error::Io(output.clone(), e))?;
    debug!(
        target: "lilium::cli",
        module = compiled.name(),
        bytes = compiled.bytes().len(),
        functions = compiled.functions().len(),
        "wrote {}",
        output.display()
    );
    Ok(output)
}

/// Compile every source, continuing past failures
fn compile(config: &Config, sources: &[PathBuf]) -> Result<(), Error> {
    let mut failed = 0;
    for source in sources {
        match compile_one(config, source) {
            Ok(output) => info!(target: "lilium::cli", "{} -> {}", source.display(), output.display()),
            Err(e) => {
                eprintln!("{}", e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(Error::Failed(failed));
    }
    Ok(())
}

fn execute(config: &Config, modules: &[PathBuf]) -> Result<i64, Error> {
    let modules = load_modules(modules)?;
    let image = Linker::new().link(&modules)?;
    debug!(
        target: "lilium::cli",
        modules = image.modules().len(),
        functions = image.functions().len(),
        instructions = image.code().len(),
        "linked image"
    );

    let mut vm = BytecodeVM::with_config(Arc::new(image), config.vm.clone());
    let result = vm.run()?;
    debug!(
        target: "lilium::cli",
        steps = vm.executed_instructions(),
        peak_depth = vm.peak_call_depth(),
        "halted"
    );
    Ok(result)
}

fn run(cli: Cli) -> Result<(), Error> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Compile { sources, output_dir } => {
            if output_dir.is_some() {
                config.compiler.output_dir = output_dir;
            }
            compile(&config, &sources)
        }
        Command::Execute {
            modules,
            trace,
            max_steps,
        } => {
            config.vm.trace |= trace;
            if let Some(max_steps) = max_steps {
                config.vm.max_steps = max_steps;
            }
            for path in modules.iter().duplicates() {
                warn!(target: "lilium::cli", "{} is listed more than once", path.display());
            }
            let result = execute(&config, &modules)?;
            println!("{}", result);
            Ok(())
        }
        Command::Dump { module } => {
            let module = load_file(&module)?;
            print!("{}", disassemble(&module));
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let trace = matches!(cli.command, Command::Execute { trace: true, .. });
    init_logging(cli.verbose, trace);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
