//! Rime CLI
//!
//! The one-line contract: flags, then a script to require, then arguments
//! exposed to the script as `ARGV`. Exit 0 on success, non-zero on any
//! unhandled error.

mod config;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rime_runtime::{NullBackend, RuntimeError, intern};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rime", disable_version_flag = true)]
#[command(about = "Rime - a prototype-based scripting language", long_about = None)]
struct Cli {
    /// Enable debug diagnostics
    #[arg(short = 'd', long)]
    debug: bool,

    /// Print version information and exit
    #[arg(short = 'v', long)]
    version: bool,

    /// Start an interactive prompt after loading scripts
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Require a file before the script runs (repeatable)
    #[arg(short = 'r', long = "require", value_name = "PATH")]
    require: Vec<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,

    /// Script to run; everything after it lands in ARGV
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Arguments exposed to the script as ARGV
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.version {
        println!("Rime {}", rime_runtime::version());
        return ExitCode::SUCCESS;
    }

    rime_runtime::init(Box::new(NullBackend));

    let config = config::load();
    if !config.load_paths.is_empty() {
        tracing::debug!(paths = ?config.load_paths, "extending load paths from rime.toml");
    }
    for path in &config.load_paths {
        rime_runtime::module::add_load_path(path);
    }
    if let Some(user_lib) = home::home_dir().map(|h| h.join(".rime").join("lib"))
        && user_lib.is_dir()
    {
        rime_runtime::module::add_load_path(&user_lib.to_string_lossy());
    }

    set_argv(&cli.args);

    for path in &cli.require {
        if let Err(e) = rime_runtime::module::require(&path.to_string_lossy()) {
            return fail(&e);
        }
    }

    if let Some(script) = &cli.script
        && let Err(e) = rime_runtime::module::require(&script.to_string_lossy())
    {
        return fail(&e);
    }

    if cli.interactive {
        repl::interactive_prompt();
    }

    ExitCode::SUCCESS
}

fn init_logging(cli: &Cli) {
    let default = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("RIME_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn set_argv(args: &[String]) {
    let argv = rime_runtime::array::create();
    for arg in args {
        rime_runtime::array::push(argv, rime_runtime::string::create(arg).value());
    }
    let _ = rime_runtime::set_global(intern("ARGV"), argv.value());
}

fn fail(error: &RuntimeError) -> ExitCode {
    eprintln!("rime: {error}");
    ExitCode::FAILURE
}
