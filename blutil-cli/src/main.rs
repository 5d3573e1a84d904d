//! blutil CLI - Command-line tool for BL600 smartBASIC modules.
//!
//! ## Features
//!
//! - Compile applications with the vendor cross-compiler matching the module
//! - Upload compiled images and start them
//! - List, delete and format the module file system
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use blutil::{NativePort, Session, Transport};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::{Path, PathBuf};

mod commands;
mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if symbols/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Errors raised by the CLI itself rather than the library.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Missing or contradictory arguments.
    #[error("{0}")]
    Usage(String),
    /// An explicitly requested config file is unusable.
    #[error("{0}")]
    Config(String),
}

/// blutil - Compile, upload and run smartBASIC applications on BL600 modules.
///
/// Environment variables:
///   BLUTIL_PORT        - Default serial port
///   BLUTIL_BAUD        - Default baud rate (default: 9600)
///   BLUTIL_MODEL       - Model used instead of querying the module
///   BLUTIL_TOOLCHAIN   - Directory holding the XComp compilers
#[derive(Parser)]
#[command(name = "blutil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port the module is attached to.
    #[arg(short, long, global = true, env = "BLUTIL_PORT")]
    port: Option<String>,

    /// Baud rate of the module UART.
    #[arg(short, long, global = true, env = "BLUTIL_BAUD")]
    baud: Option<u32>,

    /// Device model (e.g. BL600_1.5.70.0); skips querying the module.
    #[arg(short, long, global = true, env = "BLUTIL_MODEL")]
    model: Option<String>,

    /// Directory holding the XComp compilers (default: next to blutil).
    #[arg(long, global = true, env = "BLUTIL_TOOLCHAIN", value_name = "DIR")]
    toolchain: Option<PathBuf>,

    /// Do not pulse DTR to reset the module first.
    #[arg(long, global = true, alias = "no-dtr")]
    no_reset: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a smartBASIC source file.
    Compile {
        /// Source file (.sb).
        file: PathBuf,
    },

    /// Compile and upload an application.
    Load {
        /// Source file, or compiled image with --skip-compile.
        file: PathBuf,

        /// Upload the existing .uwc image without compiling.
        #[arg(long)]
        skip_compile: bool,
    },

    /// Compile, upload and start an application.
    Run {
        /// Source file, or compiled image with --skip-compile.
        file: PathBuf,

        /// Do not compile before uploading.
        #[arg(long)]
        skip_compile: bool,

        /// Start the copy already on the module.
        #[arg(long)]
        skip_load: bool,
    },

    /// List files on the module.
    List,

    /// Delete a file from the module.
    Delete {
        /// File whose device name should be deleted.
        file: PathBuf,
    },

    /// Erase the module file system.
    Format {
        /// Confirm erasing every file on the module.
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => 2,
                CliError::Config(_) => 3,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<blutil::Error>() {
            return match lib_err {
                blutil::Error::Upload { .. } => 9,
                other => match other.root() {
                    // Serial failures on an open port are not connection failures
                    blutil::Error::Connection { .. } => 4,
                    blutil::Error::NoResponse { .. } => 5,
                    blutil::Error::Device { .. } => 6,
                    blutil::Error::UnexpectedResponse { .. } => 7,
                    blutil::Error::Compile(_) => 8,
                    _ => 1,
                },
            };
        }
    }
    1
}

fn main() {
    let cli = Cli::parse();

    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "blutil v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path).map_err(|e| CliError::Config(format!("{e:#}")))?
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Compile { file } => {
            commands::build::cmd_build(cli, &config, file, commands::build::Steps::COMPILE)?;
        },
        Commands::Load { file, skip_compile } => {
            let steps = commands::build::Steps {
                compile: !skip_compile,
                load: true,
                run: false,
            };
            commands::build::cmd_build(cli, &config, file, steps)?;
        },
        Commands::Run {
            file,
            skip_compile,
            skip_load,
        } => {
            let steps = commands::build::Steps {
                compile: !skip_compile && !skip_load,
                load: !skip_load,
                run: true,
            };
            commands::build::cmd_build(cli, &config, file, steps)?;
        },
        Commands::List => {
            commands::files::cmd_list(cli, &config)?;
        },
        Commands::Delete { file } => {
            commands::files::cmd_delete(cli, &config, file)?;
        },
        Commands::Format { yes } => {
            commands::files::cmd_format(cli, &config, *yes)?;
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}

/// Model forced on the command line or in the config, if any.
fn resolve_model<'a>(cli: &'a Cli, config: &'a Config) -> Option<&'a str> {
    cli.model
        .as_deref()
        .or(config
            .device
            .model
            .as_deref())
}

/// Whether to pulse DTR before talking to the module.
fn should_reset(cli: &Cli, config: &Config) -> bool {
    !cli.no_reset && config.reset_enabled()
}

/// Open the configured port and start a session on it.
fn open_session(cli: &Cli, config: &Config) -> Result<Session<NativePort>> {
    let port = cli
        .port
        .clone()
        .or_else(|| {
            config
                .connection
                .port
                .clone()
        })
        .ok_or_else(|| {
            CliError::Usage(
                "no serial port given; use --port, BLUTIL_PORT or [connection] port".to_string(),
            )
        })?;
    let baud = cli
        .baud
        .unwrap_or_else(|| config.baud());

    if !cli.quiet {
        let icon = if use_fancy_output() { "🔌" } else { "*" };
        eprintln!(
            "{} Using port {} at {} baud",
            style(icon).cyan(),
            style(&port).bold(),
            baud
        );
    }

    let transport = Transport::open(&port, baud)?;
    let mut session = Session::new(transport, config.session_config(resolve_model(cli, config)));
    if should_reset(cli, config) {
        session.reset()?;
    }
    Ok(session)
}

/// Toolchain directory from the command line.
fn toolchain_dir(cli: &Cli) -> Option<&Path> {
    cli.toolchain
        .as_deref()
}
