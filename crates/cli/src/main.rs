// glmatch CLI - build GL/database lookup workbooks from a ZIP of exports

mod exit_codes;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "glmatch")]
#[command(about = "Match GL source files against a database workbook and build a lookup workbook")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the output workbook from a ZIP archive
    #[command(after_help = "\
Examples:
  glmatch run uploads.zip
  glmatch run uploads.zip -o november.xlsx
  glmatch run uploads.zip --search 004512 --json
  glmatch run uploads.zip --config glmatch.toml -vv")]
    Run {
        /// ZIP archive holding the database workbook and the source files
        archive: PathBuf,

        /// Output workbook
        #[arg(long, short = 'o', default_value = "GL_File.xlsx")]
        output: PathBuf,

        /// Layout/column config (TOML); defaults apply when omitted
        #[arg(long, env = "GLMATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Value preset in every sheet's search box
        #[arg(long)]
        search: Option<String>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Show what `run` would do without reading sources or writing output
    #[command(after_help = "\
Examples:
  glmatch plan uploads.zip
  glmatch plan uploads.zip --json")]
    Plan {
        /// ZIP archive holding the database workbook and the source files
        archive: PathBuf,

        /// Layout/column config (TOML); defaults apply when omitted
        #[arg(long, env = "GLMATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Print the plan as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as TOML
    #[command(after_help = "\
Examples:
  glmatch config > glmatch.toml")]
    Config,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  glmatch-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  glmatch-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: glmatch <command> [options]");
            eprintln!("       glmatch --help for more information");
            Ok(())
        }
        Some(Commands::Run {
            archive,
            output,
            config,
            search,
            json,
        }) => run::cmd_run(archive, output, config, search, json),
        Some(Commands::Plan { archive, config, json }) => run::cmd_plan(archive, config, json),
        Some(Commands::Config) => run::cmd_config(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
