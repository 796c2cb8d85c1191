//! CLI tools for pipeliner-schema
//!
//! - `normalize`: Re-emit a definition in canonical structured form
//! - `check`: Decode and validate a definition
//! - `completions`: Generate shell completions

pub mod check;
pub mod completions;
pub mod document;
pub mod normalize;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use pipeliner_schema::{Config, OutputFormat, init_logging};
use std::path::PathBuf;

/// Name of the binary
pub const BIN_NAME: &str = "pipeliner-schema";

/// Environment variable enabling logging
const DEBUG_ENV: &str = "PIPELINER_SCHEMA_DEBUG";

/// CLI arguments for pipeliner-schema
#[derive(Parser, Debug)]
#[command(name = BIN_NAME)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a definition and print it in canonical form
    Normalize {
        /// Definition file (YAML or JSON)
        file: PathBuf,
        /// Output format (defaults to the configured format)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Expand matrix strategies into one step per cell
        #[arg(long)]
        expand: bool,
    },

    /// Decode and validate a definition
    Check {
        /// Definition file to validate
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Yaml,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid configuration override")
}

/// Parse and execute CLI arguments
pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    if args.verbose || std::env::var(DEBUG_ENV).is_ok() {
        init_logging(&config.log_level);
    }

    match args.command {
        Command::Normalize {
            file,
            format,
            output,
            expand,
        } => {
            let normalize_config = normalize::NormalizeConfig {
                format: match format {
                    Some(FormatArg::Yaml) => OutputFormat::Yaml,
                    Some(FormatArg::Json) => OutputFormat::Json,
                    None => config.output_format,
                },
                expand,
            };

            let normalized = normalize::normalize_file(&file, normalize_config)?;

            if let Some(output_path) = output {
                normalize::save_output(&normalized, &output_path)?;
            } else {
                println!("{normalized}");
            }
        }
        Command::Check { file } => {
            check::check_pipeline(&file)?;
        }
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell_enum = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };

            let completions = completions::generate_completions(shell_enum)?;

            if let Some(output_path) = output {
                completions::save_completions(&completions, &output_path)?;
            } else {
                println!("{completions}");
            }
        }
    }

    Ok(())
}
