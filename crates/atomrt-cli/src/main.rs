//! # atomrt CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use atomrt_cli::check::{run_check, CheckArgs};
use atomrt_cli::modes::run_modes;
use atomrt_cli::validate::{run_validate, ValidateArgs};

/// atomrt — validated slot-based attribute storage.
///
/// Builds class schemas from YAML/JSON descriptors, prints their slot
/// layouts, and validates instance documents against them.
#[derive(Parser, Debug)]
#[command(name = "atomrt", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every class in a descriptor and print its slot layout.
    Check(CheckArgs),

    /// Construct an instance from a JSON document and report the result.
    Validate(ValidateArgs),

    /// List every validation mode, flagging legacy ones.
    Modes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = match cli.command {
        Commands::Check(args) => run_check(&args, &mut stdout),
        Commands::Validate(args) => run_validate(&args, &mut stdout),
        Commands::Modes => run_modes(&mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(atomrt_cli::EXIT_OPERATIONAL)
        }
    }
}
