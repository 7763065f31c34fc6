mod check;
mod config;
mod output;
mod resolve;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::process::ExitCode;

/// Exit code for an infeasible request
pub const EXIT_INFEASIBLE: i32 = 1;

/// Exit code for invalid input and solver failures
pub const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "modsolve")]
#[command(about = "Pick one candidate per mod so that every dependency and breakage holds")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a request and print the chosen candidates
    Resolve(resolve::ResolveArgs),

    /// Validate a request without solving it
    Check(check::CheckArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, takes precedence over the flag
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Resolve(args) => resolve::execute(args),
        Commands::Check(args) => check::execute(args),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::from(EXIT_FATAL)
        }
    }
}
