use anyhow::{Context, Result};
use clap::Args;
use modsolve::{ModSolver, Request, ResolverConfig, SolveOutcome};
use std::path::{Path, PathBuf};

use crate::config::ModsolveConfig;
use crate::output;
use crate::EXIT_INFEASIBLE;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Request file (JSON) describing the candidate pools
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,

    /// Configuration file (defaults to the nearest modsolve.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Time budget for the whole resolution, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Amount subtracted from optional candidate weights
    #[arg(long, allow_hyphen_values = true)]
    pub inclusion_bias: Option<i64>,

    /// Stop after reporting this many problems
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Report unsatisfiable cores without shrinking them
    #[arg(long)]
    pub no_minimize: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

impl ResolveArgs {
    /// Overlay command line flags onto the loaded configuration
    fn apply(&self, mut config: ResolverConfig) -> ResolverConfig {
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = Some(ms);
        }
        if let Some(bias) = self.inclusion_bias {
            config.inclusion_bias = bias;
        }
        if let Some(max) = self.max_errors {
            config.max_reported_errors = Some(max);
        }
        if self.no_minimize {
            config.minimize_cores = false;
        }
        config
    }
}

/// Read and parse a request file
pub fn load_request(path: &Path) -> Result<Request> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn execute(args: ResolveArgs) -> Result<i32> {
    let request = load_request(&args.request)?;
    let config = args.apply(ModsolveConfig::resolve(args.config.as_deref())?);
    log::debug!("Resolver configuration: {:?}", config);

    let outcome = ModSolver::new(config)
        .resolve(&request)
        .with_context(|| format!("Failed to resolve {}", args.request.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        output::print_outcome(&outcome);
    }

    Ok(match outcome {
        SolveOutcome::Solved(_) => 0,
        SolveOutcome::Infeasible(_) => EXIT_INFEASIBLE,
    })
}
