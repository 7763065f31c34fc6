pub mod candidate;
pub mod config;
pub mod error;
pub mod solver;
pub mod version;

pub use candidate::{BreaksOn, Candidate, DependsOn, LinkTarget, Provided, Request};
pub use config::ResolverConfig;
pub use error::{DefinitionError, Result, SolverError, VersionError};
pub use solver::{CancelHandle, ModSolver, Resolution, ResolutionError, RuleContext, SolveOutcome};
pub use version::{Version, VersionConstraint};
