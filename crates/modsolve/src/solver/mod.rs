//! Weighted SAT-based mod resolver.
//!
//! Every candidate, provided id and composite-link branch is an option (a
//! boolean variable); relationships between them are rules that translate into
//! cardinality constraints. Resolution happens in two passes over the same
//! constraints:
//!
//! 1. **Feasibility**: each rule is guarded by a selector and the formula is
//!    solved with every selector assumed. An unsatisfiable answer comes with
//!    the rules of a minimal unsatisfiable core.
//! 2. **Optimization**: the cheapest model is searched for by repeatedly
//!    bounding the weighted objective below the best cost found so far.
//!
//! # Architecture
//!
//! - [`OptionTable`]: arena of options addressed by [`OptionId`]
//! - [`Rule`]: the relationship variants, defined through a [`RuleDefiner`]
//! - [`RuleSet`]: arena of rules and their sub-rule trees
//! - [`RuleContext`]: the constraint engine and its [`SolverStep`] protocol
//! - [`ModSolver`]: turns a [`crate::Request`] into options and rules and
//!   reports a [`Resolution`] or a list of [`ResolutionError`]s
//!
//! # Example
//!
//! ```ignore
//! use modsolve::{Candidate, DependsOn, ModSolver, Request, ResolverConfig, SolveOutcome, Version};
//!
//! let mut request = Request::new();
//! request
//!     .add("app", Candidate::new("app.jar", Version::parse("1.0")?).mandatory().depends(DependsOn::on("lib")))
//!     .add("lib", Candidate::new("lib-2.jar", Version::parse("2.0")?));
//!
//! match ModSolver::new(ResolverConfig::default()).resolve(&request)? {
//!     SolveOutcome::Solved(resolution) => println!("{:?}", resolution.selected),
//!     SolveOutcome::Infeasible(errors) => println!("{}", modsolve::solver::describe_all(&errors)),
//! }
//! ```

mod context;
mod definer;
mod explain;
mod optimize;
mod option;
mod problem;
mod resolver;
mod rule;
mod rule_set;
pub mod sat;
mod variables;


pub use context::{RuleContext, SolverStep};
pub use definer::{Cardinality, RuleDefiner};
pub use option::{
    AliasOption, BranchOption, CandidateOption, LoadOption, OptionId, OptionKind, OptionTable,
};
pub use problem::{decompose, describe_all, ResolutionError};
pub use resolver::{ModSolver, Resolution, SolveOutcome};
pub use rule::{
    BreakRole, BreaksAllRule, BreaksOnlyRule, DependsAnyRule, DependsOnlyRule, MandatoryRule,
    ModLink, OptionalSetRule, OverriddenSetRule, Rule, RuleId, RuleType,
};
pub use rule_set::{RuleEntry, RuleSet, RuleSetStats};
pub use sat::CancelHandle;
