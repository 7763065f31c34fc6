//! CDCL backend for the constraint engine.
//!
//! Variables are numbered from 1 and literals are signed integers: a positive
//! literal means the variable is true, a negative one that it is false. The
//! solver accepts plain clauses and linear pseudo-boolean constraints of the
//! form `a1*l1 + a2*l2 + ... <= k` with positive coefficients, which is enough
//! to express cardinalities, guarded rules and optimization bounds.
//!
//! A solve may run under assumptions. When the formula is unsatisfiable under
//! them, the subset of assumptions responsible for the final conflict is
//! reported back.

mod constraint;
mod decisions;
mod solver;
mod termination;
mod watch_graph;

pub use constraint::{normalize_at_most, Constraint, LinearConstraint, Normalized};
pub use decisions::Decisions;
pub use solver::{SatSolver, SolveResult, SolverStats};
pub use termination::{
    CancelHandle, Combinator, DecisionBudget, Indefinite, TerminationCondition, TimeBudget,
};
pub use watch_graph::WatchGraph;

/// A signed variable: positive = true, negative = false
pub type Literal = i32;

/// Index of a constraint inside the backend
pub type ConstraintId = u32;

/// Variable of a literal
#[inline]
pub fn var(literal: Literal) -> u32 {
    literal.unsigned_abs()
}
