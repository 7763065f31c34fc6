use thiserror::Error;

use crate::solver::{OptionId, RuleId, SolverStep};

/// Errors raised while a rule or the resolution input is being defined.
///
/// These are caller errors: they are reported immediately and never
/// recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Rule {rule} emitted an empty clause")]
    EmptyClause { rule: RuleId },

    #[error("Rule {rule} asked for at least {min} of {count} options")]
    CardinalityTooLarge { rule: RuleId, min: usize, count: usize },

    #[error("Rule {rule} has an inverted range: between {min} and {max}")]
    InvertedRange { rule: RuleId, min: usize, max: usize },

    #[error("Mod id '{id}' is mandatory twice: {first} and {second}")]
    DuplicateMandatory {
        id: String,
        first: String,
        second: String,
    },

    #[error("Candidate key '{key}' is used more than once")]
    DuplicateCandidate { key: String },

    #[error("Unknown option {0}")]
    UnknownOption(OptionId),

    #[error("Unknown rule {0}")]
    UnknownRule(RuleId),
}

/// Errors produced by the constraint engine and the resolution driver.
///
/// Infeasibility is deliberately absent: an unsolvable request is a normal
/// outcome, see [`crate::solver::SolveOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Invalid rule definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Operation '{operation}' is not allowed in step {step:?}")]
    InvalidState {
        operation: &'static str,
        step: SolverStep,
    },

    #[error("Internal solver error: {0}")]
    Internal(String),

    #[error("Solving was cancelled")]
    Cancelled,

    #[error("Solving timed out")]
    Timeout,
}

/// Errors for malformed version strings and version predicates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version: '{0}'")]
    InvalidVersion(String),

    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SolverError>;
