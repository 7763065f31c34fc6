use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Operator, Version};
use crate::error::VersionError;

lazy_static! {
    static ref TERM_RE: Regex = Regex::new(r"^(\^|~|>=|<=|==|!=|<>|>|<|=)?\s*(.*)$").unwrap();
    static ref WILDCARD_RE: Regex = Regex::new(r"^[vV]?(\d+(?:\.\d+)*)\.[xX*]$").unwrap();
}

/// One comparison against a version, e.g. `>=1.2.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub operator: Operator,
    pub version: Version,
}

impl Comparator {
    pub fn new(operator: Operator, version: Version) -> Self {
        Self { operator, version }
    }

    /// Check whether a version satisfies this comparison
    pub fn matches(&self, version: &Version) -> bool {
        self.operator.accepts(version.cmp(&self.version))
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// A predicate over versions.
///
/// The predicate is a disjunction (`||`) of conjunctions (space or comma
/// separated) of comparators. An empty conjunction matches every version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionConstraint {
    alternatives: Vec<Vec<Comparator>>,
    pretty: String,
}

impl VersionConstraint {
    /// The constraint that matches every version
    pub fn any() -> Self {
        Self {
            alternatives: vec![Vec::new()],
            pretty: "*".to_string(),
        }
    }

    /// A constraint matching exactly one version
    pub fn exact(version: Version) -> Self {
        let pretty = format!("={}", version);
        Self {
            alternatives: vec![vec![Comparator::new(Operator::Equal, version)]],
            pretty,
        }
    }

    /// Parse a constraint string such as `>=1.2 <2 || ^3.0`
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let pretty = input.trim();
        if pretty.is_empty() {
            return Ok(Self::any());
        }

        let mut alternatives = Vec::new();
        for alternative in pretty.split("||") {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(invalid(input, "empty alternative"));
            }

            let mut comparators = Vec::new();
            for term in split_terms(alternative) {
                parse_term(input, &term, &mut comparators)?;
            }
            alternatives.push(comparators);
        }

        Ok(Self {
            alternatives,
            pretty: pretty.to_string(),
        })
    }

    /// Check whether a version satisfies this constraint
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|conjunction| conjunction.iter().all(|c| c.matches(version)))
    }

    /// Whether this constraint accepts every version
    pub fn is_any(&self) -> bool {
        self.alternatives.iter().any(|c| c.is_empty())
    }

    /// The comparators of each alternative
    pub fn alternatives(&self) -> &[Vec<Comparator>] {
        &self.alternatives
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty)
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VersionConstraint::parse(&value)
    }
}

impl From<VersionConstraint> for String {
    fn from(constraint: VersionConstraint) -> Self {
        constraint.pretty
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

fn invalid(constraint: &str, reason: &str) -> VersionError {
    VersionError::InvalidConstraint {
        constraint: constraint.to_string(),
        reason: reason.to_string(),
    }
}

/// Split a conjunction into terms, gluing a lone operator to the version after it
fn split_terms(alternative: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut pending_operator: Option<String> = None;

    for token in alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        let is_operator = token.chars().all(|c| "<>=!^~".contains(c));
        if is_operator {
            pending_operator = Some(token.to_string());
            continue;
        }
        match pending_operator.take() {
            Some(op) => terms.push(format!("{}{}", op, token)),
            None => terms.push(token.to_string()),
        }
    }

    if let Some(op) = pending_operator {
        terms.push(op);
    }

    terms
}

fn parse_term(input: &str, term: &str, out: &mut Vec<Comparator>) -> Result<(), VersionError> {
    if matches!(term, "*" | "x" | "X") {
        return Ok(());
    }

    if let Some(captures) = WILDCARD_RE.captures(term) {
        let parts = parse_parts(input, &captures[1])?;
        out.push(Comparator::new(Operator::GreaterThanOrEqual, Version::from_parts(&parts)));
        out.push(Comparator::new(Operator::LessThan, bump(&parts, parts.len() - 1)));
        return Ok(());
    }

    let captures = TERM_RE
        .captures(term)
        .ok_or_else(|| invalid(input, "unparseable term"))?;
    let operator = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let operand = captures[2].trim();
    if operand.is_empty() {
        return Err(invalid(input, "operator without a version"));
    }

    match operator {
        "^" => {
            let version = Version::parse(operand)?;
            let parts = semantic_parts(input, &version)?;
            // Caret keeps the first non-zero component fixed
            let significant = parts
                .iter()
                .position(|&p| p != 0)
                .unwrap_or(parts.len() - 1);
            out.push(Comparator::new(Operator::GreaterThanOrEqual, version));
            out.push(Comparator::new(Operator::LessThan, bump(&parts, significant)));
        }
        "~" => {
            let version = Version::parse(operand)?;
            let parts = semantic_parts(input, &version)?;
            let fixed = if parts.len() > 1 { parts.len() - 2 } else { 0 };
            out.push(Comparator::new(Operator::GreaterThanOrEqual, version));
            out.push(Comparator::new(Operator::LessThan, bump(&parts, fixed.min(1))));
        }
        _ => {
            let operator = Operator::parse(operator)?;
            out.push(Comparator::new(operator, Version::parse(operand)?));
        }
    }

    Ok(())
}

fn parse_parts(input: &str, dotted: &str) -> Result<Vec<u64>, VersionError> {
    dotted
        .split('.')
        .map(|p| p.parse::<u64>().map_err(|_| invalid(input, "component out of range")))
        .collect()
}

fn semantic_parts(input: &str, version: &Version) -> Result<Vec<u64>, VersionError> {
    if !version.is_semantic() {
        return Err(invalid(input, "range operators need a numeric version"));
    }
    Ok((0..version.len()).map(|i| version.component(i)).collect())
}

/// Increment the component at `index` and drop everything after it
fn bump(parts: &[u64], index: usize) -> Version {
    let mut bumped: Vec<u64> = parts[..=index].to_vec();
    bumped[index] += 1;
    Version::from_parts(&bumped)
}
