//! Operator types for version constraints

use std::cmp::Ordering;
use std::fmt;

use crate::error::VersionError;

/// Comparison operators for version constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal (=)
    Equal,
    /// Not equal (!=)
    NotEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
}

impl Operator {
    /// Parse operator from string
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        match s {
            "" | "=" | "==" => Ok(Operator::Equal),
            "!=" | "<>" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            _ => Err(VersionError::InvalidConstraint {
                constraint: s.to_string(),
                reason: "unknown operator".to_string(),
            }),
        }
    }

    /// Get the string representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }

    /// Check whether an ordering between a candidate and the operand satisfies this operator
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::LessThanOrEqual => ordering != Ordering::Greater,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        assert_eq!(Operator::parse(">=").unwrap(), Operator::GreaterThanOrEqual);
        assert_eq!(Operator::parse("<>").unwrap(), Operator::NotEqual);
        assert_eq!(Operator::parse("").unwrap(), Operator::Equal);
        assert!(Operator::parse("=>").is_err());
    }

    #[test]
    fn test_accepts() {
        assert!(Operator::LessThanOrEqual.accepts(Ordering::Equal));
        assert!(!Operator::LessThan.accepts(Ordering::Equal));
        assert!(Operator::NotEqual.accepts(Ordering::Greater));
    }
}
