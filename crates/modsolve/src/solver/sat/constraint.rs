use std::collections::BTreeMap;

use super::{var, Literal};

/// A constraint stored in the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// At least one literal is true
    Clause(Vec<Literal>),
    /// Weighted sum of true literals stays within a bound
    Linear(LinearConstraint),
}

/// `sum(coefficient * [literal]) <= bound` with positive coefficients and
/// at most one term per variable.
///
/// Coefficients are `u128` so that sums of arbitrary `i64` weights never
/// overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub terms: Vec<(u128, Literal)>,
    pub bound: u128,
}

impl LinearConstraint {
    /// Sum of the coefficients of the terms
    pub fn total(&self) -> u128 {
        self.terms.iter().map(|&(a, _)| a).sum()
    }
}

/// Outcome of normalizing a linear constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Holds under every assignment
    Tautology,
    /// Holds under no assignment
    Contradiction,
    /// Equivalent to a single clause
    Clause(Vec<Literal>),
    Linear(LinearConstraint),
}

/// Normalize `sum(coefficient * [literal]) <= bound` for arbitrary signed
/// coefficients.
///
/// Terms on the same variable are merged, negative coefficients are turned
/// into positive ones on the opposite literal, and oversized coefficients are
/// clamped to `bound + 1`. Constraints that forbid exactly one combination are
/// returned as clauses.
pub fn normalize_at_most<I>(terms: I, bound: i128) -> Normalized
where
    I: IntoIterator<Item = (i64, Literal)>,
{
    let mut coefficients: BTreeMap<u32, i128> = BTreeMap::new();
    let mut bound = bound;

    for (coefficient, literal) in terms {
        if coefficient == 0 || literal == 0 {
            continue;
        }
        let coefficient = coefficient as i128;
        let entry = coefficients.entry(var(literal)).or_insert(0);
        if literal > 0 {
            *entry += coefficient;
        } else {
            // a * [!x] == a - a * [x]
            bound -= coefficient;
            *entry -= coefficient;
        }
    }

    let mut normalized: Vec<(i128, Literal)> = Vec::with_capacity(coefficients.len());
    for (v, coefficient) in coefficients {
        let v = v as Literal;
        if coefficient > 0 {
            normalized.push((coefficient, v));
        } else if coefficient < 0 {
            // c * [x] == c - c * [!x], with c < 0
            bound -= coefficient;
            normalized.push((-coefficient, -v));
        }
    }

    if bound < 0 {
        return Normalized::Contradiction;
    }

    let total: i128 = normalized.iter().map(|&(a, _)| a).sum();
    if total <= bound {
        return Normalized::Tautology;
    }

    let clamp = bound + 1;
    for term in normalized.iter_mut() {
        term.0 = term.0.min(clamp);
    }
    let total: i128 = normalized.iter().map(|&(a, _)| a).sum();
    let smallest = normalized.iter().map(|&(a, _)| a).min().unwrap_or(0);

    // Dropping any single term satisfies the bound: only "all true" is forbidden
    if total - smallest <= bound {
        return Normalized::Clause(normalized.into_iter().map(|(_, l)| -l).collect());
    }

    let bound = clamp - 1;
    Normalized::Linear(LinearConstraint {
        terms: normalized
            .into_iter()
            .map(|(a, l)| (u128::try_from(a).unwrap_or(u128::MAX), l))
            .collect(),
        bound: u128::try_from(bound).unwrap_or(u128::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_most_one() {
        let normalized = normalize_at_most([(1, 1), (1, 2), (1, 3)], 1);
        assert_eq!(
            normalized,
            Normalized::Linear(LinearConstraint {
                terms: vec![(1, 1), (1, 2), (1, 3)],
                bound: 1,
            })
        );
    }

    #[test]
    fn test_pair_becomes_clause() {
        assert_eq!(
            normalize_at_most([(1, 1), (1, -2)], 1),
            Normalized::Clause(vec![-1, 2])
        );
    }

    #[test]
    fn test_at_least_one_becomes_clause() {
        // at least one of {1, 2, 3}: [!1] + [!2] + [!3] <= 2
        assert_eq!(
            normalize_at_most([(1, -1), (1, -2), (1, -3)], 2),
            Normalized::Clause(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_trivial_cases() {
        assert_eq!(normalize_at_most([(1, 1), (1, 2)], 2), Normalized::Tautology);
        assert_eq!(normalize_at_most([(1, 1)], -1), Normalized::Contradiction);
        assert_eq!(normalize_at_most(Vec::new(), 0), Normalized::Tautology);
    }

    #[test]
    fn test_merges_opposite_literals() {
        // [x] + [!x] == 1, so the constraint is 1 <= 1
        assert_eq!(normalize_at_most([(1, 4), (1, -4)], 1), Normalized::Tautology);
        assert_eq!(normalize_at_most([(1, 4), (1, -4)], 0), Normalized::Contradiction);
    }

    #[test]
    fn test_negative_coefficients() {
        // -3x + 2y <= 0  ==  3[!x] + 2y <= 3
        assert_eq!(
            normalize_at_most([(-3, 1), (2, 2)], 0),
            Normalized::Clause(vec![1, -2])
        );
    }

    #[test]
    fn test_extreme_coefficients_do_not_overflow() {
        // i64::MIN * [x] + i64::MAX * [y] <= -1  ==  2^63 * [!x] + (2^63 - 1) * [y] <= 2^63 - 1
        let normalized = normalize_at_most([(i64::MIN, 1), (i64::MAX, 2)], -1);
        assert_eq!(
            normalized,
            Normalized::Linear(LinearConstraint {
                terms: vec![(1u128 << 63, -1), (i64::MAX as u128, 2)],
                bound: i64::MAX as u128,
            })
        );

        let bound = 2 * i64::MAX as i128;
        let normalized = normalize_at_most([(i64::MAX, 1), (i64::MAX, 2), (i64::MAX, 3)], bound);
        assert_eq!(normalized, Normalized::Clause(vec![-1, -2, -3]));
    }

    #[test]
    fn test_clamps_large_coefficients() {
        let normalized = normalize_at_most([(10, 1), (1, 2), (1, 3), (1, 4)], 2);
        assert_eq!(
            normalized,
            Normalized::Linear(LinearConstraint {
                terms: vec![(3, 1), (1, 2), (1, 3), (1, 4)],
                bound: 2,
            })
        );
    }
}
