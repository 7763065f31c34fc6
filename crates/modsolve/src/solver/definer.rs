use crate::error::DefinitionError;

use super::option::{LoadOption, OptionTable};
use super::rule::RuleId;

/// Between `min` and `max` of `options` are true.
///
/// Options are alias-resolved and registered; options that were removed
/// from the table have already been folded in as constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cardinality {
    pub options: Vec<LoadOption>,
    pub min: usize,
    pub max: usize,
}

impl Cardinality {
    /// A constraint no assignment satisfies
    pub fn contradiction() -> Self {
        Self {
            options: Vec::new(),
            min: 1,
            max: 0,
        }
    }

    /// Evaluate under an assignment of the root options
    pub fn holds(&self, value: impl Fn(LoadOption) -> bool) -> bool {
        let count = self
            .options
            .iter()
            .filter(|&&o| value(LoadOption::new(o.id())) != o.is_negated())
            .count();
        self.min <= count && count <= self.max
    }
}

/// Collects the constraints a rule emits from [`super::Rule::define`].
///
/// Every option handed in is resolved to its root option first, so an alias
/// and its target always end up as the same variable.
pub struct RuleDefiner<'a> {
    table: &'a OptionTable,
    rule: RuleId,
    constraints: Vec<Cardinality>,
}

impl<'a> RuleDefiner<'a> {
    pub(crate) fn new(table: &'a OptionTable, rule: RuleId) -> Self {
        Self {
            table,
            rule,
            constraints: Vec::new(),
        }
    }

    /// The rule being defined
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Negate an option, resolving aliases
    pub fn negate(&self, option: LoadOption) -> LoadOption {
        self.table.resolve_alias(option).negate()
    }

    /// At least one of the options is true
    pub fn at_least_one_of(&mut self, options: &[LoadOption]) -> Result<(), DefinitionError> {
        if options.is_empty() {
            return Err(DefinitionError::EmptyClause { rule: self.rule });
        }
        self.push(options, 1, options.len());
        Ok(())
    }

    /// At least `n` of the options are true
    pub fn at_least(&mut self, n: usize, options: &[LoadOption]) -> Result<(), DefinitionError> {
        self.check_count(n, options)?;
        self.push(options, n, options.len());
        Ok(())
    }

    /// At most `n` of the options are true
    pub fn at_most(&mut self, n: usize, options: &[LoadOption]) -> Result<(), DefinitionError> {
        self.check_count(n, options)?;
        self.push(options, 0, n);
        Ok(())
    }

    /// Exactly `n` of the options are true
    pub fn exactly(&mut self, n: usize, options: &[LoadOption]) -> Result<(), DefinitionError> {
        self.check_count(n, options)?;
        self.push(options, n, n);
        Ok(())
    }

    /// Between `min` and `max` (inclusive) of the options are true
    pub fn between(
        &mut self,
        min: usize,
        max: usize,
        options: &[LoadOption],
    ) -> Result<(), DefinitionError> {
        if max < min {
            return Err(DefinitionError::InvertedRange {
                rule: self.rule,
                min,
                max,
            });
        }
        self.check_count(min, options)?;
        self.push(options, min, max.min(options.len()));
        Ok(())
    }

    fn check_count(&self, n: usize, options: &[LoadOption]) -> Result<(), DefinitionError> {
        if n > options.len() {
            return Err(DefinitionError::CardinalityTooLarge {
                rule: self.rule,
                min: n,
                count: options.len(),
            });
        }
        Ok(())
    }

    fn push(&mut self, options: &[LoadOption], min: usize, max: usize) {
        let mut literals: Vec<LoadOption> = Vec::with_capacity(options.len());
        let mut fixed_true = 0usize;

        for &option in options {
            let resolved = self.table.resolve_alias(option);
            if !self.table.contains(resolved.id()) {
                // Unregistered options are constant false
                if resolved.is_negated() {
                    fixed_true += 1;
                }
                continue;
            }
            if !literals.contains(&resolved) {
                literals.push(resolved);
            }
        }

        let constraint = if max < fixed_true {
            Cardinality::contradiction()
        } else {
            Cardinality {
                options: literals,
                min: min.saturating_sub(fixed_true),
                max: max - fixed_true,
            }
        };

        log::trace!(
            "Rule {} defines between {} and {} of {:?}",
            self.rule,
            constraint.min,
            constraint.max,
            constraint.options
        );
        self.constraints.push(constraint);
    }

    pub(crate) fn into_constraints(self) -> Vec<Cardinality> {
        self.constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::option::{AliasOption, BranchOption, OptionKind};
    use crate::version::Version;

    fn branch(table: &mut OptionTable, label: &str) -> LoadOption {
        LoadOption::new(table.add(
            OptionKind::Branch(BranchOption {
                label: label.to_string(),
            }),
            0,
        ))
    }

    #[test]
    fn test_cardinality_errors() {
        let mut table = OptionTable::new();
        let a = branch(&mut table, "a");
        let b = branch(&mut table, "b");
        let mut definer = RuleDefiner::new(&table, RuleId::new(4));

        assert_eq!(
            definer.at_least_one_of(&[]),
            Err(DefinitionError::EmptyClause { rule: RuleId::new(4) })
        );
        assert!(matches!(
            definer.at_least(3, &[a, b]),
            Err(DefinitionError::CardinalityTooLarge { min: 3, count: 2, .. })
        ));
        assert!(matches!(
            definer.between(2, 1, &[a, b]),
            Err(DefinitionError::InvertedRange { min: 2, max: 1, .. })
        ));
        assert!(definer.exactly(2, &[a, b]).is_ok());
        assert!(definer.at_most(0, &[]).is_ok());
        assert_eq!(definer.into_constraints().len(), 2);
    }

    #[test]
    fn test_aliases_are_resolved() {
        let mut table = OptionTable::new();
        let a = branch(&mut table, "a");
        let alias = table.add(
            OptionKind::Alias(AliasOption {
                target: a.id(),
                mod_id: "x".to_string(),
                version: Version::parse("1").unwrap(),
            }),
            0,
        );

        let mut definer = RuleDefiner::new(&table, RuleId::new(0));
        assert_eq!(definer.negate(LoadOption::new(alias)), a.negate());
        definer
            .at_most(1, &[a, LoadOption::new(alias)])
            .unwrap();

        let constraints = definer.into_constraints();
        assert_eq!(constraints[0].options, vec![a]);
        assert_eq!(constraints[0].max, 1);
    }

    #[test]
    fn test_removed_options_are_constant_false() {
        let mut table = OptionTable::new();
        let a = branch(&mut table, "a");
        let gone = branch(&mut table, "gone");
        table.remove(gone.id());

        let mut definer = RuleDefiner::new(&table, RuleId::new(0));
        definer.at_least_one_of(&[gone.negate(), a]).unwrap();
        definer.exactly(1, &[gone.negate(), a]).unwrap();
        definer.at_most(0, &[gone.negate()]).unwrap();

        let constraints = definer.into_constraints();
        // !gone is true, so the clause holds whatever `a` is
        assert_eq!(constraints[0].min, 0);
        // exactly one: `a` must be false
        assert_eq!((constraints[1].min, constraints[1].max), (0, 0));
        assert_eq!(constraints[2], Cardinality::contradiction());
    }

    #[test]
    fn test_holds() {
        let mut table = OptionTable::new();
        let a = branch(&mut table, "a");
        let b = branch(&mut table, "b");
        let constraint = Cardinality {
            options: vec![a, b.negate()],
            min: 1,
            max: 1,
        };

        // `a` and `b` both true: only `a` counts
        assert!(constraint.holds(|o| o == a || o == b));
        // nothing true: only `!b` counts
        assert!(constraint.holds(|_| false));
        assert!(!constraint.holds(|o| o == a));
        assert!(!constraint.holds(|o| o == b));
    }
}
