//! Feasibility checking with per-rule selectors.
//!
//! Every rule's constraints are guarded by a fresh selector variable and the
//! formula is solved with all selectors assumed true. On failure the
//! selectors of the final conflict name the rules of an unsatisfiable core,
//! which is then shrunk by dropping one rule at a time.

use std::collections::HashMap;

use log::debug;

use crate::error::DefinitionError;

use super::definer::Cardinality;
use super::rule::RuleId;
use super::sat::{Literal, SatSolver, SolveResult, TerminationCondition};
use super::variables::VariableTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Feasibility {
    Satisfiable,
    /// Rules of an unsatisfiable core, in rule order
    Unsatisfiable(Vec<RuleId>),
}

pub(crate) struct ExplainingSolver {
    sat: SatSolver,
    selectors: Vec<Literal>,
    rule_of: HashMap<Literal, RuleId>,
}

impl ExplainingSolver {
    pub fn build<'a, I>(variables: &VariableTable, rules: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = (RuleId, &'a [Cardinality])>,
    {
        let mut sat = SatSolver::new();
        for _ in 0..variables.num_vars() {
            sat.new_var();
        }

        let mut selectors = Vec::new();
        let mut rule_of = HashMap::new();
        for (rule, constraints) in rules {
            let mut forms = Vec::new();
            for constraint in constraints {
                forms.extend(variables.encode(constraint)?);
            }
            if forms.is_empty() {
                continue;
            }

            let selector = sat.new_var();
            selectors.push(selector);
            rule_of.insert(selector, rule);
            for form in forms {
                if let Some(guarded) = form.guarded(selector) {
                    sat.add_at_most(guarded.terms, guarded.bound);
                }
            }
        }

        debug!(
            "Explaining solver: {} variables, {} guarded rules, {} constraints",
            sat.num_vars(),
            selectors.len(),
            sat.num_constraints()
        );

        Ok(Self {
            sat,
            selectors,
            rule_of,
        })
    }

    /// Solve with every rule enabled.
    ///
    /// Returns None when the termination condition fired.
    pub fn check<T>(&mut self, termination: &mut T, minimize: bool) -> Option<Feasibility>
    where
        T: TerminationCondition + ?Sized,
    {
        let assumptions = self.selectors.clone();
        match self.sat.solve(&assumptions, termination) {
            SolveResult::Satisfiable(_) => Some(Feasibility::Satisfiable),
            SolveResult::Unknown => None,
            SolveResult::Unsatisfiable(core) => {
                let mut core: Vec<Literal> = self
                    .selectors
                    .iter()
                    .copied()
                    .filter(|s| core.contains(s))
                    .collect();
                debug!("Initial core has {} rules", core.len());

                if minimize {
                    core = self.minimize(core, termination)?;
                    debug!("Minimized core has {} rules", core.len());
                }

                let mut rules: Vec<RuleId> = core.iter().filter_map(|s| self.rule_of.get(s).copied()).collect();
                rules.sort();
                Some(Feasibility::Unsatisfiable(rules))
            }
        }
    }

    /// Deletion-based shrinking: drop each selector in turn and keep the
    /// drop whenever the rest is still unsatisfiable
    fn minimize<T>(&mut self, mut core: Vec<Literal>, termination: &mut T) -> Option<Vec<Literal>>
    where
        T: TerminationCondition + ?Sized,
    {
        let mut index = 0;
        while index < core.len() {
            let candidate: Vec<Literal> = core
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != index)
                .map(|(_, &s)| s)
                .collect();

            match self.sat.solve(&candidate, termination) {
                SolveResult::Unsatisfiable(smaller) => {
                    core = candidate.into_iter().filter(|s| smaller.contains(s)).collect();
                }
                SolveResult::Satisfiable(_) => index += 1,
                SolveResult::Unknown => return None,
            }
        }
        Some(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::option::{BranchOption, LoadOption, OptionKind, OptionTable};
    use crate::solver::sat::Indefinite;

    fn options(count: usize) -> (OptionTable, Vec<LoadOption>) {
        let mut table = OptionTable::new();
        let ids = (0..count)
            .map(|i| {
                LoadOption::new(table.add(
                    OptionKind::Branch(BranchOption {
                        label: format!("o{}", i),
                    }),
                    0,
                ))
            })
            .collect();
        (table, ids)
    }

    fn clause(options: &[LoadOption]) -> Vec<Cardinality> {
        vec![Cardinality {
            options: options.to_vec(),
            min: 1,
            max: options.len(),
        }]
    }

    #[test]
    fn test_satisfiable() {
        let (table, o) = options(2);
        let variables = VariableTable::build(&table);
        let rules = [clause(&[o[0]]), clause(&[o[0].negate(), o[1]])];

        let mut solver = ExplainingSolver::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
        )
        .unwrap();
        assert_eq!(solver.check(&mut Indefinite, true), Some(Feasibility::Satisfiable));
    }

    #[test]
    fn test_minimal_core() {
        let (table, o) = options(3);
        let variables = VariableTable::build(&table);
        // r0: o0, r1: o0 -> o1, r2: !o1, r3: o2, r4: o0 -> o1 (redundant copy)
        let rules = [
            clause(&[o[0]]),
            clause(&[o[0].negate(), o[1]]),
            clause(&[o[1].negate()]),
            clause(&[o[2]]),
            clause(&[o[0].negate(), o[1]]),
        ];

        let mut solver = ExplainingSolver::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
        )
        .unwrap();

        let Some(Feasibility::Unsatisfiable(core)) = solver.check(&mut Indefinite, true) else {
            panic!("expected a core");
        };
        assert_eq!(core.len(), 3);
        assert!(core.contains(&RuleId::new(0)));
        assert!(core.contains(&RuleId::new(2)));
        assert!(!core.contains(&RuleId::new(3)));
    }

    #[test]
    fn test_contradiction_is_its_own_core() {
        let (table, o) = options(1);
        let variables = VariableTable::build(&table);
        let rules = [clause(&[o[0]]), vec![Cardinality::contradiction()]];

        let mut solver = ExplainingSolver::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
        )
        .unwrap();
        assert_eq!(
            solver.check(&mut Indefinite, true),
            Some(Feasibility::Unsatisfiable(vec![RuleId::new(1)]))
        );
    }
}
