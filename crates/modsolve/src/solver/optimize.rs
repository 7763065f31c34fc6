//! Weighted optimization by linear SAT-UNSAT search.
//!
//! After every model the objective is bounded strictly below the model's
//! cost and the search continues; the last model found before the bound
//! becomes unsatisfiable is optimal. A search interrupted by the
//! termination condition can be resumed: bounds and the best model survive.

use log::debug;

use crate::error::DefinitionError;

use super::definer::Cardinality;
use super::rule::RuleId;
use super::sat::{Literal, SatSolver, SolveResult, TerminationCondition};
use super::variables::VariableTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptimizeError {
    /// The search was interrupted; it can be resumed
    Stopped,
    /// No model exists even though feasibility was proven
    Infeasible,
}

pub(crate) struct Optimizer {
    sat: SatSolver,
    objective: Vec<(i64, Literal)>,
    best: Option<(Vec<bool>, i128)>,
    proven: bool,
}

impl Optimizer {
    pub fn build<'a, I>(
        variables: &VariableTable,
        rules: I,
        objective: Vec<(i64, Literal)>,
    ) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = (RuleId, &'a [Cardinality])>,
    {
        let mut sat = SatSolver::new();
        for _ in 0..variables.num_vars() {
            sat.new_var();
        }

        for (_, constraints) in rules {
            for constraint in constraints {
                for form in variables.encode(constraint)? {
                    sat.add_at_most(form.terms, form.bound);
                }
            }
        }

        // Try cheap polarities first: options with negative weight are loaded
        for &(weight, literal) in &objective {
            if weight < 0 {
                sat.set_phase(literal);
            }
        }

        Ok(Self {
            sat,
            objective,
            best: None,
            proven: false,
        })
    }

    /// Objective value of a model, wide enough for any sum of `i64` weights
    fn cost(&self, model: &[bool]) -> i128 {
        self.objective
            .iter()
            .filter(|&&(_, l)| model.get(l.unsigned_abs() as usize).copied().unwrap_or(false) == (l > 0))
            .map(|&(w, _)| i128::from(w))
            .sum()
    }

    /// Run the search to optimality and return the optimal model
    pub fn optimize<T>(&mut self, termination: &mut T) -> Result<Vec<bool>, OptimizeError>
    where
        T: TerminationCondition + ?Sized,
    {
        while !self.proven {
            match self.sat.solve(&[], termination) {
                SolveResult::Satisfiable(model) => {
                    let cost = self.cost(&model);
                    debug!("Found a solution with cost {}", cost);
                    self.best = Some((model, cost));
                    if self.objective.is_empty()
                        || !self.sat.add_at_most(self.objective.clone(), cost - 1)
                    {
                        self.proven = true;
                    }
                }
                SolveResult::Unsatisfiable(_) => {
                    if self.best.is_none() {
                        return Err(OptimizeError::Infeasible);
                    }
                    self.proven = true;
                }
                SolveResult::Unknown => return Err(OptimizeError::Stopped),
            }
        }

        match &self.best {
            Some((model, cost)) => {
                debug!("Optimal cost {}", cost);
                Ok(model.clone())
            }
            None => Err(OptimizeError::Infeasible),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::option::{BranchOption, LoadOption, OptionKind, OptionTable};
    use crate::solver::sat::{DecisionBudget, Indefinite};

    fn table(weights: &[i64]) -> (OptionTable, Vec<LoadOption>) {
        let mut options = OptionTable::new();
        let ids = weights
            .iter()
            .map(|&w| {
                LoadOption::new(options.add(
                    OptionKind::Branch(BranchOption {
                        label: "b".to_string(),
                    }),
                    w,
                ))
            })
            .collect();
        (options, ids)
    }

    #[test]
    fn test_prefers_cheapest_member() {
        // exactly one of three, the middle one is cheapest
        let (options, o) = table(&[5, -2, 3]);
        let variables = VariableTable::build(&options);
        let rules = [vec![Cardinality {
            options: o.clone(),
            min: 1,
            max: 1,
        }]];

        let mut optimizer = Optimizer::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
            variables.objective(&options),
        )
        .unwrap();

        let model = optimizer.optimize(&mut Indefinite).unwrap();
        assert_eq!(model[1..4], [false, true, false]);
    }

    #[test]
    fn test_trades_off_weights() {
        // o0 (-10) requires o1 (+4) and o2 (+3); o3 (-5) breaks o0
        let (options, o) = table(&[-10, 4, 3, -5]);
        let variables = VariableTable::build(&options);
        let clause = |options: Vec<LoadOption>| Cardinality {
            max: options.len(),
            options,
            min: 1,
        };
        let rules = [
            vec![clause(vec![o[0].negate(), o[1]])],
            vec![clause(vec![o[0].negate(), o[2]])],
            vec![clause(vec![o[0].negate(), o[3].negate()])],
        ];

        let mut optimizer = Optimizer::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
            variables.objective(&options),
        )
        .unwrap();

        // {o0, o1, o2} costs -3, {o3} costs -5
        let model = optimizer.optimize(&mut Indefinite).unwrap();
        assert_eq!(model[1..5], [false, false, false, true]);
    }

    #[test]
    fn test_extreme_weights() {
        let (options, o) = table(&[i64::MIN, i64::MIN, i64::MAX]);
        let variables = VariableTable::build(&options);
        let rules = [vec![Cardinality {
            options: o.clone(),
            min: 0,
            max: 2,
        }]];

        let mut optimizer = Optimizer::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
            variables.objective(&options),
        )
        .unwrap();

        let model = optimizer.optimize(&mut Indefinite).unwrap();
        assert_eq!(model[1..4], [true, true, false]);
        assert_eq!(optimizer.cost(&model), 2 * i128::from(i64::MIN));
    }

    #[test]
    fn test_resumes_after_stop() {
        let (options, o) = table(&[1, 1]);
        let variables = VariableTable::build(&options);
        let rules = [vec![Cardinality {
            options: o.clone(),
            min: 1,
            max: 2,
        }]];

        let mut optimizer = Optimizer::build(
            &variables,
            rules.iter().enumerate().map(|(i, c)| (RuleId::new(i), c.as_slice())),
            variables.objective(&options),
        )
        .unwrap();

        assert_eq!(
            optimizer.optimize(&mut DecisionBudget::new(0)),
            Err(OptimizeError::Stopped)
        );
        let model = optimizer.optimize(&mut Indefinite).unwrap();
        assert_eq!(model[1..3].iter().filter(|&&b| b).count(), 1);
    }
}
