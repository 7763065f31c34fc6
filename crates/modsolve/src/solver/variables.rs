use crate::error::DefinitionError;

use super::definer::Cardinality;
use super::option::{LoadOption, OptionId, OptionTable};
use super::sat::Literal;

/// `sum(coefficient * [literal]) <= bound`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AtMost {
    pub terms: Vec<(i64, Literal)>,
    pub bound: i64,
}

impl AtMost {
    /// The same constraint, enforced only while `guard` is true.
    ///
    /// Returns None when the constraint can never be violated.
    pub fn guarded(mut self, guard: Literal) -> Option<Self> {
        let max_sum: i64 = self.terms.iter().map(|&(a, _)| a.max(0)).sum();
        let slack = max_sum - self.bound;
        if slack <= 0 {
            return None;
        }
        self.terms.push((slack, guard));
        self.bound = max_sum;
        Some(self)
    }
}

/// Maps root options to backend variables.
///
/// Rebuilt on every feasibility check; aliases share their root's variable.
#[derive(Debug, Clone, Default)]
pub(crate) struct VariableTable {
    /// Backend variable per option index, None for aliases and removed options
    vars: Vec<Option<Literal>>,
    num_vars: u32,
}

impl VariableTable {
    pub fn build(options: &OptionTable) -> Self {
        let mut table = Self::default();
        for (id, kind) in options.iter() {
            if kind.is_alias() {
                continue;
            }
            if id.index() >= table.vars.len() {
                table.vars.resize(id.index() + 1, None);
            }
            table.num_vars += 1;
            table.vars[id.index()] = Some(table.num_vars as Literal);
        }
        table
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Backend literal of a root option
    pub fn literal(&self, option: LoadOption) -> Result<Literal, DefinitionError> {
        let var = self
            .vars
            .get(option.id().index())
            .copied()
            .flatten()
            .ok_or(DefinitionError::UnknownOption(option.id()))?;
        Ok(if option.is_negated() { -var } else { var })
    }

    /// Truth value of any registered option in a model
    pub fn value(&self, options: &OptionTable, model: &[bool], id: OptionId) -> bool {
        self.literal(LoadOption::new(options.root(id)))
            .ok()
            .and_then(|var| model.get(var as usize).copied())
            .unwrap_or(false)
    }

    /// Translate a cardinality into at-most form
    pub fn encode(&self, constraint: &Cardinality) -> Result<Vec<AtMost>, DefinitionError> {
        let literals = constraint
            .options
            .iter()
            .map(|&o| self.literal(o))
            .collect::<Result<Vec<_>, _>>()?;
        let count = literals.len();

        let mut forms = Vec::with_capacity(2);
        if constraint.max < count {
            forms.push(AtMost {
                terms: literals.iter().map(|&l| (1, l)).collect(),
                bound: constraint.max as i64,
            });
        }
        if constraint.min > 0 {
            forms.push(AtMost {
                terms: literals.iter().map(|&l| (1, -l)).collect(),
                bound: count as i64 - constraint.min as i64,
            });
        }
        Ok(forms)
    }

    /// Weighted sum of the registered options; aliases add to their root
    pub fn objective(&self, options: &OptionTable) -> Vec<(i64, Literal)> {
        options
            .iter()
            .filter_map(|(id, _)| {
                let weight = options.weight(id)?;
                if weight == 0 {
                    return None;
                }
                let var = self.literal(LoadOption::new(options.root(id))).ok()?;
                Some((weight, var))
            })
            .collect()
    }
}
