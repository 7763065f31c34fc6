use log::trace;

use super::constraint::{normalize_at_most, Constraint, LinearConstraint, Normalized};
use super::decisions::Decisions;
use super::termination::TerminationCondition;
use super::watch_graph::{WatchGraph, WatchNode};
use super::{var, ConstraintId, Literal};

/// Result of a call to [`SatSolver::solve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    /// A model indexed by variable; index 0 is unused
    Satisfiable(Vec<bool>),
    /// No model exists under the assumptions; holds the assumptions that
    /// took part in the final conflict (empty when the formula alone is
    /// unsatisfiable)
    Unsatisfiable(Vec<Literal>),
    /// The termination condition fired first
    Unknown,
}

/// Counters collected across all solves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub decisions: u64,
    pub conflicts: u64,
    pub propagations: u64,
    pub learned: u64,
}

/// Conflict-driven clause learning over clauses and linear constraints.
///
/// Constraints can be added between solves; learned clauses are kept, so
/// repeated solves on a growing formula are incremental. Assumptions are
/// decided one per level before any free decision.
#[derive(Debug, Default)]
pub struct SatSolver {
    num_vars: u32,
    constraints: Vec<Constraint>,
    decisions: Decisions,
    watches: WatchGraph,
    /// Next queue index to propagate
    propagate_index: usize,
    /// Preferred polarity per variable
    phases: Vec<bool>,
    seen: Vec<bool>,
    /// Set once the formula is unsatisfiable without assumptions
    inconsistent: bool,
    stats: SolverStats,
}

impl SatSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable and return its positive literal
    pub fn new_var(&mut self) -> Literal {
        let literal = (self.num_vars + 1) as Literal;
        self.reserve(literal);
        literal
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Whether the formula is known to be unsatisfiable on its own
    pub fn is_inconsistent(&self) -> bool {
        self.inconsistent
    }

    /// Prefer the polarity of `literal` when branching on its variable
    pub fn set_phase(&mut self, literal: Literal) {
        self.reserve(literal);
        self.phases[var(literal) as usize] = literal > 0;
    }

    fn reserve(&mut self, literal: Literal) {
        let v = var(literal);
        if v > self.num_vars {
            self.num_vars = v;
            self.decisions.ensure_capacity(v as usize);
            self.phases.resize(v as usize + 1, false);
            self.seen.resize(v as usize + 1, false);
        }
    }

    fn push_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        let id = self.constraints.len() as ConstraintId;
        self.constraints.push(constraint);
        id
    }

    /// Add a clause.
    ///
    /// Returns false when the formula became unsatisfiable.
    pub fn add_clause(&mut self, literals: impl IntoIterator<Item = Literal>) -> bool {
        self.backtrack(0);
        if self.inconsistent {
            return false;
        }

        let mut clause: Vec<Literal> = Vec::new();
        for literal in literals {
            if literal == 0 {
                continue;
            }
            self.reserve(literal);
            match self.decisions.value(literal) {
                Some(true) => return true,
                Some(false) => continue,
                None => {}
            }
            if clause.contains(&-literal) {
                return true;
            }
            if !clause.contains(&literal) {
                clause.push(literal);
            }
        }

        match clause.len() {
            0 => {
                self.inconsistent = true;
                false
            }
            1 => {
                let unit = clause[0];
                let id = self.push_constraint(Constraint::Clause(clause));
                self.decisions.decide(unit, Some(id));
                true
            }
            _ => {
                let (first, second) = (clause[0], clause[1]);
                let id = self.push_constraint(Constraint::Clause(clause));
                self.watches.watch_clause(id, first, second);
                true
            }
        }
    }

    /// Add `sum(coefficient * [literal]) <= bound` for signed coefficients.
    ///
    /// Returns false when the formula became unsatisfiable.
    pub fn add_at_most(
        &mut self,
        terms: impl IntoIterator<Item = (i64, Literal)>,
        bound: impl Into<i128>,
    ) -> bool {
        match normalize_at_most(terms, bound.into()) {
            Normalized::Tautology => !self.inconsistent,
            Normalized::Contradiction => {
                self.inconsistent = true;
                false
            }
            Normalized::Clause(literals) => self.add_clause(literals),
            Normalized::Linear(linear) => self.add_linear(linear),
        }
    }

    fn add_linear(&mut self, linear: LinearConstraint) -> bool {
        self.backtrack(0);
        if self.inconsistent {
            return false;
        }

        for &(_, literal) in &linear.terms {
            self.reserve(literal);
        }
        let literals: Vec<Literal> = linear.terms.iter().map(|&(_, l)| l).collect();
        let id = self.push_constraint(Constraint::Linear(linear));
        self.watches.watch_linear(id, literals);

        // Literals already fixed at level 0 will not trigger the watches again
        if !self.propagate_linear(id) {
            self.inconsistent = true;
            return false;
        }
        true
    }

    /// Search for a model under the given assumptions
    pub fn solve<T>(&mut self, assumptions: &[Literal], termination: &mut T) -> SolveResult
    where
        T: TerminationCondition + ?Sized,
    {
        self.backtrack(0);
        if self.inconsistent {
            return SolveResult::Unsatisfiable(Vec::new());
        }
        for &assumption in assumptions {
            self.reserve(assumption);
        }

        loop {
            if let Some(conflict) = self.propagate() {
                self.stats.conflicts += 1;
                if self.decisions.level() == 0 {
                    self.inconsistent = true;
                    return SolveResult::Unsatisfiable(Vec::new());
                }

                let (learned, level) = self.analyze(conflict);
                trace!(
                    "Conflict in constraint {}, learned {:?}, back to level {}",
                    conflict,
                    learned,
                    level
                );
                self.backtrack(level);
                self.learn(learned);
                continue;
            }

            if termination.should_stop() {
                self.backtrack(0);
                return SolveResult::Unknown;
            }

            let level = self.decisions.level() as usize;
            if level < assumptions.len() {
                let assumption = assumptions[level];
                match self.decisions.value(assumption) {
                    Some(true) => self.decisions.increment_level(),
                    Some(false) => {
                        let core = self.analyze_final(assumption);
                        self.backtrack(0);
                        return SolveResult::Unsatisfiable(core);
                    }
                    None => {
                        self.decisions.increment_level();
                        self.decisions.decide(assumption, None);
                    }
                }
                continue;
            }

            match self.pick_branch() {
                Some(literal) => {
                    self.stats.decisions += 1;
                    self.decisions.increment_level();
                    self.decisions.decide(literal, None);
                    termination.decision_has_been_made();
                }
                None => {
                    let mut model = self.decisions.model();
                    model.resize(self.num_vars as usize + 1, false);
                    self.backtrack(0);
                    return SolveResult::Satisfiable(model);
                }
            }
        }
    }

    fn backtrack(&mut self, level: u32) {
        self.decisions.revert_to_level(level);
        self.propagate_index = self.propagate_index.min(self.decisions.len());
    }

    fn pick_branch(&self) -> Option<Literal> {
        (1..=self.num_vars)
            .find(|&v| self.decisions.undecided(v))
            .map(|v| {
                if self.phases[v as usize] {
                    v as Literal
                } else {
                    -(v as Literal)
                }
            })
    }

    /// Propagate everything on the queue, returning the conflicting constraint if any
    fn propagate(&mut self) -> Option<ConstraintId> {
        while self.propagate_index < self.decisions.len() {
            let literal = self.decisions.queue()[self.propagate_index];
            self.propagate_index += 1;
            self.stats.propagations += 1;

            if let Some(conflict) = self.propagate_clauses(-literal) {
                return Some(conflict);
            }

            let watching = self.watches.linear_watches(literal).len();
            for i in 0..watching {
                let id = self.watches.linear_watches(literal)[i];
                if !self.propagate_linear(id) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Visit the clauses watching a literal that just became false
    fn propagate_clauses(&mut self, false_literal: Literal) -> Option<ConstraintId> {
        let nodes = self.watches.take(false_literal);
        let mut kept = Vec::with_capacity(nodes.len());
        let mut conflict = None;

        for node in nodes {
            if conflict.is_some() || self.decisions.satisfied(node.blocker) {
                kept.push(node);
                continue;
            }

            let id = node.constraint;
            let Some(Constraint::Clause(literals)) = self.constraints.get_mut(id as usize) else {
                continue;
            };

            if literals[0] == false_literal {
                literals.swap(0, 1);
            }
            let first = literals[0];
            if self.decisions.satisfied(first) {
                kept.push(WatchNode {
                    constraint: id,
                    blocker: first,
                });
                continue;
            }

            let replacement = (2..literals.len()).find(|&k| !self.decisions.conflict(literals[k]));
            if let Some(k) = replacement {
                literals.swap(1, k);
                let watched = literals[1];
                self.watches.watch(
                    watched,
                    WatchNode {
                        constraint: id,
                        blocker: first,
                    },
                );
                continue;
            }

            kept.push(node);
            if self.decisions.conflict(first) {
                conflict = Some(id);
            } else {
                self.decisions.decide(first, Some(id));
            }
        }

        self.watches.restore(false_literal, kept);
        conflict
    }

    /// Check the slack of a linear constraint and force literals that no
    /// longer fit. Returns false on conflict.
    fn propagate_linear(&mut self, id: ConstraintId) -> bool {
        let Some(Constraint::Linear(linear)) = self.constraints.get(id as usize) else {
            return true;
        };

        let used: u128 = linear
            .terms
            .iter()
            .filter(|&&(_, l)| self.decisions.satisfied(l))
            .map(|&(a, _)| a)
            .sum();
        let bound = linear.bound;
        if used > bound {
            return false;
        }

        let slack = bound - used;
        let forced: Vec<Literal> = linear
            .terms
            .iter()
            .filter(|&&(a, l)| a > slack && self.decisions.value(l).is_none())
            .map(|&(_, l)| -l)
            .collect();

        for literal in forced {
            self.decisions.decide(literal, Some(id));
        }
        true
    }

    /// False literals of a conflicting constraint
    fn conflict_literals(&self, id: ConstraintId) -> Vec<Literal> {
        match &self.constraints[id as usize] {
            Constraint::Clause(literals) => literals.clone(),
            Constraint::Linear(linear) => linear
                .terms
                .iter()
                .filter(|&&(_, l)| self.decisions.satisfied(l))
                .map(|&(_, l)| -l)
                .collect(),
        }
    }

    /// False literals that forced `propagated` through constraint `id`
    fn reason_literals(&self, id: ConstraintId, propagated: Literal) -> Vec<Literal> {
        match &self.constraints[id as usize] {
            Constraint::Clause(literals) => literals
                .iter()
                .copied()
                .filter(|&l| l != propagated)
                .collect(),
            Constraint::Linear(linear) => {
                let position = self.decisions.position(propagated).unwrap_or(usize::MAX);
                linear
                    .terms
                    .iter()
                    .filter(|&&(_, l)| {
                        self.decisions.satisfied(l)
                            && self.decisions.position(l).is_some_and(|p| p < position)
                    })
                    .map(|&(_, l)| -l)
                    .collect()
            }
        }
    }

    /// First-UIP conflict analysis.
    ///
    /// Returns the learned clause, asserting literal first and the literal
    /// with the highest remaining level second, plus the level to go back to.
    fn analyze(&mut self, conflict: ConstraintId) -> (Vec<Literal>, u32) {
        let level = self.decisions.level();
        let mut learned: Vec<Literal> = vec![0];
        let mut pending = 0usize;
        let mut index = self.decisions.len();
        let mut literals = self.conflict_literals(conflict);

        let uip = loop {
            for &literal in &literals {
                let v = var(literal) as usize;
                if self.seen[v] {
                    continue;
                }
                match self.decisions.decision_level(literal) {
                    None | Some(0) => continue,
                    Some(l) if l == level => pending += 1,
                    Some(_) => learned.push(literal),
                }
                self.seen[v] = true;
            }

            while index > 0 {
                index -= 1;
                if self.seen[var(self.decisions.queue()[index]) as usize] {
                    break;
                }
            }
            let uip = self.decisions.queue()[index];
            self.seen[var(uip) as usize] = false;
            pending = pending.saturating_sub(1);
            if pending == 0 {
                break uip;
            }

            let Some(reason) = self.decisions.decision_rule(uip) else {
                break uip;
            };
            literals = self.reason_literals(reason, uip);
        };

        learned[0] = -uip;
        for &literal in &learned[1..] {
            self.seen[var(literal) as usize] = false;
        }

        let mut backtrack_level = 0;
        let mut at = 1;
        for (i, &literal) in learned.iter().enumerate().skip(1) {
            let l = self.decisions.decision_level(literal).unwrap_or(0);
            if l > backtrack_level {
                backtrack_level = l;
                at = i;
            }
        }
        if learned.len() > 1 {
            learned.swap(1, at);
        }

        (learned, backtrack_level)
    }

    /// Collect the assumptions that imply the negation of `failed`
    fn analyze_final(&mut self, failed: Literal) -> Vec<Literal> {
        let mut core = vec![failed];
        if self.decisions.decision_level(failed) == Some(0) {
            return core;
        }

        self.seen[var(failed) as usize] = true;
        let start = self.decisions.level_start(1);
        for i in (start..self.decisions.len()).rev() {
            let literal = self.decisions.queue()[i];
            let v = var(literal) as usize;
            if !self.seen[v] {
                continue;
            }
            match self.decisions.decision_rule(literal) {
                // Only assumptions are decided while assumptions remain
                None => core.push(literal),
                Some(reason) => {
                    for l in self.reason_literals(reason, literal) {
                        if self.decisions.decision_level(l).is_some_and(|level| level > 0) {
                            self.seen[var(l) as usize] = true;
                        }
                    }
                }
            }
            self.seen[v] = false;
        }

        core
    }

    fn learn(&mut self, learned: Vec<Literal>) {
        self.stats.learned += 1;
        let asserting = learned[0];
        let id = self.constraints.len() as ConstraintId;
        if learned.len() > 1 {
            self.watches.watch_clause(id, learned[0], learned[1]);
        }
        self.constraints.push(Constraint::Clause(learned));
        self.decisions.decide(asserting, Some(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::sat::{DecisionBudget, Indefinite};

    fn satisfies(model: &[bool], clause: &[Literal]) -> bool {
        clause.iter().any(|&l| model[var(l) as usize] == (l > 0))
    }

    #[test]
    fn test_satisfiable_clauses() {
        let mut solver = SatSolver::new();
        let clauses = vec![vec![1, 2], vec![-1, 3], vec![-2, -3], vec![-3, 4]];
        for clause in &clauses {
            assert!(solver.add_clause(clause.clone()));
        }

        match solver.solve(&[], &mut Indefinite) {
            SolveResult::Satisfiable(model) => {
                for clause in &clauses {
                    assert!(satisfies(&model, clause), "clause {:?} violated", clause);
                }
            }
            other => panic!("expected a model, got {:?}", other),
        }
    }

    #[test]
    fn test_contradiction() {
        let mut solver = SatSolver::new();
        assert!(solver.add_clause([1]));
        assert!(!solver.add_clause([-1]));
        assert!(solver.is_inconsistent());
        assert_eq!(solver.solve(&[], &mut Indefinite), SolveResult::Unsatisfiable(vec![]));
    }

    #[test]
    fn test_unsat_needs_search() {
        let mut solver = SatSolver::new();
        solver.add_clause([1, 2]);
        solver.add_clause([1, -2]);
        solver.add_clause([-1, 2]);
        solver.add_clause([-1, -2]);

        assert_eq!(solver.solve(&[], &mut Indefinite), SolveResult::Unsatisfiable(vec![]));
    }

    #[test]
    fn test_assumption_core() {
        let mut solver = SatSolver::new();
        // 1 -> 3, 2 -> !3, 4 is unrelated
        solver.add_clause([-1, 3]);
        solver.add_clause([-2, -3]);

        match solver.solve(&[1, 2, 4], &mut Indefinite) {
            SolveResult::Unsatisfiable(mut core) => {
                core.sort();
                assert_eq!(core, vec![1, 2]);
            }
            other => panic!("expected a core, got {:?}", other),
        }

        // The formula itself stays satisfiable
        assert!(matches!(solver.solve(&[1], &mut Indefinite), SolveResult::Satisfiable(_)));
    }

    #[test]
    fn test_pigeonhole() {
        // 3 pigeons, 2 holes; pigeon i in hole j is variable 2*i + j + 1
        let mut solver = SatSolver::new();
        for i in 0..3 {
            solver.add_clause([2 * i + 1, 2 * i + 2]);
        }
        for j in 0..2 {
            let terms: Vec<(i64, Literal)> = (0..3).map(|i| (1, 2 * i + j + 1)).collect();
            solver.add_at_most(terms, 1);
        }

        assert_eq!(solver.solve(&[], &mut Indefinite), SolveResult::Unsatisfiable(vec![]));
    }

    #[test]
    fn test_linear_model_respects_bound() {
        let mut solver = SatSolver::new();
        for v in 1..=5 {
            solver.set_phase(v);
        }
        solver.add_at_most([(3, 1), (2, 2), (2, 3), (1, 4), (1, 5)], 4);

        let SolveResult::Satisfiable(model) = solver.solve(&[], &mut Indefinite) else {
            panic!("expected a model");
        };
        let weight: u32 = [(3, 1), (2, 2), (2, 3), (1, 4), (1, 5)]
            .iter()
            .filter(|&&(_, v)| model[v as usize])
            .map(|&(a, _)| a)
            .sum();
        assert!(weight <= 4);
    }

    #[test]
    fn test_incremental_bound() {
        let mut solver = SatSolver::new();
        solver.set_phase(1);
        solver.set_phase(2);
        solver.add_clause([1, 2]);

        let SolveResult::Satisfiable(model) = solver.solve(&[], &mut Indefinite) else {
            panic!("expected a model");
        };
        assert!(model[1] && model[2]);

        assert!(solver.add_at_most([(1, 1), (1, 2)], 1));
        let SolveResult::Satisfiable(model) = solver.solve(&[], &mut Indefinite) else {
            panic!("expected a model");
        };
        assert!(model[1] != model[2]);

        solver.add_at_most([(1, 1), (1, 2)], 0);
        assert_eq!(solver.solve(&[], &mut Indefinite), SolveResult::Unsatisfiable(vec![]));
    }

    #[test]
    fn test_phase_preference() {
        let mut solver = SatSolver::new();
        let a = solver.new_var();
        let b = solver.new_var();
        solver.set_phase(a);

        let SolveResult::Satisfiable(model) = solver.solve(&[], &mut Indefinite) else {
            panic!("expected a model");
        };
        assert!(model[a as usize]);
        assert!(!model[b as usize]);
    }

    #[test]
    fn test_termination() {
        let mut solver = SatSolver::new();
        solver.add_clause([1, 2, 3]);

        let mut budget = DecisionBudget::new(0);
        assert_eq!(solver.solve(&[], &mut budget), SolveResult::Unknown);
        assert!(matches!(solver.solve(&[], &mut Indefinite), SolveResult::Satisfiable(_)));
    }
}
