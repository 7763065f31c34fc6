use super::{ConstraintId, Literal};

/// Tracks the assignment trail of the SAT backend.
///
/// Each decision records:
/// - Whether a variable is true (+) or false (-)
/// - At what decision level it was decided
/// - Which constraint forced it (none for branching decisions and assumptions)
///
/// Uses flat Vecs indexed by variable for O(1) lookups.
/// The decision_map stores: 0 = undecided, >0 = true at level N-1, <0 = false at level N-1
#[derive(Debug, Default)]
pub struct Decisions {
    /// Maps variable to decision, value encodes both polarity and level + 1
    decision_map: Vec<i32>,

    /// Constraint that forced each variable, if any
    reasons: Vec<Option<ConstraintId>>,

    /// Position of each decided variable in the queue
    positions: Vec<usize>,

    /// Literals in the order they were decided
    decision_queue: Vec<Literal>,

    /// Queue length at the start of each level above 0
    level_starts: Vec<usize>,
}

impl Decisions {
    /// Create a new empty decisions tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker for variables 1..=num_vars
    pub fn with_capacity(num_vars: usize) -> Self {
        Self {
            decision_map: vec![0; num_vars + 1],
            reasons: vec![None; num_vars + 1],
            positions: vec![0; num_vars + 1],
            decision_queue: Vec::with_capacity(num_vars),
            level_starts: Vec::new(),
        }
    }

    /// Make room for a variable
    pub fn ensure_capacity(&mut self, var: usize) {
        if var >= self.decision_map.len() {
            self.decision_map.resize(var + 1, 0);
            self.reasons.resize(var + 1, None);
            self.positions.resize(var + 1, 0);
        }
    }

    /// Get the current decision level
    #[inline]
    pub fn level(&self) -> u32 {
        self.level_starts.len() as u32
    }

    /// Open a new decision level
    #[inline]
    pub fn increment_level(&mut self) {
        self.level_starts.push(self.decision_queue.len());
    }

    /// Make a decision at the current level
    ///
    /// Returns false if this conflicts with an existing decision
    pub fn decide(&mut self, literal: Literal, reason: Option<ConstraintId>) -> bool {
        let var = literal.unsigned_abs() as usize;
        self.ensure_capacity(var);

        let existing = self.decision_map[var];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        let level_value = self.level() as i32 + 1;
        self.decision_map[var] = if literal > 0 { level_value } else { -level_value };
        self.reasons[var] = reason;
        self.positions[var] = self.decision_queue.len();
        self.decision_queue.push(literal);

        true
    }

    /// Truth value of a literal: None while undecided
    #[inline]
    pub fn value(&self, literal: Literal) -> Option<bool> {
        let var = literal.unsigned_abs() as usize;
        match self.decision_map.get(var).copied().unwrap_or(0) {
            0 => None,
            d => Some((d > 0) == (literal > 0)),
        }
    }

    /// Check if a literal is satisfied by current decisions
    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        self.value(literal) == Some(true)
    }

    /// Check if a literal conflicts with current decisions
    #[inline]
    pub fn conflict(&self, literal: Literal) -> bool {
        self.value(literal) == Some(false)
    }

    /// Check if a variable has been decided (either way)
    #[inline]
    pub fn decided(&self, var: u32) -> bool {
        self.decision_map
            .get(var as usize)
            .is_some_and(|&d| d != 0)
    }

    /// Check if a variable is undecided
    #[inline]
    pub fn undecided(&self, var: u32) -> bool {
        !self.decided(var)
    }

    /// Get the decision level for a literal's variable
    #[inline]
    pub fn decision_level(&self, literal: Literal) -> Option<u32> {
        let var = literal.unsigned_abs() as usize;
        match self.decision_map.get(var).copied().unwrap_or(0) {
            0 => None,
            d => Some(d.unsigned_abs() - 1),
        }
    }

    /// Get the constraint that forced a literal's variable
    #[inline]
    pub fn decision_rule(&self, literal: Literal) -> Option<ConstraintId> {
        let var = literal.unsigned_abs() as usize;
        if self.decided(var as u32) {
            self.reasons[var]
        } else {
            None
        }
    }

    /// Position of a literal's variable in the decision queue
    #[inline]
    pub fn position(&self, literal: Literal) -> Option<usize> {
        let var = literal.unsigned_abs() as usize;
        if self.decided(var as u32) {
            Some(self.positions[var])
        } else {
            None
        }
    }

    /// Revert all decisions at levels > target_level
    pub fn revert_to_level(&mut self, target_level: u32) {
        while self.level() > target_level {
            let Some(start) = self.level_starts.pop() else {
                break;
            };
            for literal in self.decision_queue.drain(start..) {
                let var = literal.unsigned_abs() as usize;
                self.decision_map[var] = 0;
                self.reasons[var] = None;
            }
        }
    }

    /// Queue index where the given level starts
    pub fn level_start(&self, level: u32) -> usize {
        if level == 0 {
            0
        } else {
            self.level_starts
                .get(level as usize - 1)
                .copied()
                .unwrap_or(self.decision_queue.len())
        }
    }

    /// Get the decision queue
    pub fn queue(&self) -> &[Literal] {
        &self.decision_queue
    }

    /// Get the number of decisions
    pub fn len(&self) -> usize {
        self.decision_queue.len()
    }

    /// Check if no decisions have been made
    pub fn is_empty(&self) -> bool {
        self.decision_queue.is_empty()
    }

    /// Snapshot of the current assignment indexed by variable (index 0 unused)
    pub fn model(&self) -> Vec<bool> {
        self.decision_map.iter().map(|&d| d > 0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions_new() {
        let decisions = Decisions::new();
        assert_eq!(decisions.level(), 0);
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_decisions_decide() {
        let mut decisions = Decisions::new();

        assert!(decisions.decide(1, Some(0)));
        assert!(decisions.satisfied(1));
        assert!(!decisions.satisfied(-1));

        assert!(decisions.decide(-2, Some(1)));
        assert!(decisions.satisfied(-2));
        assert!(decisions.conflict(2));
        assert_eq!(decisions.value(3), None);
    }

    #[test]
    fn test_decisions_conflict() {
        let mut decisions = Decisions::new();

        decisions.decide(1, None);

        assert!(!decisions.decide(-1, None));
        assert!(decisions.decide(1, None));
        assert!(decisions.conflict(-1));
        assert!(!decisions.conflict(1));
    }

    #[test]
    fn test_decisions_levels() {
        let mut decisions = Decisions::new();
        decisions.decide(4, None);
        assert_eq!(decisions.decision_level(4), Some(0));

        decisions.increment_level();
        decisions.decide(1, None);
        assert_eq!(decisions.decision_level(1), Some(1));

        decisions.increment_level();
        decisions.decide(-2, Some(7));
        assert_eq!(decisions.decision_level(-2), Some(2));
        assert_eq!(decisions.decision_rule(2), Some(7));
        assert_eq!(decisions.position(2), Some(2));
        assert_eq!(decisions.level_start(2), 2);
    }

    #[test]
    fn test_decisions_revert() {
        let mut decisions = Decisions::new();

        decisions.increment_level();
        decisions.decide(1, None);

        decisions.increment_level();
        decisions.decide(2, None);

        decisions.increment_level();
        decisions.decide(3, Some(0));

        decisions.revert_to_level(1);

        assert!(decisions.decided(1));
        assert!(!decisions.decided(2));
        assert!(!decisions.decided(3));
        assert_eq!(decisions.decision_rule(3), None);
        assert_eq!(decisions.level(), 1);
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn test_decisions_model() {
        let mut decisions = Decisions::with_capacity(3);
        decisions.decide(1, None);
        decisions.decide(-2, None);
        decisions.decide(3, None);

        assert_eq!(decisions.model(), vec![false, true, false, true]);
    }
}
