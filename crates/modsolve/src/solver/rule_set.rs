use super::definer::Cardinality;
use super::rule::{Rule, RuleId, RuleType};

/// A registered rule together with its bookkeeping
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub rule: Rule,
    /// Rule this one is a sub-rule of
    pub parent: Option<RuleId>,
    pub children: Vec<RuleId>,
    /// Constraints from the last call to `define`
    pub constraints: Vec<Cardinality>,
    /// Option lists changed since the last definition
    pub stale: bool,
}

/// Arena of rules addressed by [`RuleId`].
///
/// Removed rules leave a hole so ids stay stable; rules are kept in
/// insertion order.
#[derive(Debug, Default)]
pub struct RuleSet {
    /// All rules indexed by ID
    entries: Vec<Option<RuleEntry>>,

    active: usize,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning its ID
    pub fn add(&mut self, rule: Rule, parent: Option<RuleId>) -> RuleId {
        let id = RuleId::new(self.entries.len());

        if let Some(parent) = parent.and_then(|p| self.entry_mut(p)) {
            parent.children.push(id);
        }

        self.entries.push(Some(RuleEntry {
            rule,
            parent,
            children: Vec::new(),
            constraints: Vec::new(),
            stale: true,
        }));
        self.active += 1;

        id
    }

    /// Remove a rule and all of its sub-rules, returning the removed ids
    pub fn remove(&mut self, id: RuleId) -> Vec<RuleId> {
        let parent = self.parent(id);
        let subtree = self.subtree(id);
        for &removed in &subtree {
            if let Some(slot) = self.entries.get_mut(removed.index()) {
                if slot.take().is_some() {
                    self.active -= 1;
                }
            }
        }

        if let Some(entry) = parent.and_then(|p| self.entry_mut(p)) {
            entry.children.retain(|&c| c != id);
        }

        subtree
    }

    /// Get a rule by ID
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.entry(id).map(|e| &e.rule)
    }

    pub fn entry(&self, id: RuleId) -> Option<&RuleEntry> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    pub fn entry_mut(&mut self, id: RuleId) -> Option<&mut RuleEntry> {
        self.entries.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: RuleId) -> bool {
        self.entry(id).is_some()
    }

    pub fn parent(&self, id: RuleId) -> Option<RuleId> {
        self.entry(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: RuleId) -> &[RuleId] {
        self.entry(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// The outermost rule a rule belongs to
    pub fn top_level(&self, id: RuleId) -> RuleId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// A rule followed by all of its descendants, depth first
    pub fn subtree(&self, id: RuleId) -> Vec<RuleId> {
        let mut result = Vec::new();
        if !self.contains(id) {
            return result;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        result
    }

    /// Registered rules in id order
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &RuleEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (RuleId::new(i), e)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RuleId, &mut RuleEntry)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, e)| e.as_mut().map(|e| (RuleId::new(i), e)))
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Get statistics about the rule set
    pub fn stats(&self) -> RuleSetStats {
        let mut stats = RuleSetStats {
            total: self.active,
            ..Default::default()
        };

        for (_, entry) in self.iter() {
            match entry.rule.rule_type() {
                RuleType::Mandatory => stats.mandatory += 1,
                RuleType::OptionalSet => stats.optional_set += 1,
                RuleType::OverriddenSet => stats.overridden_set += 1,
                RuleType::DependsOnly | RuleType::DependsAny => stats.depends += 1,
                RuleType::BreaksOnly | RuleType::BreaksAll => stats.breaks += 1,
            }
            if entry.parent.is_some() {
                stats.sub_rules += 1;
            }
            stats.constraints += entry.constraints.len();
        }

        stats
    }
}

/// Statistics about a rule set
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleSetStats {
    pub total: usize,
    pub mandatory: usize,
    pub optional_set: usize,
    pub overridden_set: usize,
    pub depends: usize,
    pub breaks: usize,
    pub sub_rules: usize,
    pub constraints: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::option::OptionId;

    #[test]
    fn test_rule_set_add_and_stats() {
        let mut rules = RuleSet::new();
        let a = rules.add(Rule::mandatory(OptionId::new(0)), None);
        let b = rules.add(Rule::optional_set("lib"), None);

        assert_eq!(a, RuleId::new(0));
        assert_eq!(b, RuleId::new(1));
        assert_eq!(rules.len(), 2);

        let stats = rules.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.mandatory, 1);
        assert_eq!(stats.optional_set, 1);
    }

    #[test]
    fn test_rule_tree() {
        let mut rules = RuleSet::new();
        let source = OptionId::new(0);
        let top = rules.add(Rule::depends_any(source, vec![OptionId::new(1)], None), None);
        let child = rules.add(Rule::depends_any(OptionId::new(1), vec![OptionId::new(2)], None), Some(top));
        let grandchild = rules.add(Rule::optional_set("x"), Some(child));
        let other = rules.add(Rule::optional_set("y"), None);

        assert_eq!(rules.top_level(grandchild), top);
        assert_eq!(rules.subtree(top), vec![top, child, grandchild]);
        assert_eq!(rules.stats().sub_rules, 2);

        let removed = rules.remove(child);
        assert_eq!(removed, vec![child, grandchild]);
        assert!(rules.children(top).is_empty());
        assert!(!rules.contains(grandchild));
        assert!(rules.contains(other));
        assert_eq!(rules.len(), 2);
        assert!(rules.remove(child).is_empty());

        let stats = rules.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.depends, 1);
        assert_eq!(stats.optional_set, 1);
        assert_eq!(stats.sub_rules, 0);
    }
}
