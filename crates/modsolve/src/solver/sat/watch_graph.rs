use super::{ConstraintId, Literal};

/// Watch lists for unit propagation.
///
/// Clauses watch exactly 2 of their literals and are visited when a watched
/// literal becomes false; the other watched literal doubles as a blocker that
/// lets satisfied clauses be skipped without touching the clause itself.
///
/// Linear constraints watch all their literals and are visited whenever one
/// of them becomes true, since every true literal eats into the slack.
#[derive(Debug, Default)]
pub struct WatchGraph {
    /// Maps literal index -> clauses watching that literal
    watches: Vec<Vec<WatchNode>>,
    /// Maps literal index -> linear constraints containing that literal
    linear: Vec<Vec<ConstraintId>>,
}

/// A watch node linking a clause to a watched literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchNode {
    pub constraint: ConstraintId,
    /// The other watched literal of the clause
    pub blocker: Literal,
}

impl WatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert literal to index (handles positive and negative literals)
    fn literal_to_index(literal: Literal) -> usize {
        let abs = literal.unsigned_abs() as usize;
        if literal > 0 {
            abs * 2
        } else {
            abs * 2 + 1
        }
    }

    fn grow(&mut self, idx: usize) {
        if idx >= self.watches.len() {
            self.watches.resize(idx + 1, Vec::new());
            self.linear.resize(idx + 1, Vec::new());
        }
    }

    /// Watch the first two literals of a clause
    pub fn watch_clause(&mut self, constraint: ConstraintId, first: Literal, second: Literal) {
        self.watch(first, WatchNode { constraint, blocker: second });
        self.watch(second, WatchNode { constraint, blocker: first });
    }

    /// Add a single watch node to a literal
    pub fn watch(&mut self, literal: Literal, node: WatchNode) {
        let idx = Self::literal_to_index(literal);
        self.grow(idx);
        self.watches[idx].push(node);
    }

    /// Register a linear constraint on every literal it mentions
    pub fn watch_linear(&mut self, constraint: ConstraintId, literals: impl IntoIterator<Item = Literal>) {
        for literal in literals {
            let idx = Self::literal_to_index(literal);
            self.grow(idx);
            self.linear[idx].push(constraint);
        }
    }

    /// Detach the clause watches of a literal for processing.
    ///
    /// The caller hands the surviving nodes back with [`WatchGraph::restore`].
    pub fn take(&mut self, literal: Literal) -> Vec<WatchNode> {
        let idx = Self::literal_to_index(literal);
        match self.watches.get_mut(idx) {
            Some(list) => std::mem::take(list),
            None => Vec::new(),
        }
    }

    /// Put processed watch nodes back onto a literal
    pub fn restore(&mut self, literal: Literal, nodes: Vec<WatchNode>) {
        let idx = Self::literal_to_index(literal);
        self.grow(idx);
        let list = &mut self.watches[idx];
        if list.is_empty() {
            *list = nodes;
        } else {
            list.extend(nodes);
        }
    }

    /// Get clauses watching a specific literal
    pub fn get_watches(&self, literal: Literal) -> &[WatchNode] {
        self.watches
            .get(Self::literal_to_index(literal))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Linear constraints that mention a literal
    pub fn linear_watches(&self, literal: Literal) -> &[ConstraintId] {
        self.linear
            .get(Self::literal_to_index(literal))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_clause() {
        let mut graph = WatchGraph::new();
        graph.watch_clause(0, 1, -2);

        assert_eq!(graph.get_watches(1), &[WatchNode { constraint: 0, blocker: -2 }]);
        assert_eq!(graph.get_watches(-2), &[WatchNode { constraint: 0, blocker: 1 }]);
        assert!(graph.get_watches(2).is_empty());
        assert!(graph.get_watches(40).is_empty());
    }

    #[test]
    fn test_take_and_restore() {
        let mut graph = WatchGraph::new();
        graph.watch_clause(0, 1, 2);
        graph.watch_clause(1, 1, 3);

        let nodes = graph.take(1);
        assert_eq!(nodes.len(), 2);
        assert!(graph.get_watches(1).is_empty());

        graph.watch(1, WatchNode { constraint: 5, blocker: 4 });
        graph.restore(1, nodes);
        assert_eq!(graph.get_watches(1).len(), 3);
    }

    #[test]
    fn test_linear_watches() {
        let mut graph = WatchGraph::new();
        graph.watch_linear(3, [1, -2, 5]);

        assert_eq!(graph.linear_watches(-2), &[3]);
        assert!(graph.linear_watches(2).is_empty());
        assert_eq!(graph.linear_watches(5), &[3]);
    }
}
