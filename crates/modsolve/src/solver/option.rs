use std::fmt;

use crate::version::Version;

/// Dense identifier of an option registered with an [`OptionTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId(u32);

impl OptionId {
    pub(crate) fn new(index: usize) -> Self {
        OptionId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// A reference to an option, possibly negated.
///
/// Negation is a flag on the handle, so `negate` twice gives back the
/// original handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadOption {
    id: OptionId,
    negated: bool,
}

impl LoadOption {
    pub fn new(id: OptionId) -> Self {
        Self { id, negated: false }
    }

    pub fn id(self) -> OptionId {
        self.id
    }

    pub fn is_negated(self) -> bool {
        self.negated
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self {
            id: self.id,
            negated: !self.negated,
        }
    }
}

impl From<OptionId> for LoadOption {
    fn from(id: OptionId) -> Self {
        LoadOption::new(id)
    }
}

impl fmt::Display for LoadOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

/// A concrete candidate of a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOption {
    pub mod_id: String,
    pub key: String,
    pub version: Version,
    pub mandatory: bool,
}

/// An id provided by another option; carries the truth value of `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasOption {
    pub target: OptionId,
    pub mod_id: String,
    pub version: Version,
}

/// Internal option standing for one branch of a composite link or for an
/// `unless` exception
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOption {
    pub label: String,
}

/// What an option represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    Candidate(CandidateOption),
    Alias(AliasOption),
    Branch(BranchOption),
}

impl OptionKind {
    /// Mod id this option counts as, if any
    pub fn mod_id(&self) -> Option<&str> {
        match self {
            OptionKind::Candidate(c) => Some(&c.mod_id),
            OptionKind::Alias(a) => Some(&a.mod_id),
            OptionKind::Branch(_) => None,
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            OptionKind::Candidate(c) => Some(&c.version),
            OptionKind::Alias(a) => Some(&a.version),
            OptionKind::Branch(_) => None,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, OptionKind::Alias(_))
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Candidate(c) => write!(f, "{} {}", c.mod_id, c.version),
            OptionKind::Alias(a) => write!(f, "{} {}", a.mod_id, a.version),
            OptionKind::Branch(b) => f.write_str(&b.label),
        }
    }
}

#[derive(Debug, Clone)]
struct OptionEntry {
    kind: OptionKind,
    weight: i64,
    registered: bool,
}

/// Arena of all options known to a rule context.
///
/// Removing an option only unregisters it; ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    entries: Vec<OptionEntry>,
    registered: usize,
}

impl OptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new option
    pub fn add(&mut self, kind: OptionKind, weight: i64) -> OptionId {
        let id = OptionId::new(self.entries.len());
        self.entries.push(OptionEntry {
            kind,
            weight,
            registered: true,
        });
        self.registered += 1;
        id
    }

    /// Unregister an option. Returns false if it was not registered.
    pub fn remove(&mut self, id: OptionId) -> bool {
        match self.entries.get_mut(id.index()) {
            Some(entry) if entry.registered => {
                entry.registered = false;
                self.registered -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: OptionId) -> bool {
        self.entries.get(id.index()).is_some_and(|e| e.registered)
    }

    /// Kind of a registered option
    pub fn get(&self, id: OptionId) -> Option<&OptionKind> {
        self.entries
            .get(id.index())
            .filter(|e| e.registered)
            .map(|e| &e.kind)
    }

    pub fn weight(&self, id: OptionId) -> Option<i64> {
        self.entries
            .get(id.index())
            .filter(|e| e.registered)
            .map(|e| e.weight)
    }

    /// Change the weight of a registered option. Returns false for unknown ids.
    pub fn set_weight(&mut self, id: OptionId, weight: i64) -> bool {
        match self.entries.get_mut(id.index()) {
            Some(entry) if entry.registered => {
                entry.weight = weight;
                true
            }
            _ => false,
        }
    }

    pub fn mod_id(&self, id: OptionId) -> Option<&str> {
        self.get(id).and_then(OptionKind::mod_id)
    }

    pub fn version(&self, id: OptionId) -> Option<&Version> {
        self.get(id).and_then(OptionKind::version)
    }

    /// Follow alias links down to the root option, keeping the negation
    pub fn resolve_alias(&self, option: LoadOption) -> LoadOption {
        let mut id = option.id();
        // Bounded walk: alias chains cannot be longer than the table
        for _ in 0..self.entries.len() {
            match self.entries.get(id.index()).map(|e| &e.kind) {
                Some(OptionKind::Alias(alias)) => id = alias.target,
                _ => break,
            }
        }
        LoadOption {
            id,
            negated: option.is_negated(),
        }
    }

    /// Root option an id stands for
    pub fn root(&self, id: OptionId) -> OptionId {
        self.resolve_alias(LoadOption::new(id)).id()
    }

    /// Whether the option is its own root (not an alias)
    pub fn is_root(&self, id: OptionId) -> bool {
        self.get(id).is_some_and(|k| !k.is_alias())
    }

    /// Registered options in id order
    pub fn iter(&self) -> impl Iterator<Item = (OptionId, &OptionKind)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.registered)
            .map(|(i, e)| (OptionId::new(i), &e.kind))
    }

    /// Number of registered options
    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Human readable name of an option for diagnostics
    pub fn describe(&self, id: OptionId) -> String {
        match self.entries.get(id.index()).map(|e| &e.kind) {
            Some(OptionKind::Alias(alias)) => {
                let root = self.root(id);
                let provider = match self.entries.get(root.index()) {
                    Some(entry) => entry.kind.to_string(),
                    None => root.to_string(),
                };
                format!("{} {} (provided by {})", alias.mod_id, alias.version, provider)
            }
            Some(kind) => kind.to_string(),
            None => id.to_string(),
        }
    }
}
