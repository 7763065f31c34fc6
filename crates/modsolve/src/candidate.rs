//! Typed resolution input: candidate pools and their declarations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionConstraint};

/// A set of candidate pools, one per mod id.
///
/// Pool order is preserved; it only affects the order of reported results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub pools: IndexMap<String, Vec<Candidate>>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate to the pool of `id`
    pub fn add(&mut self, id: impl Into<String>, candidate: Candidate) -> &mut Self {
        self.pools.entry(id.into()).or_default().push(candidate);
        self
    }

    /// Candidates of one mod id
    pub fn pool(&self, id: &str) -> &[Candidate] {
        self.pools.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over `(id, candidate)` pairs
    pub fn candidates(&self) -> impl Iterator<Item = (&str, &Candidate)> {
        self.pools
            .iter()
            .flat_map(|(id, pool)| pool.iter().map(move |c| (id.as_str(), c)))
    }

    /// Total number of candidates
    pub fn len(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One loadable version of a mod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique key, reported back in the resolution (e.g. a file path)
    pub key: String,
    pub version: Version,
    /// Must be loaded; at most one candidate per id may be mandatory
    #[serde(default)]
    pub mandatory: bool,
    /// Added to the derived weight; lower weights are preferred
    #[serde(default)]
    pub weight: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<DependsOn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breaks: Vec<BreaksOn>,
    /// Other ids this candidate stands in for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provided>,
}

impl Candidate {
    pub fn new(key: impl Into<String>, version: Version) -> Self {
        Self {
            key: key.into(),
            version,
            mandatory: false,
            weight: 0,
            depends: Vec::new(),
            breaks: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// Mark the candidate mandatory
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    pub fn depends(mut self, depends: DependsOn) -> Self {
        self.depends.push(depends);
        self
    }

    pub fn breaks(mut self, breaks: BreaksOn) -> Self {
        self.breaks.push(breaks);
        self
    }

    pub fn provides(mut self, provided: Provided) -> Self {
        self.provides.push(provided);
        self
    }
}

/// Target of a dependency or breakage: an id plus a version predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTarget {
    pub id: String,
    #[serde(default)]
    pub versions: VersionConstraint,
    /// Optional dependencies never pull the target in; they only forbid
    /// candidates of the target whose version does not match. Ignored for
    /// breakages.
    #[serde(default)]
    pub optional: bool,
    /// The link does not apply while this dependency is satisfied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless: Option<Box<DependsOn>>,
}

impl LinkTarget {
    /// Link to any version of `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            versions: VersionConstraint::any(),
            optional: false,
            unless: None,
        }
    }

    pub fn versions(mut self, versions: VersionConstraint) -> Self {
        self.versions = versions;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn unless(mut self, unless: DependsOn) -> Self {
        self.unless = Some(Box::new(unless));
        self
    }
}

/// A dependency declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    /// Satisfied when any of the alternatives is
    Any {
        any: Vec<DependsOn>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unless: Option<Box<DependsOn>>,
    },
    /// Satisfied by a candidate of the target matching the predicate
    Only(LinkTarget),
}

impl DependsOn {
    /// Depend on any version of `id`
    pub fn on(id: impl Into<String>) -> Self {
        DependsOn::Only(LinkTarget::new(id))
    }

    /// Depend on a version of `id` matching `versions`
    pub fn on_versions(id: impl Into<String>, versions: VersionConstraint) -> Self {
        DependsOn::Only(LinkTarget::new(id).versions(versions))
    }

    /// Depend on any one of the alternatives
    pub fn any(alternatives: Vec<DependsOn>) -> Self {
        DependsOn::Any {
            any: alternatives,
            unless: None,
        }
    }
}

impl From<LinkTarget> for DependsOn {
    fn from(target: LinkTarget) -> Self {
        DependsOn::Only(target)
    }
}

/// A breakage declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BreaksOn {
    /// Breaks only when every part is present
    All {
        all: Vec<BreaksOn>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unless: Option<Box<DependsOn>>,
    },
    /// Breaks every candidate of the target matching the predicate
    Only(LinkTarget),
}

impl BreaksOn {
    /// Break every version of `id`
    pub fn on(id: impl Into<String>) -> Self {
        BreaksOn::Only(LinkTarget::new(id))
    }

    /// Break versions of `id` matching `versions`
    pub fn on_versions(id: impl Into<String>, versions: VersionConstraint) -> Self {
        BreaksOn::Only(LinkTarget::new(id).versions(versions))
    }

    /// Break the combination of all parts
    pub fn all(parts: Vec<BreaksOn>) -> Self {
        BreaksOn::All {
            all: parts,
            unless: None,
        }
    }
}

impl From<LinkTarget> for BreaksOn {
    fn from(target: LinkTarget) -> Self {
        BreaksOn::Only(target)
    }
}

/// An id a candidate provides in addition to its own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provided {
    pub id: String,
    /// Defaults to the providing candidate's version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl Provided {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }
}
