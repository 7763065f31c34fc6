//! Versions and version predicates for mod dependency declarations.
//!
//! Versions are dotted numeric versions with optional pre-release and build
//! metadata. Anything that does not look like that is kept as a raw version
//! and ordered by its text, below every numeric version.

mod constraint;
mod operator;
#[allow(clippy::module_inception)]
mod version;

pub use constraint::{Comparator, VersionConstraint};
pub use operator::Operator;
pub use version::Version;
