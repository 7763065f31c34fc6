use std::fmt;

use crate::error::DefinitionError;
use crate::version::VersionConstraint;

use super::definer::RuleDefiner;
use super::option::{LoadOption, OptionId, OptionTable};

/// Dense identifier of a rule registered with a rule context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
    pub(crate) fn new(index: usize) -> Self {
        RuleId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Types of rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
    /// An option must be loaded
    Mandatory,
    /// At most one option of an id is loaded
    OptionalSet,
    /// A mandatory option overrides every other option of its id
    OverriddenSet,
    /// Source requires a matching candidate of one id
    DependsOnly,
    /// Source requires any of several alternatives
    DependsAny,
    /// Source cannot load alongside matching candidates of one id
    BreaksOnly,
    /// Source cannot load alongside a combination of parts
    BreaksAll,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Mandatory => "mandatory",
            RuleType::OptionalSet => "optional-set",
            RuleType::OverriddenSet => "overridden-set",
            RuleType::DependsOnly => "depends-only",
            RuleType::DependsAny => "depends-any",
            RuleType::BreaksOnly => "breaks-only",
            RuleType::BreaksAll => "breaks-all",
        }
    }

    /// Dependency or breakage rule
    pub fn is_link(&self) -> bool {
        matches!(
            self,
            RuleType::DependsOnly | RuleType::DependsAny | RuleType::BreaksOnly | RuleType::BreaksAll
        )
    }

    pub fn is_depends(&self) -> bool {
        matches!(self, RuleType::DependsOnly | RuleType::DependsAny)
    }
}

/// The target of a single link: an id and a version predicate
#[derive(Debug, Clone)]
pub struct ModLink {
    pub mod_id: String,
    pub versions: VersionConstraint,
    pub optional: bool,
}

impl ModLink {
    pub fn new(mod_id: impl Into<String>, versions: VersionConstraint) -> Self {
        Self {
            mod_id: mod_id.into(),
            versions,
            optional: false,
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Whether a registered option is a candidate for this link
    fn accepts(&self, id: OptionId, table: &OptionTable) -> Option<bool> {
        let kind = table.get(id)?;
        if kind.mod_id()? != self.mod_id {
            return None;
        }
        Some(kind.version().is_some_and(|v| self.versions.matches(v)))
    }
}

impl fmt::Display for ModLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.versions.is_any() {
            write!(f, "{} (any version)", self.mod_id)
        } else {
            write!(f, "{} {}", self.mod_id, self.versions)
        }
    }
}

/// Whether a breakage stands on its own or is one part of a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakRole {
    Standalone,
    Part,
}

#[derive(Debug, Clone)]
pub struct MandatoryRule {
    pub option: OptionId,
}

#[derive(Debug, Clone)]
pub struct OptionalSetRule {
    pub mod_id: String,
    pub options: Vec<OptionId>,
}

#[derive(Debug, Clone)]
pub struct OverriddenSetRule {
    pub mod_id: String,
    pub mandatory: OptionId,
    pub options: Vec<OptionId>,
}

#[derive(Debug, Clone)]
pub struct DependsOnlyRule {
    pub source: OptionId,
    pub link: ModLink,
    pub unless: Option<OptionId>,
    /// Options of the target id matching the predicate
    pub valid: Vec<OptionId>,
    /// Options of the target id not matching the predicate
    pub invalid: Vec<OptionId>,
}

#[derive(Debug, Clone)]
pub struct DependsAnyRule {
    pub source: OptionId,
    /// Branch options, one per alternative sub-rule
    pub alternatives: Vec<OptionId>,
    pub unless: Option<OptionId>,
}

#[derive(Debug, Clone)]
pub struct BreaksOnlyRule {
    pub source: OptionId,
    pub link: ModLink,
    pub unless: Option<OptionId>,
    pub role: BreakRole,
    /// Options of the target id matching the predicate
    pub conflicts: Vec<OptionId>,
}

#[derive(Debug, Clone)]
pub struct BreaksAllRule {
    pub source: OptionId,
    /// Branch options, one per part sub-rule
    pub parts: Vec<OptionId>,
    pub unless: Option<OptionId>,
    pub role: BreakRole,
}

/// A relationship over options that translates into constraints.
///
/// Option lists are filled in by the rule context through
/// [`Rule::on_option_added`]; constructors start them empty.
#[derive(Debug, Clone)]
pub enum Rule {
    Mandatory(MandatoryRule),
    OptionalSet(OptionalSetRule),
    OverriddenSet(OverriddenSetRule),
    DependsOnly(DependsOnlyRule),
    DependsAny(DependsAnyRule),
    BreaksOnly(BreaksOnlyRule),
    BreaksAll(BreaksAllRule),
}

fn clause_with_unless(mut literals: Vec<LoadOption>, unless: Option<OptionId>) -> Vec<LoadOption> {
    if let Some(u) = unless {
        literals.push(LoadOption::new(u));
    }
    literals
}

fn remove_from(list: &mut Vec<OptionId>, id: OptionId) -> bool {
    match list.iter().position(|&o| o == id) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

fn push_unique(list: &mut Vec<OptionId>, id: OptionId) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

impl Rule {
    pub fn mandatory(option: OptionId) -> Self {
        Rule::Mandatory(MandatoryRule { option })
    }

    pub fn optional_set(mod_id: impl Into<String>) -> Self {
        Rule::OptionalSet(OptionalSetRule {
            mod_id: mod_id.into(),
            options: Vec::new(),
        })
    }

    pub fn overridden_set(mod_id: impl Into<String>, mandatory: OptionId) -> Self {
        Rule::OverriddenSet(OverriddenSetRule {
            mod_id: mod_id.into(),
            mandatory,
            options: Vec::new(),
        })
    }

    pub fn depends_only(source: OptionId, link: ModLink, unless: Option<OptionId>) -> Self {
        Rule::DependsOnly(DependsOnlyRule {
            source,
            link,
            unless,
            valid: Vec::new(),
            invalid: Vec::new(),
        })
    }

    pub fn depends_any(source: OptionId, alternatives: Vec<OptionId>, unless: Option<OptionId>) -> Self {
        Rule::DependsAny(DependsAnyRule {
            source,
            alternatives,
            unless,
        })
    }

    pub fn breaks_only(
        source: OptionId,
        link: ModLink,
        unless: Option<OptionId>,
        role: BreakRole,
    ) -> Self {
        Rule::BreaksOnly(BreaksOnlyRule {
            source,
            link,
            unless,
            role,
            conflicts: Vec::new(),
        })
    }

    pub fn breaks_all(
        source: OptionId,
        parts: Vec<OptionId>,
        unless: Option<OptionId>,
        role: BreakRole,
    ) -> Self {
        Rule::BreaksAll(BreaksAllRule {
            source,
            parts,
            unless,
            role,
        })
    }

    pub fn rule_type(&self) -> RuleType {
        match self {
            Rule::Mandatory(_) => RuleType::Mandatory,
            Rule::OptionalSet(_) => RuleType::OptionalSet,
            Rule::OverriddenSet(_) => RuleType::OverriddenSet,
            Rule::DependsOnly(_) => RuleType::DependsOnly,
            Rule::DependsAny(_) => RuleType::DependsAny,
            Rule::BreaksOnly(_) => RuleType::BreaksOnly,
            Rule::BreaksAll(_) => RuleType::BreaksAll,
        }
    }

    /// Option that declared the link, for link rules
    pub fn source(&self) -> Option<OptionId> {
        match self {
            Rule::DependsOnly(r) => Some(r.source),
            Rule::DependsAny(r) => Some(r.source),
            Rule::BreaksOnly(r) => Some(r.source),
            Rule::BreaksAll(r) => Some(r.source),
            _ => None,
        }
    }

    /// Branch option of the `unless` exception, if any
    pub fn unless(&self) -> Option<OptionId> {
        match self {
            Rule::DependsOnly(r) => r.unless,
            Rule::DependsAny(r) => r.unless,
            Rule::BreaksOnly(r) => r.unless,
            Rule::BreaksAll(r) => r.unless,
            _ => None,
        }
    }

    /// Called for every option registered with the context.
    ///
    /// Returns true if the rule's constraints changed.
    pub fn on_option_added(&mut self, id: OptionId, table: &OptionTable) -> bool {
        match self {
            Rule::Mandatory(_) | Rule::DependsAny(_) | Rule::BreaksAll(_) => false,
            Rule::OptionalSet(rule) => {
                table.mod_id(id) == Some(rule.mod_id.as_str()) && push_unique(&mut rule.options, id)
            }
            Rule::OverriddenSet(rule) => {
                // Aliases of the mandatory candidate stand for the candidate itself
                table.root(id) != rule.mandatory
                    && table.mod_id(id) == Some(rule.mod_id.as_str())
                    && push_unique(&mut rule.options, id)
            }
            Rule::DependsOnly(rule) => match rule.link.accepts(id, table) {
                Some(true) => push_unique(&mut rule.valid, id),
                Some(false) => push_unique(&mut rule.invalid, id),
                None => false,
            },
            Rule::BreaksOnly(rule) => match rule.link.accepts(id, table) {
                Some(true) => push_unique(&mut rule.conflicts, id),
                _ => false,
            },
        }
    }

    /// Called for every option unregistered from the context.
    ///
    /// Returns true if the rule referenced the option.
    pub fn on_option_removed(&mut self, id: OptionId) -> bool {
        match self {
            Rule::Mandatory(rule) => rule.option == id,
            Rule::OptionalSet(rule) => remove_from(&mut rule.options, id),
            Rule::OverriddenSet(rule) => {
                remove_from(&mut rule.options, id) | (rule.mandatory == id)
            }
            Rule::DependsOnly(rule) => {
                remove_from(&mut rule.valid, id)
                    | remove_from(&mut rule.invalid, id)
                    | (rule.source == id)
                    | (rule.unless == Some(id))
            }
            Rule::DependsAny(rule) => {
                rule.alternatives.contains(&id) | (rule.source == id) | (rule.unless == Some(id))
            }
            Rule::BreaksOnly(rule) => {
                remove_from(&mut rule.conflicts, id) | (rule.source == id) | (rule.unless == Some(id))
            }
            Rule::BreaksAll(rule) => {
                rule.parts.contains(&id) | (rule.source == id) | (rule.unless == Some(id))
            }
        }
    }

    /// Emit the constraints of this rule
    pub fn define(&self, definer: &mut RuleDefiner<'_>) -> Result<(), DefinitionError> {
        match self {
            Rule::Mandatory(rule) => definer.at_least_one_of(&[LoadOption::new(rule.option)]),
            Rule::OptionalSet(rule) => {
                if rule.options.len() < 2 {
                    return Ok(());
                }
                let options: Vec<LoadOption> = rule.options.iter().map(|&o| o.into()).collect();
                definer.at_most(1, &options)
            }
            Rule::OverriddenSet(rule) => {
                let options: Vec<LoadOption> = rule.options.iter().map(|&o| o.into()).collect();
                definer.at_most(0, &options)
            }
            Rule::DependsOnly(rule) => {
                let source = definer.negate(rule.source.into());
                if rule.link.optional {
                    for &x in &rule.invalid {
                        let clause = vec![source, definer.negate(x.into())];
                        definer.at_least_one_of(&clause_with_unless(clause, rule.unless))?;
                    }
                    Ok(())
                } else {
                    let mut clause = vec![source];
                    clause.extend(rule.valid.iter().map(|&o| LoadOption::new(o)));
                    definer.at_least_one_of(&clause_with_unless(clause, rule.unless))
                }
            }
            Rule::DependsAny(rule) => {
                let mut clause = vec![definer.negate(rule.source.into())];
                clause.extend(rule.alternatives.iter().map(|&o| LoadOption::new(o)));
                definer.at_least_one_of(&clause_with_unless(clause, rule.unless))
            }
            Rule::BreaksOnly(rule) => {
                for &t in &rule.conflicts {
                    let target = definer.negate(t.into());
                    let clause = match rule.role {
                        BreakRole::Standalone => {
                            clause_with_unless(vec![definer.negate(rule.source.into()), target], rule.unless)
                        }
                        BreakRole::Part => {
                            let mut clause = clause_with_unless(vec![target], rule.unless);
                            clause.push(rule.source.into());
                            clause
                        }
                    };
                    definer.at_least_one_of(&clause)?;
                }
                Ok(())
            }
            Rule::BreaksAll(rule) => {
                if rule.parts.is_empty() {
                    return Ok(());
                }
                let parts: Vec<LoadOption> = rule.parts.iter().map(|&p| definer.negate(p.into())).collect();
                let clause = match rule.role {
                    BreakRole::Standalone => {
                        let mut clause = vec![definer.negate(rule.source.into())];
                        clause.extend(parts);
                        clause_with_unless(clause, rule.unless)
                    }
                    BreakRole::Part => {
                        let mut clause = clause_with_unless(parts, rule.unless);
                        clause.push(rule.source.into());
                        clause
                    }
                };
                definer.at_least_one_of(&clause)
            }
        }
    }

    /// Generic description used when no specific renderer applies
    pub fn fallback_error_description(&self, table: &OptionTable) -> String {
        let list = |options: &[OptionId]| {
            options
                .iter()
                .map(|&o| table.describe(o))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut description = match self {
            Rule::Mandatory(rule) => format!("{} is mandatory", table.describe(rule.option)),
            Rule::OptionalSet(rule) => format!(
                "Only one candidate of {} can be loaded: {}",
                rule.mod_id,
                list(&rule.options)
            ),
            Rule::OverriddenSet(rule) => format!(
                "{} is mandatory, so no other candidate of {} can be loaded",
                table.describe(rule.mandatory),
                rule.mod_id
            ),
            Rule::DependsOnly(rule) => {
                format!("{} requires {}", table.describe(rule.source), rule.link)
            }
            Rule::DependsAny(rule) => format!(
                "{} requires one of {} alternatives",
                table.describe(rule.source),
                rule.alternatives.len()
            ),
            Rule::BreaksOnly(rule) => {
                format!("{} breaks {}", table.describe(rule.source), rule.link)
            }
            Rule::BreaksAll(rule) => format!(
                "{} breaks a combination of {} mods",
                table.describe(rule.source),
                rule.parts.len()
            ),
        };

        if let Some(unless) = self.unless() {
            description.push_str(&format!(" (unless {})", table.describe(unless)));
        }
        description
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |options: &[OptionId]| {
            options
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        write!(f, "({}) ", self.rule_type().as_str())?;
        match self {
            Rule::Mandatory(rule) => write!(f, "{}", rule.option)?,
            Rule::OptionalSet(rule) => write!(f, "{} [{}]", rule.mod_id, ids(&rule.options))?,
            Rule::OverriddenSet(rule) => {
                write!(f, "{} by {} [{}]", rule.mod_id, rule.mandatory, ids(&rule.options))?
            }
            Rule::DependsOnly(rule) => write!(
                f,
                "{} -> {} [{}]",
                rule.source,
                rule.link,
                ids(&rule.valid)
            )?,
            Rule::DependsAny(rule) => {
                write!(f, "{} -> any [{}]", rule.source, ids(&rule.alternatives))?
            }
            Rule::BreaksOnly(rule) => write!(
                f,
                "{} x {} [{}]",
                rule.source,
                rule.link,
                ids(&rule.conflicts)
            )?,
            Rule::BreaksAll(rule) => write!(f, "{} x all [{}]", rule.source, ids(&rule.parts))?,
        }
        if let Some(unless) = self.unless() {
            write!(f, " unless {}", unless)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::definer::Cardinality;
    use crate::solver::option::{AliasOption, BranchOption, CandidateOption, OptionKind};
    use crate::version::Version;

    fn add_candidate(table: &mut OptionTable, mod_id: &str, version: &str) -> OptionId {
        table.add(
            OptionKind::Candidate(CandidateOption {
                mod_id: mod_id.to_string(),
                key: format!("{}-{}", mod_id, version),
                version: Version::parse(version).unwrap(),
                mandatory: false,
            }),
            0,
        )
    }

    fn define(rule: &Rule, table: &OptionTable) -> Vec<Cardinality> {
        let mut definer = RuleDefiner::new(table, RuleId::new(0));
        rule.define(&mut definer).unwrap();
        definer.into_constraints()
    }

    #[test]
    fn test_depends_only_filters_by_version() {
        let mut table = OptionTable::new();
        let app = add_candidate(&mut table, "app", "1.0");
        let lib1 = add_candidate(&mut table, "lib", "1.0");
        let lib2 = add_candidate(&mut table, "lib", "2.0");
        let other = add_candidate(&mut table, "other", "2.0");

        let link = ModLink::new("lib", VersionConstraint::parse(">=2").unwrap());
        let mut rule = Rule::depends_only(app, link, None);
        for id in [app, lib1, lib2, other] {
            rule.on_option_added(id, &table);
        }

        let Rule::DependsOnly(inner) = &rule else {
            unreachable!()
        };
        assert_eq!(inner.valid, vec![lib2]);
        assert_eq!(inner.invalid, vec![lib1]);

        let constraints = define(&rule, &table);
        assert_eq!(constraints.len(), 1);
        assert_eq!(
            constraints[0].options,
            vec![LoadOption::new(app).negate(), LoadOption::new(lib2)]
        );
        assert_eq!(constraints[0].min, 1);
    }

    #[test]
    fn test_optional_depends_forbids_invalid() {
        let mut table = OptionTable::new();
        let app = add_candidate(&mut table, "app", "1.0");
        let lib1 = add_candidate(&mut table, "lib", "1.0");
        let lib2 = add_candidate(&mut table, "lib", "2.0");

        let link = ModLink::new("lib", VersionConstraint::parse(">=2").unwrap()).optional(true);
        let mut rule = Rule::depends_only(app, link, None);
        rule.on_option_added(lib1, &table);
        rule.on_option_added(lib2, &table);

        let constraints = define(&rule, &table);
        assert_eq!(constraints.len(), 1);
        assert_eq!(
            constraints[0].options,
            vec![LoadOption::new(app).negate(), LoadOption::new(lib1).negate()]
        );
    }

    #[test]
    fn test_optional_set_needs_two_options() {
        let mut table = OptionTable::new();
        let a1 = add_candidate(&mut table, "a", "1.0");
        let a2 = add_candidate(&mut table, "a", "2.0");

        let mut rule = Rule::optional_set("a");
        assert!(rule.on_option_added(a1, &table));
        assert!(define(&rule, &table).is_empty());

        assert!(rule.on_option_added(a2, &table));
        assert!(!rule.on_option_added(a2, &table));
        let constraints = define(&rule, &table);
        assert_eq!(constraints[0].max, 1);

        assert!(rule.on_option_removed(a1));
        assert!(!rule.on_option_removed(a1));
    }

    #[test]
    fn test_overridden_set_skips_mandatory() {
        let mut table = OptionTable::new();
        let a1 = add_candidate(&mut table, "a", "1.0");
        let a2 = add_candidate(&mut table, "a", "2.0");

        let mut rule = Rule::overridden_set("a", a1);
        assert!(!rule.on_option_added(a1, &table));
        assert!(rule.on_option_added(a2, &table));

        let constraints = define(&rule, &table);
        assert_eq!(constraints[0].options, vec![LoadOption::new(a2)]);
        assert_eq!(constraints[0].max, 0);
    }

    #[test]
    fn test_overridden_set_skips_aliases_of_mandatory() {
        let mut table = OptionTable::new();
        let a1 = add_candidate(&mut table, "a", "1.0");
        let b1 = add_candidate(&mut table, "b", "1.0");
        let own = table.add(
            OptionKind::Alias(AliasOption {
                target: a1,
                mod_id: "a".to_string(),
                version: Version::parse("1.0").unwrap(),
            }),
            0,
        );
        let foreign = table.add(
            OptionKind::Alias(AliasOption {
                target: b1,
                mod_id: "a".to_string(),
                version: Version::parse("1.0").unwrap(),
            }),
            0,
        );

        let mut rule = Rule::overridden_set("a", a1);
        assert!(!rule.on_option_added(own, &table));
        assert!(rule.on_option_added(foreign, &table));

        let Rule::OverriddenSet(inner) = &rule else {
            unreachable!()
        };
        assert_eq!(inner.options, vec![foreign]);
    }

    #[test]
    fn test_breaks_roles() {
        let mut table = OptionTable::new();
        let app = add_candidate(&mut table, "app", "1.0");
        let bad = add_candidate(&mut table, "bad", "1.0");
        let branch = table.add(
            OptionKind::Branch(BranchOption {
                label: "part".to_string(),
            }),
            0,
        );

        let mut standalone =
            Rule::breaks_only(app, ModLink::new("bad", VersionConstraint::any()), None, BreakRole::Standalone);
        standalone.on_option_added(bad, &table);
        assert_eq!(
            define(&standalone, &table)[0].options,
            vec![LoadOption::new(app).negate(), LoadOption::new(bad).negate()]
        );

        let mut part =
            Rule::breaks_only(branch, ModLink::new("bad", VersionConstraint::any()), None, BreakRole::Part);
        part.on_option_added(bad, &table);
        assert_eq!(
            define(&part, &table)[0].options,
            vec![LoadOption::new(bad).negate(), LoadOption::new(branch)]
        );
    }

    #[test]
    fn test_display() {
        let mut table = OptionTable::new();
        let app = add_candidate(&mut table, "app", "1.0");
        let rule = Rule::depends_only(app, ModLink::new("lib", VersionConstraint::parse("^1.0").unwrap()), None);

        assert_eq!(rule.to_string(), "(depends-only) o0 -> lib ^1.0 []");
        assert_eq!(rule.fallback_error_description(&table), "app 1.0 requires lib ^1.0");
    }
}
