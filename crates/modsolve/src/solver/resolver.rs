use std::collections::{HashMap, HashSet};
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::candidate::{BreaksOn, Candidate, DependsOn, LinkTarget, Request};
use crate::config::ResolverConfig;
use crate::error::{DefinitionError, Result, SolverError};

use super::context::RuleContext;
use super::option::{AliasOption, BranchOption, CandidateOption, OptionId, OptionKind};
use super::problem::{self, ResolutionError};
use super::rule::{BreakRole, ModLink, Rule, RuleId};
use super::sat::CancelHandle;

/// Result of a successful resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Chosen candidate key per mod id
    pub selected: IndexMap<String, String>,
    /// Key of the candidate providing each provided id
    pub provided: IndexMap<String, String>,
    /// Candidates that were not chosen, per mod id
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub rejected: IndexMap<String, Vec<String>>,
}

/// Either a resolution or the reasons none exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveOutcome {
    Solved(Resolution),
    Infeasible(Vec<ResolutionError>),
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved(_))
    }
}

/// Resolves candidate pools into one candidate per mod id.
///
/// Each candidate becomes an option weighted by its preference; ids,
/// dependencies and breakages become rules. The cheapest assignment
/// satisfying every rule is the resolution.
#[derive(Debug, Clone, Default)]
pub struct ModSolver {
    config: ResolverConfig,
    cancel: CancelHandle,
}

impl ModSolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Handle that cancels resolutions run by this solver
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn resolve(&self, request: &Request) -> Result<SolveOutcome> {
        let started = Instant::now();
        info!(
            "Resolving {} candidate(s) for {} mod id(s)",
            request.len(),
            request.pools.len()
        );

        let mut context = RuleContext::with_cancel_handle(&self.config, self.cancel.clone());
        let candidates = self.add_candidates(&mut context, request)?;
        add_definition_rules(&mut context, request, &candidates)?;
        for registered in &candidates {
            for depends in &registered.candidate.depends {
                add_depends(&mut context, registered.option, depends, None)?;
            }
            for breaks in &registered.candidate.breaks {
                add_breaks(&mut context, registered.option, breaks, BreakRole::Standalone, None)?;
            }
        }

        let stats = context.rules().stats();
        debug!(
            "Generated {} rules ({} depends, {} breaks, {} sub-rules) over {} options",
            stats.total,
            stats.depends,
            stats.breaks,
            stats.sub_rules,
            context.options().len()
        );

        if !context.has_solution()? {
            let errors = problem::decompose(&mut context, self.config.max_reported_errors)?;
            info!(
                "No resolution: {} error(s) ({:.2?})",
                errors.len(),
                started.elapsed()
            );
            return Ok(SolveOutcome::Infeasible(errors));
        }

        let loaded = context.get_solution()?;
        let resolution = partition(&context, &candidates, &loaded)?;
        info!(
            "Resolved {} mod(s), {} provided ({:.2?})",
            resolution.selected.len(),
            resolution.provided.len(),
            started.elapsed()
        );
        Ok(SolveOutcome::Solved(resolution))
    }

    /// Register one option per candidate, best candidates of a pool first
    fn add_candidates<'r>(
        &self,
        context: &mut RuleContext,
        request: &'r Request,
    ) -> Result<Vec<Registered<'r>>> {
        let mut registered = Vec::with_capacity(request.len());
        let mut keys: HashSet<&str> = HashSet::new();

        for (mod_id, pool) in &request.pools {
            let mut sorted: Vec<&Candidate> = pool.iter().collect();
            sorted.sort_by(|a, b| b.version.cmp(&a.version).then_with(|| a.key.cmp(&b.key)));

            let mut mandatory: Option<&Candidate> = None;
            for (position, candidate) in sorted.into_iter().enumerate() {
                if !keys.insert(candidate.key.as_str()) {
                    return Err(DefinitionError::DuplicateCandidate {
                        key: candidate.key.clone(),
                    }
                    .into());
                }
                if candidate.mandatory {
                    if let Some(first) = mandatory {
                        return Err(DefinitionError::DuplicateMandatory {
                            id: mod_id.clone(),
                            first: first.key.clone(),
                            second: candidate.key.clone(),
                        }
                        .into());
                    }
                    mandatory = Some(candidate);
                }

                let weight = if candidate.mandatory {
                    0
                } else {
                    candidate
                        .weight
                        .saturating_add(position as i64)
                        .saturating_sub(self.config.inclusion_bias)
                };
                let option = context.add_option(
                    OptionKind::Candidate(CandidateOption {
                        mod_id: mod_id.clone(),
                        key: candidate.key.clone(),
                        version: candidate.version.clone(),
                        mandatory: candidate.mandatory,
                    }),
                    weight,
                )?;
                registered.push(Registered {
                    mod_id,
                    candidate,
                    option,
                });
            }
        }

        for entry in &registered {
            let mut provided_ids: HashSet<&str> = HashSet::new();
            for provided in &entry.candidate.provides {
                // A candidate already stands for its own id, and one alias per id is enough
                if provided.id == entry.mod_id || !provided_ids.insert(provided.id.as_str()) {
                    debug!(
                        "Ignoring redundant provided id {} of {}",
                        provided.id, entry.candidate.key
                    );
                    continue;
                }
                context.add_option(
                    OptionKind::Alias(AliasOption {
                        target: entry.option,
                        mod_id: provided.id.clone(),
                        version: provided
                            .version
                            .clone()
                            .unwrap_or_else(|| entry.candidate.version.clone()),
                    }),
                    0,
                )?;
            }
        }

        Ok(registered)
    }
}

/// A candidate and the option standing for it
struct Registered<'r> {
    mod_id: &'r str,
    candidate: &'r Candidate,
    option: OptionId,
}

/// One set rule per mod id: pools, provided ids and ids only named by links
fn add_definition_rules(
    context: &mut RuleContext,
    request: &Request,
    candidates: &[Registered<'_>],
) -> Result<()> {
    let mut ids: IndexSet<&str> = request.pools.keys().map(String::as_str).collect();
    for registered in candidates {
        let candidate = registered.candidate;
        ids.extend(candidate.provides.iter().map(|p| p.id.as_str()));
        for depends in &candidate.depends {
            collect_depends_ids(depends, &mut ids);
        }
        for breaks in &candidate.breaks {
            collect_breaks_ids(breaks, &mut ids);
        }
    }

    let mandatory: HashMap<&str, OptionId> = candidates
        .iter()
        .filter(|r| r.candidate.mandatory)
        .map(|r| (r.mod_id, r.option))
        .collect();

    for id in ids {
        match mandatory.get(id) {
            Some(&option) => {
                context.add_rule(Rule::mandatory(option), None)?;
                context.add_rule(Rule::overridden_set(id, option), None)?;
            }
            None => {
                context.add_rule(Rule::optional_set(id), None)?;
            }
        }
    }
    Ok(())
}

fn collect_depends_ids<'a>(depends: &'a DependsOn, ids: &mut IndexSet<&'a str>) {
    match depends {
        DependsOn::Only(target) => collect_target_ids(target, ids),
        DependsOn::Any { any, unless } => {
            for alternative in any {
                collect_depends_ids(alternative, ids);
            }
            if let Some(unless) = unless {
                collect_depends_ids(unless, ids);
            }
        }
    }
}

fn collect_breaks_ids<'a>(breaks: &'a BreaksOn, ids: &mut IndexSet<&'a str>) {
    match breaks {
        BreaksOn::Only(target) => collect_target_ids(target, ids),
        BreaksOn::All { all, unless } => {
            for part in all {
                collect_breaks_ids(part, ids);
            }
            if let Some(unless) = unless {
                collect_depends_ids(unless, ids);
            }
        }
    }
}

fn collect_target_ids<'a>(target: &'a LinkTarget, ids: &mut IndexSet<&'a str>) {
    ids.insert(target.id.as_str());
    if let Some(unless) = &target.unless {
        collect_depends_ids(unless, ids);
    }
}

fn add_branch(context: &mut RuleContext, source: OptionId, label: &str) -> Result<OptionId> {
    let label = format!("{} ({})", context.options().describe(source), label);
    context.add_option(OptionKind::Branch(BranchOption { label }), 0)
}

fn add_unless<'d>(
    context: &mut RuleContext,
    source: OptionId,
    unless: Option<&'d DependsOn>,
) -> Result<Option<(OptionId, &'d DependsOn)>> {
    match unless {
        Some(unless) => Ok(Some((add_branch(context, source, "exception")?, unless))),
        None => Ok(None),
    }
}

/// Build the rule tree of a dependency. Composite dependencies get a branch
/// option per alternative, each one the source of a sub-rule.
fn add_depends(
    context: &mut RuleContext,
    source: OptionId,
    depends: &DependsOn,
    parent: Option<RuleId>,
) -> Result<RuleId> {
    match depends {
        DependsOn::Only(target) => {
            let unless = add_unless(context, source, target.unless.as_deref())?;
            let link = ModLink::new(target.id.clone(), target.versions.clone()).optional(target.optional);
            let id = context.add_rule(Rule::depends_only(source, link, unless.map(|u| u.0)), parent)?;
            if let Some((branch, unless)) = unless {
                add_depends(context, branch, unless, Some(id))?;
            }
            Ok(id)
        }
        DependsOn::Any { any, unless } => {
            let alternatives = any
                .iter()
                .enumerate()
                .map(|(i, _)| add_branch(context, source, &format!("alternative {}", i + 1)))
                .collect::<Result<Vec<_>>>()?;
            let unless = add_unless(context, source, unless.as_deref())?;

            let id = context.add_rule(
                Rule::depends_any(source, alternatives.clone(), unless.map(|u| u.0)),
                parent,
            )?;
            for (&branch, alternative) in alternatives.iter().zip(any) {
                add_depends(context, branch, alternative, Some(id))?;
            }
            if let Some((branch, unless)) = unless {
                add_depends(context, branch, unless, Some(id))?;
            }
            Ok(id)
        }
    }
}

/// Build the rule tree of a breakage. Parts of a combination are sub-rules
/// in [`BreakRole::Part`] whose branch option is true while the part is present.
fn add_breaks(
    context: &mut RuleContext,
    source: OptionId,
    breaks: &BreaksOn,
    role: BreakRole,
    parent: Option<RuleId>,
) -> Result<RuleId> {
    match breaks {
        BreaksOn::Only(target) => {
            let unless = add_unless(context, source, target.unless.as_deref())?;
            let link = ModLink::new(target.id.clone(), target.versions.clone());
            let id = context.add_rule(Rule::breaks_only(source, link, unless.map(|u| u.0), role), parent)?;
            if let Some((branch, unless)) = unless {
                add_depends(context, branch, unless, Some(id))?;
            }
            Ok(id)
        }
        BreaksOn::All { all, unless } => {
            let parts = all
                .iter()
                .enumerate()
                .map(|(i, _)| add_branch(context, source, &format!("part {}", i + 1)))
                .collect::<Result<Vec<_>>>()?;
            let unless = add_unless(context, source, unless.as_deref())?;

            let id = context.add_rule(Rule::breaks_all(source, parts.clone(), unless.map(|u| u.0), role), parent)?;
            for (&branch, part) in parts.iter().zip(all) {
                add_breaks(context, branch, part, BreakRole::Part, Some(id))?;
            }
            if let Some((branch, unless)) = unless {
                add_depends(context, branch, unless, Some(id))?;
            }
            Ok(id)
        }
    }
}

/// Split the loaded options into selected and provided ids
fn partition(
    context: &RuleContext,
    candidates: &[Registered<'_>],
    loaded: &[OptionId],
) -> Result<Resolution> {
    let options = context.options();
    let mut resolution = Resolution::default();
    let mut claimed: HashSet<String> = HashSet::new();

    for &id in loaded {
        let (mod_id, key) = match options.get(id) {
            Some(OptionKind::Candidate(candidate)) => (candidate.mod_id.clone(), candidate.key.clone()),
            Some(OptionKind::Alias(alias)) => match options.get(options.root(id)) {
                Some(OptionKind::Candidate(provider)) => (alias.mod_id.clone(), provider.key.clone()),
                _ => {
                    return Err(SolverError::Internal(format!(
                        "provided id {} has no candidate behind it",
                        alias.mod_id
                    )))
                }
            },
            _ => continue,
        };

        if !claimed.insert(mod_id.clone()) {
            return Err(SolverError::Internal(format!(
                "mod id {} is claimed twice in the solution",
                mod_id
            )));
        }
        if options.get(id).is_some_and(OptionKind::is_alias) {
            resolution.provided.insert(mod_id, key);
        } else {
            resolution.selected.insert(mod_id, key);
        }
    }

    let loaded: HashSet<OptionId> = loaded.iter().copied().collect();
    for registered in candidates {
        if !loaded.contains(&registered.option) {
            resolution
                .rejected
                .entry(registered.mod_id.to_string())
                .or_default()
                .push(registered.candidate.key.clone());
        }
    }

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Provided;
    use crate::version::{Version, VersionConstraint};

    fn v(version: &str) -> Version {
        Version::parse(version).unwrap()
    }

    #[test]
    fn test_highest_version_wins() {
        let mut request = Request::new();
        request
            .add("lib", Candidate::new("lib-1.0.jar", v("1.0")))
            .add("lib", Candidate::new("lib-1.2.jar", v("1.2")))
            .add("lib", Candidate::new("lib-1.1.jar", v("1.1")));

        let outcome = ModSolver::default().resolve(&request).unwrap();
        let SolveOutcome::Solved(resolution) = outcome else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.selected["lib"], "lib-1.2.jar");
        assert_eq!(resolution.rejected["lib"], vec!["lib-1.1.jar", "lib-1.0.jar"]);
    }

    #[test]
    fn test_duplicate_mandatory() {
        let mut request = Request::new();
        request
            .add("a", Candidate::new("a-1.jar", v("1")).mandatory())
            .add("a", Candidate::new("a-2.jar", v("2")).mandatory());

        let err = ModSolver::default().resolve(&request).unwrap_err();
        assert_eq!(
            err,
            SolverError::Definition(DefinitionError::DuplicateMandatory {
                id: "a".to_string(),
                first: "a-2.jar".to_string(),
                second: "a-1.jar".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_key() {
        let mut request = Request::new();
        request
            .add("a", Candidate::new("same.jar", v("1")))
            .add("b", Candidate::new("same.jar", v("1")));

        let err = ModSolver::default().resolve(&request).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Definition(DefinitionError::DuplicateCandidate { .. })
        ));
    }

    #[test]
    fn test_mandatory_overrides_other_candidates() {
        let mut request = Request::new();
        request
            .add("a", Candidate::new("a-2.jar", v("2")))
            .add("a", Candidate::new("a-1.jar", v("1")).mandatory())
            .add(
                "b",
                Candidate::new("b.jar", v("1")).depends(DependsOn::on_versions(
                    "a",
                    VersionConstraint::parse(">=2").unwrap(),
                )),
            );

        let SolveOutcome::Solved(resolution) = ModSolver::default().resolve(&request).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.selected["a"], "a-1.jar");
        // b cannot have its dependency and is left out
        assert!(!resolution.selected.contains_key("b"));
        assert_eq!(resolution.rejected["b"], vec!["b.jar"]);
    }

    #[test]
    fn test_depends_any_picks_an_alternative() {
        let mut request = Request::new();
        request
            .add(
                "app",
                Candidate::new("app.jar", v("1")).mandatory().depends(DependsOn::any(vec![
                    DependsOn::on("fabric-api"),
                    DependsOn::on("qsl"),
                ])),
            )
            .add("qsl", Candidate::new("qsl.jar", v("4")));

        let SolveOutcome::Solved(resolution) = ModSolver::default().resolve(&request).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.selected["qsl"], "qsl.jar");
        assert!(!resolution.selected.contains_key("fabric-api"));
    }

    #[test]
    fn test_breaks_all_needs_every_part() {
        let mut request = Request::new();
        request
            .add(
                "a",
                Candidate::new("a.jar", v("1"))
                    .mandatory()
                    .breaks(BreaksOn::all(vec![BreaksOn::on("b"), BreaksOn::on("c")])),
            )
            .add("b", Candidate::new("b.jar", v("1")).mandatory())
            .add("c", Candidate::new("c.jar", v("1")));

        let SolveOutcome::Solved(resolution) = ModSolver::default().resolve(&request).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.selected["b"], "b.jar");
        assert!(!resolution.selected.contains_key("c"));
    }

    #[test]
    fn test_repeated_provided_id() {
        let mut request = Request::new();
        request
            .add(
                "a",
                Candidate::new("a.jar", v("1"))
                    .mandatory()
                    .provides(Provided::new("x"))
                    .provides(Provided::new("x").version(v("2"))),
            )
            .add("b", Candidate::new("b.jar", v("1")).mandatory().depends(DependsOn::on("x")));

        let SolveOutcome::Solved(resolution) = ModSolver::default().resolve(&request).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.provided["x"], "a.jar");
        assert_eq!(resolution.provided.len(), 1);
    }

    #[test]
    fn test_providing_own_id_is_ignored() {
        let mut request = Request::new();
        request
            .add("a", Candidate::new("a.jar", v("1")).mandatory().provides(Provided::new("a")))
            .add("b", Candidate::new("b-2.jar", v("2")).provides(Provided::new("b")))
            .add("b", Candidate::new("b-1.jar", v("1")));

        let SolveOutcome::Solved(resolution) = ModSolver::default().resolve(&request).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.selected["a"], "a.jar");
        assert_eq!(resolution.selected["b"], "b-2.jar");
        assert!(resolution.provided.is_empty());
    }

    #[test]
    fn test_extreme_weights() {
        let mut request = Request::new();
        request
            .add("a", Candidate::new("a-2.jar", v("2")).weight(i64::MAX))
            .add("a", Candidate::new("a-1.jar", v("1")).weight(i64::MIN))
            .add("b", Candidate::new("b.jar", v("1")).weight(i64::MAX));

        let SolveOutcome::Solved(resolution) = ModSolver::default().resolve(&request).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(resolution.selected["a"], "a-1.jar");
        // Loading b costs more than leaving it out
        assert!(!resolution.selected.contains_key("b"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut request = Request::new();
        request.add("a", Candidate::new("a.jar", v("1")));

        let solver = ModSolver::default();
        solver.cancel_handle().hard_cancel();
        assert_eq!(solver.resolve(&request), Err(SolverError::Cancelled));
    }
}
