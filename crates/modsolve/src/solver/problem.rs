use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::context::RuleContext;
use super::option::{OptionId, OptionTable};
use super::rule::{BreakRole, Rule, RuleId, RuleType};
use super::rule_set::RuleSet;

/// One independent reason why a resolution has no solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionError {
    /// Mod ids the explanation starts from: the mandatory mods of the
    /// conflict, or the mods declaring the offending links
    pub root_cause_ids: Vec<String>,
    /// Human-readable explanation
    pub message: String,
    /// One line per contributing rule
    pub rules: Vec<String>,
}

impl ResolutionError {
    /// Generate a human-readable description of this error
    pub fn describe(&self) -> String {
        let lines: Vec<String> = self.rules.iter().map(|r| format!("  - {}", r)).collect();
        if lines.is_empty() {
            self.message.clone()
        } else {
            format!("{}\n{}", self.message, lines.join("\n"))
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Describe a list of errors, numbered
pub fn describe_all(errors: &[ResolutionError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Problem {}:\n{}", i + 1, e.describe()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Explain an infeasible context.
///
/// Repeatedly extracts an unsatisfiable core, reports it and removes one of
/// its non-mandatory rules until the rest is solvable or nothing can be
/// removed. Every iteration removes a rule, so the loop is bounded by the
/// number of rules; no rule is reported as a cause twice.
pub fn decompose(context: &mut RuleContext, max_errors: Option<usize>) -> Result<Vec<ResolutionError>> {
    let mut errors = Vec::new();
    let mut reported: HashSet<RuleId> = HashSet::new();
    let limit = context.rules().len() + 1;

    for iteration in 0..limit {
        if context.has_solution()? {
            debug!("Decomposition finished after {} iteration(s)", iteration);
            break;
        }
        let core = context.get_error()?;

        let mut top_level: Vec<RuleId> = core.iter().map(|&r| context.rules().top_level(r)).collect();
        top_level.sort();
        top_level.dedup();

        let (roots, causes): (Vec<RuleId>, Vec<RuleId>) = top_level.into_iter().partition(|&r| {
            context
                .rules()
                .get(r)
                .is_some_and(|rule| rule.rule_type() == RuleType::Mandatory)
        });
        debug!(
            "Core {}: {} root(s), {} cause(s)",
            iteration,
            roots.len(),
            causes.len()
        );

        let fresh: Vec<RuleId> = causes.iter().copied().filter(|r| !reported.contains(r)).collect();
        if !fresh.is_empty() || causes.is_empty() {
            errors.push(render(context.rules(), context.options(), &roots, &fresh));
        }
        reported.extend(fresh);

        if max_errors.is_some_and(|max| errors.len() >= max) {
            debug!("Stopping decomposition at {} error(s)", errors.len());
            break;
        }

        let Some(victim) = pick_removal(context.rules(), &causes) else {
            debug!("No rule left to remove, stopping decomposition");
            break;
        };
        context.remove_rule(victim)?;
    }

    Ok(errors)
}

/// Rule to drop next: unsatisfiable dependencies first, since they
/// tend to cause follow-on conflicts, then other links, then id sets
fn pick_removal(rules: &RuleSet, causes: &[RuleId]) -> Option<RuleId> {
    causes
        .iter()
        .filter_map(|&id| {
            let rank = match rules.get(id)? {
                Rule::DependsOnly(rule) if rule.valid.is_empty() => 0,
                Rule::DependsAny(_) if !has_available_alternative(rules, id) => 0,
                rule if rule.rule_type().is_link() => 1,
                Rule::OptionalSet(_) | Rule::OverriddenSet(_) => 2,
                Rule::Mandatory(_) => return None,
                _ => 3,
            };
            Some((rank, id))
        })
        .min()
        .map(|(_, id)| id)
}

fn has_available_alternative(rules: &RuleSet, id: RuleId) -> bool {
    rules.children(id).iter().any(|&child| match rules.get(child) {
        Some(Rule::DependsOnly(rule)) => !rule.valid.is_empty(),
        Some(Rule::DependsAny(_)) => has_available_alternative(rules, child),
        _ => false,
    })
}

fn render(rules: &RuleSet, options: &OptionTable, roots: &[RuleId], causes: &[RuleId]) -> ResolutionError {
    let mut root_cause_ids: Vec<String> = Vec::new();
    let mut push_id = |id: Option<&str>| {
        if let Some(id) = id {
            if !root_cause_ids.iter().any(|r| r == id) {
                root_cause_ids.push(id.to_string());
            }
        }
    };

    let mut mandatory = Vec::new();
    for &root in roots {
        if let Some(Rule::Mandatory(rule)) = rules.get(root) {
            push_id(options.mod_id(rule.option));
            mandatory.push(options.describe(rule.option));
        }
    }
    if mandatory.is_empty() {
        for &cause in causes {
            match rules.get(cause) {
                Some(Rule::OptionalSet(rule)) => push_id(Some(&rule.mod_id)),
                Some(Rule::OverriddenSet(rule)) => push_id(Some(&rule.mod_id)),
                Some(rule) => push_id(rule.source().and_then(|s| options.mod_id(s))),
                None => {}
            }
        }
    }

    let lines: Vec<String> = causes
        .iter()
        .filter_map(|&cause| Some(describe_rule(rules, options, cause, rules.get(cause)?)))
        .collect();

    let message = match (mandatory.is_empty(), lines.is_empty()) {
        (false, false) => format!("Cannot load the mandatory mods {}:", mandatory.join(", ")),
        (false, true) => format!("The mandatory mods {} cannot be loaded together", mandatory.join(", ")),
        (true, _) => "Conflicting requirements:".to_string(),
    };

    ResolutionError {
        root_cause_ids,
        message,
        rules: lines,
    }
}

/// Specific renderer for links, the rule's generic description otherwise
fn describe_rule(rules: &RuleSet, options: &OptionTable, id: RuleId, rule: &Rule) -> String {
    let source = |s: OptionId| options.describe(s);
    let mut description = match rule {
        Rule::DependsOnly(dep) => {
            if !dep.link.optional && dep.valid.is_empty() {
                if dep.invalid.is_empty() {
                    format!("{} requires {}, which is not available", source(dep.source), dep.link)
                } else {
                    format!(
                        "{} requires {}, but only {} are available",
                        source(dep.source),
                        dep.link,
                        list(options, &dep.invalid)
                    )
                }
            } else if dep.link.optional {
                format!(
                    "{} is incompatible with {} ({}) unless {} is used",
                    source(dep.source),
                    list(options, &dep.invalid),
                    dep.link.mod_id,
                    dep.link.versions
                )
            } else {
                format!(
                    "{} requires {}, matched by {}",
                    source(dep.source),
                    dep.link,
                    list(options, &dep.valid)
                )
            }
        }
        Rule::DependsAny(dep) => format!(
            "{} requires any of {}",
            source(dep.source),
            requirement(rules, id)
        ),
        Rule::BreaksOnly(brk) if brk.role == BreakRole::Standalone => format!(
            "{} breaks {}, which matches {}",
            source(brk.source),
            brk.link,
            list(options, &brk.conflicts)
        ),
        Rule::BreaksAll(brk) if brk.role == BreakRole::Standalone => format!(
            "{} breaks the combination of {}",
            source(brk.source),
            requirement(rules, id)
        ),
        other => return other.fallback_error_description(options),
    };

    if let Some(unless) = rule.unless() {
        let exception = rules
            .children(id)
            .iter()
            .find(|&&c| rules.get(c).and_then(Rule::source) == Some(unless))
            .map(|&c| requirement(rules, c))
            .unwrap_or_else(|| options.describe(unless));
        description.push_str(&format!(", unless {} is loaded", exception));
    }
    description
}

/// Short form of what a link rule targets, following its sub-rules
fn requirement(rules: &RuleSet, id: RuleId) -> String {
    let Some(rule) = rules.get(id) else {
        return id.to_string();
    };
    let branches = |branches: &[OptionId], separator: &str| {
        let parts: Vec<String> = rules
            .children(id)
            .iter()
            .filter(|&&c| rules.get(c).and_then(Rule::source).is_some_and(|s| branches.contains(&s)))
            .map(|&c| requirement(rules, c))
            .collect();
        format!("({})", parts.join(separator))
    };

    match rule {
        Rule::DependsOnly(dep) => dep.link.to_string(),
        Rule::BreaksOnly(brk) => brk.link.to_string(),
        Rule::DependsAny(dep) => branches(&dep.alternatives, " or "),
        Rule::BreaksAll(brk) => branches(&brk.parts, " and "),
        other => other.to_string(),
    }
}

fn list(options: &OptionTable, ids: &[OptionId]) -> String {
    ids.iter()
        .map(|&o| options.describe(o))
        .collect::<Vec<_>>()
        .join(", ")
}
