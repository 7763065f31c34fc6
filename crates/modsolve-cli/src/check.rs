use anyhow::Result;
use clap::Args;
use indexmap::{IndexMap, IndexSet};
use modsolve::{BreaksOn, DependsOn, Request};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::output;
use crate::resolve::load_request;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Request file (JSON) describing the candidate pools
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,

    /// Treat links to unknown mod ids as errors
    #[arg(long)]
    pub strict: bool,
}

/// Statistics and problems found in a request without solving it
#[derive(Debug, Default)]
pub struct RequestReport {
    pub pools: usize,
    pub candidates: usize,
    pub mandatory: usize,
    pub dependencies: usize,
    pub breakages: usize,
    /// Provided id and the keys of the candidates providing it
    pub provided: IndexMap<String, Vec<String>>,
    /// Ids referenced by links that no candidate defines or provides
    pub unknown_ids: IndexSet<String>,
    /// Problems that make the request unusable
    pub errors: Vec<String>,
}

impl RequestReport {
    pub fn analyze(request: &Request) -> Self {
        let mut report = RequestReport {
            pools: request.pools.len(),
            candidates: request.len(),
            ..Default::default()
        };

        let mut keys: HashSet<&str> = HashSet::new();
        let mut referenced: IndexSet<&str> = IndexSet::new();

        for (id, pool) in &request.pools {
            let mandatory: Vec<&str> = pool
                .iter()
                .filter(|c| c.mandatory)
                .map(|c| c.key.as_str())
                .collect();
            if mandatory.len() > 1 {
                report.errors.push(format!(
                    "Mod id '{}' is mandatory more than once: {}",
                    id,
                    mandatory.join(", ")
                ));
            }
            report.mandatory += mandatory.len();

            for candidate in pool {
                if !keys.insert(candidate.key.as_str()) {
                    report
                        .errors
                        .push(format!("Candidate key '{}' is used more than once", candidate.key));
                }
                for depends in &candidate.depends {
                    report.dependencies += count_depends(depends, &mut referenced);
                }
                for breaks in &candidate.breaks {
                    report.breakages += count_breaks(breaks, &mut referenced);
                }
                for provided in &candidate.provides {
                    report
                        .provided
                        .entry(provided.id.clone())
                        .or_default()
                        .push(candidate.key.clone());
                }
            }
        }

        report.unknown_ids = referenced
            .into_iter()
            .filter(|id| !request.pools.contains_key(*id) && !report.provided.contains_key(*id))
            .map(str::to_string)
            .collect();

        report
    }

    pub fn is_valid(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.unknown_ids.is_empty())
    }
}

/// Count single-id links, collecting the ids they reference
fn count_depends<'a>(depends: &'a DependsOn, referenced: &mut IndexSet<&'a str>) -> usize {
    match depends {
        DependsOn::Only(target) => {
            referenced.insert(target.id.as_str());
            1 + target.unless.as_deref().map_or(0, |u| count_depends(u, referenced))
        }
        DependsOn::Any { any, unless } => {
            any.iter().map(|d| count_depends(d, referenced)).sum::<usize>()
                + unless.as_deref().map_or(0, |u| count_depends(u, referenced))
        }
    }
}

fn count_breaks<'a>(breaks: &'a BreaksOn, referenced: &mut IndexSet<&'a str>) -> usize {
    match breaks {
        BreaksOn::Only(target) => {
            referenced.insert(target.id.as_str());
            1 + target.unless.as_deref().map_or(0, |u| count_depends(u, referenced))
        }
        BreaksOn::All { all, unless } => {
            all.iter().map(|b| count_breaks(b, referenced)).sum::<usize>()
                + unless.as_deref().map_or(0, |u| count_depends(u, referenced))
        }
    }
}

pub fn execute(args: CheckArgs) -> Result<i32> {
    let request = load_request(&args.request)?;
    let report = RequestReport::analyze(&request);
    output::print_report(&report, args.strict);

    Ok(if report.is_valid(args.strict) { 0 } else { 1 })
}
