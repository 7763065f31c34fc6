//! Human-readable rendering of outcomes and reports

use colored::Colorize;
use modsolve::{Resolution, ResolutionError, SolveOutcome};

use crate::check::RequestReport;

pub fn print_outcome(outcome: &SolveOutcome) {
    match outcome {
        SolveOutcome::Solved(resolution) => print_resolution(resolution),
        SolveOutcome::Infeasible(errors) => print_errors(errors),
    }
}

fn print_resolution(resolution: &Resolution) {
    println!(
        "{}",
        format!("Resolved {} mod(s)", resolution.selected.len()).green().bold()
    );
    for (id, key) in &resolution.selected {
        println!("  {} {}", id.bold(), key);
    }

    if !resolution.provided.is_empty() {
        println!();
        println!("{}", "Provided".bold());
        for (id, key) in &resolution.provided {
            println!("  {} {} {}", id.bold(), "by".dimmed(), key);
        }
    }

    let rejected: usize = resolution.rejected.values().map(Vec::len).sum();
    if rejected > 0 {
        println!();
        println!("{}", format!("{} candidate(s) not loaded", rejected).dimmed());
    }
}

fn print_errors(errors: &[ResolutionError]) {
    eprintln!("{}", "No valid set of mods could be found.".red().bold());
    for (i, error) in errors.iter().enumerate() {
        eprintln!();
        eprintln!("{}", format!("Problem {}:", i + 1).bold());
        eprintln!("{}", error.message);
        for rule in &error.rules {
            eprintln!("  - {}", rule);
        }
    }
}

pub fn print_report(report: &RequestReport, strict: bool) {
    println!("{}: {}", "Mod ids".bold(), report.pools);
    println!("{}: {}", "Candidates".bold(), report.candidates);
    println!("{}: {}", "Mandatory".bold(), report.mandatory);
    println!("{}: {}", "Dependencies".bold(), report.dependencies);
    println!("{}: {}", "Breakages".bold(), report.breakages);
    println!("{}: {}", "Provided ids".bold(), report.provided.len());

    if !report.unknown_ids.is_empty() {
        let ids: Vec<&str> = report.unknown_ids.iter().map(String::as_str).collect();
        let line = format!("Links to unknown mod ids: {}", ids.join(", "));
        if strict {
            eprintln!("{}", line.red());
        } else {
            eprintln!("{}", line.yellow());
        }
    }

    for error in &report.errors {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    if report.is_valid(strict) {
        println!("{}", "Request is valid.".green().bold());
    }
}
