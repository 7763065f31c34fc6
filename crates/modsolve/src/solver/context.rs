use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::ResolverConfig;
use crate::error::{DefinitionError, Result, SolverError};

use super::definer::{Cardinality, RuleDefiner};
use super::explain::{ExplainingSolver, Feasibility};
use super::optimize::{OptimizeError, Optimizer};
use super::option::{OptionId, OptionKind, OptionTable};
use super::rule::{Rule, RuleId};
use super::rule_set::RuleSet;
use super::sat::{CancelHandle, Combinator, TimeBudget};
use super::variables::VariableTable;

/// Where a [`RuleContext`] is in its solve protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverStep {
    /// Options and rules are being registered
    Define,
    /// The last feasibility check failed; the problem may be edited and rechecked
    Solve,
    /// Feasibility is proven and the optimizer is ready
    ReSolving,
    /// The optimizer is running
    Optimize,
    /// A solution was produced
    Done,
}

type Termination = Combinator<CancelHandle, Option<TimeBudget>>;

/// The constraint engine.
///
/// Owns every option and rule of one resolution and answers two questions:
/// whether the rules can be satisfied at all (with a minimal explanation when
/// they cannot) and which satisfying assignment has the lowest total weight.
pub struct RuleContext {
    options: OptionTable,
    rules: RuleSet,
    step: SolverStep,

    /// Options or rules changed since the last feasibility check
    changed: bool,
    last_error: Option<Vec<RuleId>>,

    variables: Option<VariableTable>,
    optimizer: Option<Optimizer>,

    cancel: CancelHandle,
    timeout: Option<Duration>,
    /// Started by the first backend call and shared by every later one
    budget: Option<TimeBudget>,
    minimize_cores: bool,
}

impl RuleContext {
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_cancel_handle(config, CancelHandle::new())
    }

    /// Create a context observing an existing cancel handle
    pub fn with_cancel_handle(config: &ResolverConfig, cancel: CancelHandle) -> Self {
        Self {
            options: OptionTable::new(),
            rules: RuleSet::new(),
            step: SolverStep::Define,
            changed: true,
            last_error: None,
            variables: None,
            optimizer: None,
            cancel,
            timeout: config.timeout_duration(),
            budget: None,
            minimize_cores: config.minimize_cores,
        }
    }

    pub fn step(&self) -> SolverStep {
        self.step
    }

    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.cancel.is_poisoned() {
            return Err(SolverError::Cancelled);
        }
        Ok(())
    }

    /// Options and rules may only change before a solution is proven
    fn check_editable(&self, operation: &'static str) -> Result<()> {
        self.check_poisoned()?;
        match self.step {
            SolverStep::Define | SolverStep::Solve => Ok(()),
            step => Err(SolverError::InvalidState { operation, step }),
        }
    }

    fn mark_changed(&mut self) {
        self.changed = true;
        self.last_error = None;
    }

    /// Register an option and let every rule pick it up
    pub fn add_option(&mut self, kind: OptionKind, weight: i64) -> Result<OptionId> {
        self.check_editable("add_option")?;

        let id = self.options.add(kind, weight);
        for (_, entry) in self.rules.iter_mut() {
            if entry.rule.on_option_added(id, &self.options) {
                entry.stale = true;
            }
        }
        self.mark_changed();
        Ok(id)
    }

    pub fn set_weight(&mut self, id: OptionId, weight: i64) -> Result<()> {
        self.check_editable("set_weight")?;
        if !self.options.set_weight(id, weight) {
            return Err(DefinitionError::UnknownOption(id).into());
        }
        self.mark_changed();
        Ok(())
    }

    /// Unregister an option; rules referencing it treat it as false from now on
    pub fn remove_option(&mut self, id: OptionId) -> Result<()> {
        self.check_editable("remove_option")?;
        if !self.options.remove(id) {
            return Err(DefinitionError::UnknownOption(id).into());
        }

        for (_, entry) in self.rules.iter_mut() {
            if entry.rule.on_option_removed(id) {
                entry.stale = true;
            }
        }
        self.mark_changed();
        Ok(())
    }

    /// Register a rule, optionally as a sub-rule of `parent`.
    ///
    /// The rule sees every option registered so far and is defined right
    /// away, so definition errors surface here.
    pub fn add_rule(&mut self, mut rule: Rule, parent: Option<RuleId>) -> Result<RuleId> {
        self.check_editable("add_rule")?;
        if let Some(parent) = parent {
            if !self.rules.contains(parent) {
                return Err(DefinitionError::UnknownRule(parent).into());
            }
        }

        for (id, _) in self.options.iter() {
            rule.on_option_added(id, &self.options);
        }

        let id = self.rules.add(rule, parent);
        if let Err(e) = self.define_rule(id) {
            self.rules.remove(id);
            return Err(e.into());
        }
        self.mark_changed();
        Ok(id)
    }

    /// Remove a rule together with its sub-rules
    pub fn remove_rule(&mut self, id: RuleId) -> Result<Vec<RuleId>> {
        self.check_editable("remove_rule")?;
        if !self.rules.contains(id) {
            return Err(DefinitionError::UnknownRule(id).into());
        }

        let removed = self.rules.remove(id);
        debug!("Removed {} rule(s) starting at {}", removed.len(), id);
        self.mark_changed();
        Ok(removed)
    }

    fn define_rule(&mut self, id: RuleId) -> std::result::Result<(), DefinitionError> {
        let entry = self
            .rules
            .entry_mut(id)
            .ok_or(DefinitionError::UnknownRule(id))?;

        let mut definer = RuleDefiner::new(&self.options, id);
        entry.rule.define(&mut definer)?;
        entry.constraints = definer.into_constraints();
        entry.stale = false;
        Ok(())
    }

    /// Redefine every rule whose option lists changed
    pub fn redefine(&mut self) -> Result<()> {
        let stale: Vec<RuleId> = self
            .rules
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(id, _)| id)
            .collect();

        if !stale.is_empty() {
            debug!("Redefining {} stale rule(s)", stale.len());
        }
        for id in stale {
            self.define_rule(id)?;
        }
        Ok(())
    }

    fn constraints(&self) -> impl Iterator<Item = (RuleId, &[Cardinality])> {
        self.rules
            .iter()
            .map(|(id, entry)| (id, entry.constraints.as_slice()))
    }

    fn termination(&mut self) -> Termination {
        if self.budget.is_none() {
            self.budget = self.timeout.map(TimeBudget::starting_now);
        }
        Combinator::new(self.cancel.clone(), self.budget)
    }

    /// Why a backend call stopped early
    fn interrupted(&self) -> SolverError {
        if self.cancel.is_cancelled() {
            if !self.cancel.is_poisoned() {
                self.cancel.acknowledge();
            }
            SolverError::Cancelled
        } else {
            SolverError::Timeout
        }
    }

    /// Check whether the active rules can all hold at once.
    ///
    /// On success the optimizer is prepared and the context moves to
    /// [`SolverStep::ReSolving`]; on failure the core is kept for
    /// [`RuleContext::get_error`].
    pub fn has_solution(&mut self) -> Result<bool> {
        self.check_poisoned()?;
        match self.step {
            SolverStep::ReSolving => return Ok(true),
            SolverStep::Optimize | SolverStep::Done => {
                return Err(SolverError::InvalidState {
                    operation: "has_solution",
                    step: self.step,
                });
            }
            SolverStep::Define | SolverStep::Solve => {}
        }

        if !self.changed && self.last_error.is_some() {
            return Ok(false);
        }

        self.redefine()?;
        let started = Instant::now();
        let stats = self.rules.stats();
        debug!(
            "Checking {} options against {} rules ({} constraints)",
            self.options.len(),
            stats.total,
            stats.constraints
        );

        let mut termination = self.termination();
        let variables = VariableTable::build(&self.options);
        let mut explainer = ExplainingSolver::build(&variables, self.constraints())?;
        let Some(feasibility) = explainer.check(&mut termination, self.minimize_cores) else {
            return Err(self.interrupted());
        };

        self.changed = false;
        match feasibility {
            Feasibility::Satisfiable => {
                let objective = variables.objective(&self.options);
                self.optimizer = Some(Optimizer::build(&variables, self.constraints(), objective)?);
                self.variables = Some(variables);
                self.last_error = None;
                self.step = SolverStep::ReSolving;
                info!("Rules are satisfiable ({:.2?})", started.elapsed());
                Ok(true)
            }
            Feasibility::Unsatisfiable(core) => {
                if core.is_empty() {
                    return Err(SolverError::Internal(
                        "unsatisfiable without any rule in the core".to_string(),
                    ));
                }
                info!(
                    "Rules are unsatisfiable, core of {} rule(s) ({:.2?})",
                    core.len(),
                    started.elapsed()
                );
                self.last_error = Some(core);
                self.step = SolverStep::Solve;
                Ok(false)
            }
        }
    }

    /// Rules of a minimal unsatisfiable core from the last failed check
    pub fn get_error(&self) -> Result<Vec<RuleId>> {
        self.check_poisoned()?;
        match (&self.last_error, self.step) {
            (Some(core), SolverStep::Solve) => Ok(core.clone()),
            (_, step) => Err(SolverError::InvalidState {
                operation: "get_error",
                step,
            }),
        }
    }

    /// Optimize and return every registered option loaded by the cheapest
    /// solution, aliases included
    pub fn get_solution(&mut self) -> Result<Vec<OptionId>> {
        self.check_poisoned()?;
        if self.step != SolverStep::ReSolving {
            return Err(SolverError::InvalidState {
                operation: "get_solution",
                step: self.step,
            });
        }

        let mut termination = self.termination();
        let (Some(optimizer), Some(variables)) = (self.optimizer.as_mut(), self.variables.as_ref())
        else {
            return Err(SolverError::Internal("optimizer missing after a successful check".to_string()));
        };

        self.step = SolverStep::Optimize;
        let started = Instant::now();
        match optimizer.optimize(&mut termination) {
            Ok(model) => {
                let loaded: Vec<OptionId> = self
                    .options
                    .iter()
                    .filter(|&(id, _)| variables.value(&self.options, &model, id))
                    .map(|(id, _)| id)
                    .collect();
                self.step = SolverStep::Done;
                info!(
                    "Optimal solution loads {} option(s) ({:.2?})",
                    loaded.len(),
                    started.elapsed()
                );
                Ok(loaded)
            }
            Err(OptimizeError::Stopped) => {
                self.step = SolverStep::ReSolving;
                Err(self.interrupted())
            }
            Err(OptimizeError::Infeasible) => {
                self.step = SolverStep::Done;
                Err(SolverError::Internal(
                    "optimizer found no solution after feasibility was proven".to_string(),
                ))
            }
        }
    }
}
