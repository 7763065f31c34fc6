//! Conditions polled by the search loop that tell it to give up early.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Determines when the backend should stop searching, even if no
/// conclusion has been reached.
pub trait TerminationCondition {
    /// Returns `true` when the solver should stop, `false` otherwise.
    fn should_stop(&mut self) -> bool;
    fn decision_has_been_made(&mut self) {}
}

impl<T: TerminationCondition> TerminationCondition for Option<T> {
    fn should_stop(&mut self) -> bool {
        match self {
            Some(t) => t.should_stop(),
            None => false,
        }
    }

    fn decision_has_been_made(&mut self) {
        if let Some(t) = self {
            t.decision_has_been_made()
        }
    }
}

/// Never stops.
#[derive(Clone, Copy, Debug, Default)]
pub struct Indefinite;

impl TerminationCondition for Indefinite {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// Stops once a wall-clock budget is spent.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    started_at: Instant,
    budget: Duration,
}

impl TimeBudget {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    /// Whether the budget has run out
    pub fn expired(&self) -> bool {
        self.started_at.elapsed() >= self.budget
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        self.expired()
    }
}

/// Stops after a fixed number of decisions.
#[derive(Debug, Copy, Clone)]
pub struct DecisionBudget {
    budget: u64,
    num_decisions: u64,
}

impl DecisionBudget {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            num_decisions: 0,
        }
    }
}

impl TerminationCondition for DecisionBudget {
    fn should_stop(&mut self) -> bool {
        self.num_decisions >= self.budget
    }

    fn decision_has_been_made(&mut self) {
        self.num_decisions += 1;
    }
}

/// Triggers when either of two conditions triggers.
#[derive(Clone, Copy, Debug)]
pub struct Combinator<T1, T2> {
    t1: T1,
    t2: T2,
}

impl<T1, T2> Combinator<T1, T2> {
    pub fn new(t1: T1, t2: T2) -> Self {
        Combinator { t1, t2 }
    }
}

impl<T1: TerminationCondition, T2: TerminationCondition> TerminationCondition
    for Combinator<T1, T2>
{
    fn should_stop(&mut self) -> bool {
        self.t1.should_stop() || self.t2.should_stop()
    }

    fn decision_has_been_made(&mut self) {
        self.t1.decision_has_been_made();
        self.t2.decision_has_been_made();
    }
}

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const POISONED: u8 = 2;

/// Cross-thread cancellation of a running solve.
///
/// [`CancelHandle::cancel`] expires the backend call that is currently
/// running (or the next one to start). [`CancelHandle::hard_cancel`] is
/// permanent: the owning engine refuses every later operation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    state: Arc<AtomicU8>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the current solve
    pub fn cancel(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Stop the current solve and poison the engine
    pub fn hard_cancel(&self) {
        self.state.store(POISONED, Ordering::SeqCst);
    }

    /// Whether any cancellation is pending
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }

    /// Whether [`CancelHandle::hard_cancel`] was called
    pub fn is_poisoned(&self) -> bool {
        self.state.load(Ordering::SeqCst) == POISONED
    }

    /// Clear a soft cancellation once it has been reported
    pub(crate) fn acknowledge(&self) {
        let _ = self
            .state
            .compare_exchange(CANCELLED, RUNNING, Ordering::SeqCst, Ordering::SeqCst);
    }
}

impl TerminationCondition for CancelHandle {
    fn should_stop(&mut self) -> bool {
        self.is_cancelled()
    }
}
