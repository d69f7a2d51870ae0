//! A [`TerminationCondition`] is a condition which is polled by the generator between refinement
//! operations. It indicates when generation should stop and return the collection built so far,
//! even if actionable flaws remain. The most common example would be [`TimeBudget`], which gives
//! the generator a certain wall-clock budget to refine its collection.

use std::time::Duration;
use std::time::Instant;

/// The central trait that defines a termination condition. A termination condition determines
/// when the generator should give up refining the pattern collection.
pub trait TerminationCondition {
    /// Returns `true` when the generator should stop, `false` otherwise.
    fn should_stop(&mut self) -> bool;
}

impl<T: TerminationCondition> TerminationCondition for Option<T> {
    fn should_stop(&mut self) -> bool {
        match self {
            Some(termination) => termination.should_stop(),
            None => false,
        }
    }
}

/// A [`TerminationCondition`] which never triggers; refinement runs until no actionable flaw
/// remains or the refinement budget is exhausted.
#[derive(Clone, Copy, Debug)]
pub struct Indefinite;

impl TerminationCondition for Indefinite {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// Give the generator a specific wall-clock budget to refine its collection.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    /// The point in time from which to measure the budget.
    started_at: Instant,
    /// The amount of time before [`TimeBudget::should_stop()`] becomes true.
    budget: Duration,
}

impl TimeBudget {
    /// Give the generator a time budget, starting now.
    pub fn starting_now(budget: Duration) -> TimeBudget {
        let started_at = Instant::now();

        TimeBudget { started_at, budget }
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        self.started_at.elapsed() >= self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indefinite_never_stops() {
        assert!(!Indefinite.should_stop());
    }

    #[test]
    fn absent_budget_never_stops() {
        let mut termination: Option<TimeBudget> = None;
        assert!(!termination.should_stop());
    }

    #[test]
    fn exhausted_budget_stops() {
        let mut termination = TimeBudget::starting_now(Duration::ZERO);
        assert!(termination.should_stop());
    }
}
