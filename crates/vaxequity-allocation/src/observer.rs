//! argmin observer that reports solver progress through `tracing`
//!
//! Rows are emitted at debug level in a fixed-width table, with the header
//! repeated every `header_interval` iterations so long solves stay readable.

use argmin::core::observers::Observe;
use argmin::core::{Error, State, KV};
use tracing::debug;

pub struct TracingObserver {
    /// Number of iterations between header repeats
    header_interval: u64,
    /// Last iteration where the header was emitted
    last_header_iter: u64,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::with_header_interval(100)
    }

    pub fn with_header_interval(header_interval: u64) -> Self {
        Self {
            header_interval: header_interval.max(1),
            last_header_iter: 0,
        }
    }

    fn header_due(&self, iter: u64) -> bool {
        iter == 0 || iter - self.last_header_iter >= self.header_interval
    }

    fn emit_header(&self) {
        let separator = "=".repeat(92);
        debug!("{separator}");
        debug!(
            "{:>12} | {:>14} | {:>16} | {:>16} | {:>16}",
            "Iteration", "Time (s)", "Objective", "Best Objective", "Obj. Evaluations"
        );
        debug!("{separator}");
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Observe<I> for TracingObserver
where
    I: State,
    <I as State>::Float: std::fmt::LowerExp,
{
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        let iter = state.get_iter();
        if self.header_due(iter) {
            self.emit_header();
            self.last_header_iter = iter;
        }

        let time = state.get_time().map(|d| d.as_secs_f64()).unwrap_or(0.0);
        let evaluations = state
            .get_func_counts()
            .get("cost_count")
            .copied()
            .unwrap_or(0);

        // argmin minimizes the negated objective
        debug!(
            "{:>12} | {:>14.6} | {:>16} | {:>16} | {:>16}",
            iter,
            time,
            format!("{:.6e}", state.get_cost()),
            format!("{:.6e}", state.get_best_cost()),
            evaluations,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_schedule() {
        let mut observer = TracingObserver::with_header_interval(10);
        assert!(observer.header_due(0));
        assert!(!observer.header_due(9));
        assert!(observer.header_due(10));
        observer.last_header_iter = 10;
        assert!(!observer.header_due(15));
        assert!(observer.header_due(20));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let observer = TracingObserver::with_header_interval(0);
        assert!(observer.header_due(1));
    }
}
