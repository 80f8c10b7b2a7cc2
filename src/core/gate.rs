//! Gate algebra.
//!
//! A gate is a boolean condition over counters and convergence trackers.
//! Gates hold shared handles, not values, so `is_open` re-reads the
//! underlying state on every call. Composite conditions are built by
//! combining gates, e.g. the loop's continue condition:
//!
//! ```ignore
//! Gate::for_and(
//!     Gate::for_counter_and_maximum(attempts, max),
//!     Gate::for_not(success),
//! )
//! ```

use std::fmt;

use crate::core::counter::Counter;
use crate::core::tracker::ConvergenceTracker;

/// A composable open/closed condition.
#[derive(Clone)]
pub enum Gate {
    /// Always open.
    Always,
    /// Open while the tracker's convergence is at least `threshold`.
    Convergence {
        tracker: ConvergenceTracker,
        threshold: f64,
    },
    /// Open while `counter >= minimum`.
    CounterMinimum { counter: Counter, minimum: u64 },
    /// Open while `counter < maximum`.
    CounterMaximum { counter: Counter, maximum: u64 },
    /// Open when every gate is open. Empty is open.
    And(Vec<Gate>),
    /// Open when any gate is open. Empty is closed.
    Or(Vec<Gate>),
    Not(Box<Gate>),
}

impl Gate {
    pub fn always() -> Self {
        Self::Always
    }

    pub fn for_convergence(tracker: ConvergenceTracker, threshold: f64) -> Self {
        Self::Convergence { tracker, threshold }
    }

    pub fn for_counter_and_minimum(counter: Counter, minimum: u64) -> Self {
        Self::CounterMinimum { counter, minimum }
    }

    pub fn for_counter_and_maximum(counter: Counter, maximum: u64) -> Self {
        Self::CounterMaximum { counter, maximum }
    }

    pub fn for_and(a: Gate, b: Gate) -> Self {
        Self::And(vec![a, b])
    }

    pub fn for_or(a: Gate, b: Gate) -> Self {
        Self::Or(vec![a, b])
    }

    pub fn for_not(gate: Gate) -> Self {
        Self::Not(Box::new(gate))
    }

    pub fn all(gates: impl IntoIterator<Item = Gate>) -> Self {
        Self::And(gates.into_iter().collect())
    }

    pub fn any(gates: impl IntoIterator<Item = Gate>) -> Self {
        Self::Or(gates.into_iter().collect())
    }

    /// Evaluate the gate against the current state.
    pub fn is_open(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Convergence { tracker, threshold } => {
                tracker.measure_convergence() >= *threshold
            }
            Self::CounterMinimum { counter, minimum } => counter.get() >= *minimum,
            Self::CounterMaximum { counter, maximum } => counter.get() < *maximum,
            Self::And(gates) => gates.iter().all(Gate::is_open),
            Self::Or(gates) => gates.iter().any(Gate::is_open),
            Self::Not(gate) => !gate.is_open(),
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Convergence { threshold, .. } => write!(f, "Convergence(>= {threshold})"),
            Self::CounterMinimum { counter, minimum } => {
                write!(f, "CounterMinimum({} >= {minimum})", counter.get())
            }
            Self::CounterMaximum { counter, maximum } => {
                write!(f, "CounterMaximum({} < {maximum})", counter.get())
            }
            Self::And(gates) => f.debug_tuple("And").field(gates).finish(),
            Self::Or(gates) => f.debug_tuple("Or").field(gates).finish(),
            Self::Not(gate) => f.debug_tuple("Not").field(gate).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::summarizer::Summarizer;

    #[test]
    fn test_always_is_open() {
        assert!(Gate::always().is_open());
    }

    #[test]
    fn test_counter_gates() {
        let counter = Counter::new();
        let minimum = Gate::for_counter_and_minimum(counter.clone(), 2);
        let maximum = Gate::for_counter_and_maximum(counter.clone(), 2);

        assert!(!minimum.is_open());
        assert!(maximum.is_open());

        counter.increment();
        counter.increment();
        assert!(minimum.is_open(), "2 >= 2");
        assert!(!maximum.is_open(), "2 < 2 is false");
    }

    #[test]
    fn test_convergence_gate_rereads_tracker() {
        let tracker = ConvergenceTracker::new(2, Summarizer::Mean);
        let gate = Gate::for_convergence(tracker.clone(), 1.0);

        assert!(!gate.is_open());
        tracker.record_result(1.0);
        assert!(!gate.is_open(), "half-filled window is 0.5");
        tracker.record_result(1.0);
        assert!(gate.is_open());
        tracker.record_result(0.0);
        assert!(!gate.is_open());
    }

    #[test]
    fn test_empty_combinators() {
        assert!(Gate::all(Vec::new()).is_open());
        assert!(!Gate::any(Vec::new()).is_open());
    }

    #[test]
    fn test_loop_continue_condition() {
        let attempts = Counter::new();
        let tracker = ConvergenceTracker::new(1, Summarizer::Mean);
        let success = Gate::for_convergence(tracker.clone(), 1.0);
        let keep_going = Gate::for_and(
            Gate::for_counter_and_maximum(attempts.clone(), 3),
            Gate::for_not(success),
        );

        assert!(keep_going.is_open());
        tracker.record_result(1.0);
        assert!(!keep_going.is_open(), "success closes the loop");

        tracker.record_result(0.0);
        assert!(keep_going.is_open());
        for _ in 0..3 {
            attempts.increment();
        }
        assert!(!keep_going.is_open(), "attempt ceiling closes the loop");
    }

    #[test]
    fn test_debug_output() {
        let counter = Counter::new();
        let gate = Gate::for_not(Gate::for_counter_and_minimum(counter, 5));
        assert_eq!(format!("{:?}", gate), "Not(CounterMinimum(0 >= 5))");
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn counter_gate(value: u64, threshold: u64, minimum: bool) -> Gate {
            let counter = Counter::new();
            for _ in 0..value {
                counter.increment();
            }
            if minimum {
                Gate::for_counter_and_minimum(counter, threshold)
            } else {
                Gate::for_counter_and_maximum(counter, threshold)
            }
        }

        proptest! {
            // Property: And/Or/Not agree with boolean logic
            #[test]
            fn prop_combinators_match_boolean_logic(
                a_value in 0u64..5, a_threshold in 0u64..5, a_min in any::<bool>(),
                b_value in 0u64..5, b_threshold in 0u64..5, b_min in any::<bool>(),
            ) {
                let a = counter_gate(a_value, a_threshold, a_min);
                let b = counter_gate(b_value, b_threshold, b_min);

                prop_assert_eq!(
                    Gate::for_and(a.clone(), b.clone()).is_open(),
                    a.is_open() && b.is_open()
                );
                prop_assert_eq!(
                    Gate::for_or(a.clone(), b.clone()).is_open(),
                    a.is_open() || b.is_open()
                );
                prop_assert_eq!(Gate::for_not(a.clone()).is_open(), !a.is_open());
            }

            // Property: composite gates re-read shared state on each access
            #[test]
            fn prop_gates_are_not_cached(increments in 0u64..10, threshold in 0u64..10) {
                let counter = Counter::new();
                let gate = Gate::for_not(Gate::for_counter_and_minimum(counter.clone(), threshold));
                let before = gate.is_open();
                for _ in 0..increments {
                    counter.increment();
                }
                prop_assert_eq!(before, 0 < threshold);
                prop_assert_eq!(gate.is_open(), increments < threshold);
            }
        }
    }
}
