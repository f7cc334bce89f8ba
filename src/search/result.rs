//! Search outcome types and statistics

use std::time::Duration;

use crate::ir::Program;

use super::config::Strategy;

/// How much trust the result deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Proved equivalent by the oracle (UNSAT on the disagreement query).
    Verified,
    /// Passed every cached test but was never proved; reports how many tests
    /// it survived. Never silently upgraded to `Verified`.
    TestedOnly { tests: usize },
}

/// A program the search considers an improvement over the reference.
#[derive(Debug, Clone)]
pub struct Improvement {
    pub program: Program,
    pub cost: u64,
    pub strategy: Strategy,
    pub confidence: Confidence,
}

impl Improvement {
    pub fn length(&self) -> usize {
        self.program.len()
    }

    pub fn is_verified(&self) -> bool {
        self.confidence == Confidence::Verified
    }
}

/// Result of one search run. Exhaustion without improvement is a normal
/// outcome, not an error.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub improvement: Option<Improvement>,
    pub statistics: SearchStatistics,
}

impl SearchOutcome {
    pub fn no_improvement(statistics: SearchStatistics) -> Self {
        Self {
            improvement: None,
            statistics,
        }
    }

    pub fn with_improvement(improvement: Improvement, statistics: SearchStatistics) -> Self {
        Self {
            improvement: Some(improvement),
            statistics,
        }
    }

    pub fn found_improvement(&self) -> bool {
        self.improvement.is_some()
    }
}

/// Counters collected during a search run.
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    pub strategy: Strategy,
    pub elapsed_time: Duration,
    /// Candidates evaluated against the concrete test cache
    pub candidates_evaluated: u64,
    /// Candidates that passed every cached test
    pub candidates_passed_fast: u64,
    /// Oracle queries issued
    pub solver_queries: u64,
    /// Oracle queries that proved equivalence
    pub solver_equivalent: u64,
    /// MCMC iterations
    pub iterations: u64,
    /// Accepted MCMC proposals
    pub accepted_proposals: u64,
    /// Best cost seen (including the reference program's)
    pub best_cost_found: u64,
    /// Cost of the reference program
    pub original_cost: u64,
    /// Times the running best was improved
    pub improvements_found: u64,
}

impl SearchStatistics {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            best_cost_found: u64::MAX,
            ..Default::default()
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.accepted_proposals as f64 / self.iterations as f64
        }
    }

    pub fn fast_pass_rate(&self) -> f64 {
        if self.candidates_evaluated == 0 {
            0.0
        } else {
            self.candidates_passed_fast as f64 / self.candidates_evaluated as f64
        }
    }

    pub fn solver_success_rate(&self) -> f64 {
        if self.solver_queries == 0 {
            0.0
        } else {
            self.solver_equivalent as f64 / self.solver_queries as f64
        }
    }

    /// Fold another run's counters into this one (used by the driver).
    pub fn merge(&mut self, other: &SearchStatistics) {
        self.candidates_evaluated += other.candidates_evaluated;
        self.candidates_passed_fast += other.candidates_passed_fast;
        self.solver_queries += other.solver_queries;
        self.solver_equivalent += other.solver_equivalent;
        self.iterations += other.iterations;
        self.accepted_proposals += other.accepted_proposals;
        self.improvements_found += other.improvements_found;
        self.best_cost_found = self.best_cost_found.min(other.best_cost_found);
    }
}
