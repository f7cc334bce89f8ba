//! Configuration for the parallel driver

use std::time::Duration;

use crate::search::config::Strategy;

/// How the parallel driver distributes work.
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of worker threads to spawn.
    pub num_workers: usize,
    /// Strategies in play, assigned to workers round-robin. `Hybrid` entries
    /// are ignored.
    pub strategies: Vec<Strategy>,
    /// Overall wall-clock budget; defaults to the task's own limit.
    pub timeout: Option<Duration>,
    /// Base random seed (worker `i` gets `base_seed + i`).
    pub base_seed: Option<u64>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            strategies: vec![Strategy::Cegis, Strategy::Stochastic, Strategy::Enumerative],
            timeout: None,
            base_seed: None,
        }
    }
}

impl ParallelConfig {
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = Strategy>) -> Self {
        self.strategies = strategies
            .into_iter()
            .filter(|s| *s != Strategy::Hybrid)
            .collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = Some(seed);
        self
    }

    /// The strategy worker `worker_id` runs.
    pub fn strategy_for(&self, worker_id: usize) -> Strategy {
        if self.strategies.is_empty() {
            Strategy::Stochastic
        } else {
            self.strategies[worker_id % self.strategies.len()]
        }
    }
}
