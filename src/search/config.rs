//! Configuration types for the search strategies

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::semantics::SolverConfig;

use super::parallel::channel::SharedBest;

/// Strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Counterexample-guided symbolic synthesis
    #[default]
    Cegis,
    /// Stochastic MCMC search using Metropolis-Hastings
    Stochastic,
    /// Bidirectional enumerative search
    Enumerative,
    /// Parallel driver combining the other three
    Hybrid,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Cegis => write!(f, "cegis"),
            Strategy::Stochastic => write!(f, "stochastic"),
            Strategy::Enumerative => write!(f, "enumerative"),
            Strategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cegis" | "symbolic" | "smt" => Ok(Strategy::Cegis),
            "stochastic" | "stoch" | "mcmc" => Ok(Strategy::Stochastic),
            "enumerative" | "enum" => Ok(Strategy::Enumerative),
            "hybrid" | "parallel" => Ok(Strategy::Hybrid),
            _ => Err(format!(
                "Unknown strategy: '{}'. Valid options: cegis, stochastic, enumerative, hybrid",
                s
            )),
        }
    }
}

/// How a strategy walks the space of candidate lengths and costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Walk lengths upward, tightening the cost bound on each success.
    #[default]
    Linear,
    /// Bisect the cost bound between known-feasible and known-infeasible.
    Binary,
    /// Decompose the program into windows and optimize each in context.
    Partial,
}

/// Cooperative cancellation handle shared between a caller (or the parallel
/// coordinator) and a running strategy. Strategies poll it at step
/// granularity.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutation operator weights for stochastic search. Normalized at use.
#[derive(Debug, Clone, Copy)]
pub struct MutationWeights {
    /// Resample one operand of a random instruction
    pub operand: f64,
    /// Replace the opcode, keeping operands (within the same class)
    pub opcode: f64,
    /// Swap two instructions
    pub swap: f64,
    /// Replace a whole instruction with a random one
    pub instruction: f64,
}

impl Default for MutationWeights {
    fn default() -> Self {
        Self {
            operand: 0.50,
            opcode: 0.16,
            swap: 0.16,
            instruction: 0.18,
        }
    }
}

impl MutationWeights {
    /// Cumulative thresholds in [0, 1] for sampling a mutation kind.
    pub fn cumulative_thresholds(&self) -> [f64; 4] {
        let total = self.operand + self.opcode + self.swap + self.instruction;
        let operand = self.operand / total;
        let opcode = operand + self.opcode / total;
        let swap = opcode + self.swap / total;
        [operand, opcode, swap, 1.0]
    }
}

/// Configuration for stochastic (MCMC) search.
#[derive(Debug, Clone)]
pub struct StochasticConfig {
    /// Inverse temperature for Metropolis-Hastings (higher = more greedy)
    pub beta: f64,
    /// Maximum number of MCMC iterations
    pub iterations: u64,
    /// Number of random test cases for fast validation
    pub test_count: usize,
    /// Mutation operator weights
    pub mutation_weights: MutationWeights,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            beta: 1.0,
            iterations: 1_000_000,
            test_count: 16,
            mutation_weights: MutationWeights::default(),
        }
    }
}

impl StochasticConfig {
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_test_count(mut self, count: usize) -> Self {
        self.test_count = count;
        self
    }
}

/// Configuration for symbolic (CEGIS) search.
#[derive(Debug, Clone)]
pub struct CegisConfig {
    /// How the length/cost space is traversed
    pub mode: SearchMode,
    /// Maximum candidate length the sketch grows to
    pub max_length: usize,
    /// Window size bound for `SearchMode::Partial`
    pub window_size: usize,
    /// Number of seed test cases before the first solver query
    pub test_count: usize,
}

impl Default for CegisConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Linear,
            max_length: 4,
            window_size: 8,
            test_count: 8,
        }
    }
}

impl CegisConfig {
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_length(mut self, len: usize) -> Self {
        self.max_length = len;
        self
    }
}

/// Configuration for bidirectional enumerative search.
#[derive(Debug, Clone)]
pub struct EnumerativeConfig {
    /// Total length ceiling (forward + pivot + backward)
    pub len_limit: usize,
    /// Window size bound for `SearchMode::Partial`
    pub window_size: usize,
    /// Bit width the enumeration tables are built at; candidates are
    /// re-checked at full width before verification
    pub reduced_bits: u32,
    /// Number of test states the behavioral signature is computed over
    pub test_count: usize,
    /// How the length/cost space is traversed
    pub mode: SearchMode,
}

impl Default for EnumerativeConfig {
    fn default() -> Self {
        Self {
            len_limit: 4,
            window_size: 8,
            reduced_bits: 4,
            test_count: 4,
            mode: SearchMode::Linear,
        }
    }
}

impl EnumerativeConfig {
    pub fn with_len_limit(mut self, limit: usize) -> Self {
        self.len_limit = limit;
        self
    }

    pub fn with_reduced_bits(mut self, bits: u32) -> Self {
        self.reduced_bits = bits;
        self
    }
}

/// Top-level search configuration shared by all strategies.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Wall-clock budget for the whole search
    pub time_limit: Duration,
    /// Seed for the strategies' random number generators
    pub seed: u64,
    /// Solver tuning for oracle queries
    pub solver: SolverConfig,
    pub stochastic: StochasticConfig,
    pub cegis: CegisConfig,
    pub enumerative: EnumerativeConfig,
    /// Cooperative cancellation; defaults to never cancelled
    pub cancel: CancelToken,
    /// Cross-worker best cost, set by the parallel driver so every strategy
    /// prunes against the globally best result
    pub shared_best: Option<Arc<SharedBest>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            seed: 0,
            solver: SolverConfig::default(),
            stochastic: StochasticConfig::default(),
            cegis: CegisConfig::default(),
            enumerative: EnumerativeConfig::default(),
            cancel: CancelToken::new(),
            shared_best: None,
        }
    }
}

impl SearchConfig {
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stop as soon as cancellation is requested or another worker already
    /// holds a result at least as good as `cost`.
    pub fn should_stop(&self, cost_to_beat: u64) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        match &self.shared_best {
            Some(shared) => shared.should_stop() || shared.current_best() < cost_to_beat,
            None => false,
        }
    }
}
