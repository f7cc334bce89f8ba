//! Search strategies for finding cheaper equivalent programs
//!
//! Three strategies share one interface and one counterexample-guided test
//! loop:
//! - CEGIS: symbolic sketch solving with z3
//! - Stochastic: MCMC over programs with Metropolis-Hastings acceptance
//! - Enumerative: bidirectional (meet-in-the-middle) enumeration
//! plus a parallel driver that runs all of them and takes the first verified
//! winner.

pub mod candidate;
pub mod cegis;
pub mod config;
pub mod enumerative;
pub mod parallel;
pub mod result;
pub mod stochastic;

pub use candidate::InstructionSpace;
pub use cegis::CegisSearch;
pub use config::{
    CancelToken, CegisConfig, EnumerativeConfig, MutationWeights, SearchConfig, SearchMode,
    StochasticConfig, Strategy,
};
pub use enumerative::EnumerativeSearch;
pub use parallel::{run_parallel_search, HybridSearch, ParallelConfig};
pub use result::{Confidence, Improvement, SearchOutcome, SearchStatistics};
pub use stochastic::StochasticSearch;

use std::time::Duration;

use crate::error::{OracleError, SearchError, SimError};
use crate::ir::{Instruction, Opcode, Program};
use crate::machine::{MachineConfig, MachineModel};
use crate::semantics::concrete;
use crate::semantics::{counterexample, ConcreteState, LiveOut, SolverConfig, Verdict};

/// What to optimize: the reference program, the observed locations, and the
/// surrounding context it must stay correct in.
#[derive(Debug, Clone)]
pub struct SearchTask {
    /// Reference program the candidate must be equivalent to
    pub spec: Program,
    /// Locations observed after execution
    pub live_out: LiveOut,
    /// Human-readable label used in logs
    pub name: String,
    /// Wall-clock budget
    pub time_limit: Duration,
    /// Upper bound on synthesized program length
    pub target_size: usize,
    /// Fixed instructions executed before the candidate
    pub prefix: Program,
    /// Fixed instructions executed after the candidate
    pub postfix: Program,
    /// Starting point for the stochastic walk (defaults to the spec)
    pub start_program: Option<Program>,
    /// Synthesize at exactly this length instead of walking lengths
    pub fixed_length: Option<usize>,
}

impl SearchTask {
    pub fn new(spec: Program, live_out: LiveOut) -> Self {
        let target_size = spec.len();
        SearchTask {
            spec,
            live_out,
            name: "unnamed".to_string(),
            time_limit: Duration::from_secs(60),
            target_size,
            prefix: Vec::new(),
            postfix: Vec::new(),
            start_program: None,
            fixed_length: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_target_size(mut self, size: usize) -> Self {
        self.target_size = size;
        self
    }

    pub fn with_prefix(mut self, prefix: Program) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_postfix(mut self, postfix: Program) -> Self {
        self.postfix = postfix;
        self
    }

    pub fn with_start_program(mut self, program: Program) -> Self {
        self.start_program = Some(program);
        self
    }

    pub fn with_fixed_length(mut self, length: usize) -> Self {
        self.fixed_length = Some(length);
        self
    }

    /// The reference program in its full context.
    pub fn full_spec(&self) -> Program {
        self.wrap(&self.spec)
    }

    /// A candidate in the same context.
    pub fn wrap(&self, candidate: &[Instruction]) -> Program {
        let mut out = Vec::with_capacity(self.prefix.len() + candidate.len() + self.postfix.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(candidate);
        out.extend_from_slice(&self.postfix);
        out
    }

    fn check_well_formed(&self) -> Result<(), SearchError> {
        let has_hole = self
            .spec
            .iter()
            .chain(self.prefix.iter())
            .chain(self.postfix.iter())
            .any(|i| i.opcode == Opcode::Unknown);
        if has_hole {
            return Err(SearchError::HoleInReference);
        }
        Ok(())
    }
}

/// The uniform entry point every strategy and the driver implement.
pub trait Superoptimize {
    fn superoptimize(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError>;
}

/// A cached test: an input state and the reference program's output on it.
#[derive(Debug, Clone)]
pub(crate) struct TestCase {
    pub input: ConcreteState,
    pub expected: ConcreteState,
}

/// The counterexample-guided test cache shared in shape by all strategies.
#[derive(Debug, Clone)]
pub(crate) struct TestCache {
    cases: Vec<TestCase>,
}

impl TestCache {
    pub fn new(
        config: &MachineConfig,
        task: &SearchTask,
        inputs: Vec<ConcreteState>,
    ) -> Result<Self, SearchError> {
        task.check_well_formed()?;
        let spec = task.full_spec();
        let mut cases = Vec::with_capacity(inputs.len());
        for input in inputs {
            let expected = concrete::interpret(config, &input, &spec)?;
            cases.push(TestCase { input, expected });
        }
        Ok(TestCache { cases })
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Add a counterexample input fresh from the oracle.
    pub fn add_counterexample(
        &mut self,
        config: &MachineConfig,
        task: &SearchTask,
        input: ConcreteState,
    ) -> Result<(), SimError> {
        let expected = concrete::interpret(config, &input, &task.full_spec())?;
        self.cases.push(TestCase { input, expected });
        Ok(())
    }

    /// Whether a candidate agrees with the reference on every cached test.
    pub fn passes(
        &self,
        config: &MachineConfig,
        task: &SearchTask,
        candidate: &[Instruction],
    ) -> Result<bool, SimError> {
        let wrapped = task.wrap(candidate);
        for case in &self.cases {
            if !concrete::interpret_matches(
                config,
                &case.input,
                &wrapped,
                &case.expected,
                &task.live_out,
            )? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// One oracle query for a candidate in context.
pub(crate) fn verify_candidate(
    config: &MachineConfig,
    task: &SearchTask,
    candidate: &[Instruction],
    solver: &SolverConfig,
) -> Result<Verdict, OracleError> {
    counterexample(
        config,
        &task.full_spec(),
        &task.wrap(candidate),
        &task.live_out,
        None,
        solver,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{encode, Reg};
    use crate::validation::generate_input_states;

    #[test]
    fn test_wrap_concatenates_context() {
        let spec = encode("add x1, x2, x3").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_prefix(encode("li x2, 5").unwrap())
            .with_postfix(encode("mv x4, x1").unwrap());
        let wrapped = task.wrap(&encode("slli x1, x2, 1").unwrap());
        assert_eq!(wrapped.len(), 3);
        assert_eq!(wrapped[0].opcode, Opcode::Li);
        assert_eq!(wrapped[2].opcode, Opcode::Mv);
    }

    #[test]
    fn test_hole_in_reference_rejected() {
        let config = MachineConfig::default();
        let spec = encode("??").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
        let inputs = generate_input_states(&config, 4, 0);
        assert!(matches!(
            TestCache::new(&config, &task, inputs),
            Err(SearchError::HoleInReference)
        ));
    }

    #[test]
    fn test_cache_distinguishes_programs() {
        let config = MachineConfig::default();
        let spec = encode("add x1, x2, x3").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
        let cache = TestCache::new(&config, &task, generate_input_states(&config, 16, 0)).unwrap();

        let good = encode("add x1, x3, x2").unwrap();
        assert!(cache.passes(&config, &task, &good).unwrap());
        let bad = encode("or x1, x2, x3").unwrap();
        assert!(!cache.passes(&config, &task, &bad).unwrap());
    }
}
