//! Counterexample-guided equivalence oracle
//!
//! Runs both programs symbolically from one shared unconstrained input and
//! asks z3 whether any input makes them disagree on a live location. UNSAT is
//! the only sound equivalence proof in the system; SAT yields a concrete
//! witness for the strategies' test caches; solver timeouts surface as a
//! distinct verdict, never as a proof.

use tracing::debug;
use z3::ast::{Bool, BV};
use z3::{Params, SatResult, Solver};

use crate::error::OracleError;
use crate::ir::{Instruction, Reg};
use crate::machine::MachineConfig;

use super::smt::{self, SymbolicState};
use super::state::{ConcreteState, LiveOut};

/// Solver tuning knobs.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Per-query timeout in milliseconds. 0 means no timeout.
    pub timeout_ms: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig { timeout_ms: 5000 }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

pub(crate) fn create_solver(cfg: &SolverConfig) -> Solver {
    let solver = Solver::new();
    if cfg.timeout_ms > 0 {
        let mut params = Params::new();
        params.set_u32("timeout", cfg.timeout_ms);
        solver.set_params(&params);
    }
    solver
}

/// Outcome of an equivalence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No input distinguishes the programs on the live locations.
    Equivalent,
    /// A concrete input on which the programs disagree.
    Counterexample(ConcreteState),
    /// The solver gave up; equivalence is undecided, not disproved.
    Unknown(String),
}

/// An extra constraint on the shared symbolic input, e.g. an alignment or
/// range assumption the caller knows holds.
pub type Precondition = dyn Fn(&SymbolicState) -> Bool + Sync;

/// Ask whether `candidate` agrees with `spec` on every live location for all
/// inputs satisfying the precondition.
pub fn counterexample(
    config: &MachineConfig,
    spec: &[Instruction],
    candidate: &[Instruction],
    live_out: &LiveOut,
    precondition: Option<&Precondition>,
    solver_config: &SolverConfig,
) -> Result<Verdict, OracleError> {
    let input = SymbolicState::new_symbolic(config, "in");
    let spec_out = smt::interpret(config, &input, spec)?;
    let cand_out = smt::interpret(config, &input, candidate)?;

    let solver = create_solver(solver_config);
    if let Some(pre) = precondition {
        solver.assert(&pre(&input));
    }
    solver.assert(&smt::states_differ(live_out, &spec_out, &cand_out));

    match solver.check() {
        SatResult::Unsat => Ok(Verdict::Equivalent),
        SatResult::Unknown => {
            let reason = solver.get_reason_unknown().unwrap_or_default();
            debug!(%reason, "solver returned unknown");
            Ok(Verdict::Unknown(reason))
        }
        SatResult::Sat => {
            let model = solver.get_model().ok_or(OracleError::ModelExtraction)?;
            let mut witness = ConcreteState::new(config);
            for i in 1..config.nregs {
                let reg = Reg(i as u8);
                let value = model
                    .eval(&input.get_reg(reg), true)
                    .and_then(|bv| bv.as_u64())
                    .ok_or(OracleError::ModelExtraction)?;
                witness.set_reg(reg, value & config.mask());
            }
            // Reconstruct the initial memory at every address either program
            // touches, so the witness reproduces memory-dependent divergence.
            for addr_expr in spec_out.accessed.iter().chain(cand_out.accessed.iter()) {
                let addr = model
                    .eval(addr_expr, true)
                    .and_then(|bv| bv.as_u64())
                    .ok_or(OracleError::ModelExtraction)?;
                let cell = input.mem.select(&BV::from_u64(addr, config.bits));
                let byte = model
                    .eval(&cell, true)
                    .and_then(|d| d.as_bv())
                    .and_then(|bv| bv.as_u64())
                    .ok_or(OracleError::ModelExtraction)?;
                if byte != 0 {
                    witness.mem.store_byte(addr, byte as u8);
                }
            }
            Ok(Verdict::Counterexample(witness))
        }
    }
}
