//! Superoptimizer core for straight-line RV32 code.
//!
//! Given a reference program, a set of live-out locations, and a machine
//! model (bit width, register count, opcode costs, opcode pool), the search
//! strategies look for a cheaper program the equivalence oracle can prove
//! interchangeable with the reference:
//!
//! - [`search::CegisSearch`]: counterexample-guided symbolic synthesis
//!   over a sketch of instruction slots, solved with z3.
//! - [`search::StochasticSearch`]: an MCMC walk over programs with
//!   Metropolis-Hastings acceptance.
//! - [`search::EnumerativeSearch`]: bidirectional enumeration at a reduced
//!   bit width, meeting forward concrete states against backward
//!   partially-known states.
//! - [`search::run_parallel_search`]: all of the above on worker threads,
//!   first verified result wins.
//!
//! Programs move in and out of the crate as text via [`ir::encode`] and
//! [`ir::decode`]; equivalence queries go through
//! [`semantics::counterexample`]. There is no file or CLI surface here.
//!
//! ```no_run
//! use riscv_superoptimizer::ir::{encode, Reg};
//! use riscv_superoptimizer::machine::MachineModel;
//! use riscv_superoptimizer::search::{SearchConfig, SearchTask, StochasticSearch, Superoptimize};
//! use riscv_superoptimizer::semantics::LiveOut;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = encode("add x1, x2, x2\nadd x1, x1, x2")?;
//! let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
//! let model = MachineModel::default();
//! let outcome = StochasticSearch::new().superoptimize(&task, &model, &SearchConfig::default())?;
//! if let Some(improvement) = outcome.improvement {
//!     println!("{}", riscv_superoptimizer::ir::decode(&improvement.program));
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ir;
pub mod isa;
pub mod machine;
pub mod search;
pub mod semantics;
pub mod validation;

pub use error::{ModelError, OracleError, SearchError, SimError};
pub use ir::{decode, encode, Instruction, Opcode, Program, Reg};
pub use machine::{CostModel, MachineConfig, MachineModel, PoolConstraints};
pub use search::{
    run_parallel_search, CancelToken, CegisSearch, EnumerativeSearch, HybridSearch,
    ParallelConfig, SearchConfig, SearchOutcome, SearchTask, StochasticSearch, Strategy,
    Superoptimize,
};
pub use semantics::{counterexample, interpret, ConcreteState, LiveOut, SolverConfig, Verdict};
pub use validation::generate_input_states;
