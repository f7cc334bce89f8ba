//! Dual simulator and equivalence oracle

pub mod concrete;
pub mod oracle;
pub mod smt;
pub mod state;

pub use concrete::interpret;
pub use oracle::{counterexample, Precondition, SolverConfig, Verdict};
pub use state::{ConcreteState, LiveOut, Memory};
