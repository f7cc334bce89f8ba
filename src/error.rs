//! Error taxonomy

use thiserror::Error;

/// Errors building or configuring the machine model, including assembly
/// parsing and opcode pool construction.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),

    #[error("unknown opcode group: {0}")]
    UnknownGroup(String),

    #[error("bad register: {0}")]
    BadRegister(String),

    #[error("bad immediate: {0}")]
    BadImmediate(String),

    #[error("bad operands in `{instruction}`: {detail}")]
    BadOperand { instruction: String, detail: String },

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ModelError>,
    },

    #[error("unsupported bit width: {0} (must be 1..=64)")]
    BadBitWidth(u32),

    #[error("register count {0} out of range (must be 1..=64)")]
    BadRegisterCount(usize),
}

impl ModelError {
    pub fn at_line(self, line: usize) -> ModelError {
        ModelError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}

/// Errors raised by the simulators.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("cannot interpret synthesis hole `??` at instruction {0}")]
    UnknownOpcode(usize),
}

/// Errors raised by the equivalence oracle. Solver "unknown" results are not
/// errors; they surface as a distinct verdict.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("failed to extract a counterexample from the solver model")]
    ModelExtraction,
}

/// Errors raised by search strategies and the parallel driver.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("reference program contains a synthesis hole")]
    HoleInReference,

    #[error("worker thread panicked")]
    WorkerPanic,
}
