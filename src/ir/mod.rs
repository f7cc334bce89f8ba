//! Intermediate representation: registers, opcodes, instructions, assembly text

pub mod encoding;
pub mod instructions;
pub mod types;

pub use encoding::{decode, encode};
pub use instructions::{Instruction, Opcode, Program};
pub use types::{InstrClass, Operands, Reg};
