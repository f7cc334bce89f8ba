//! Register and operand types for the RV32 IR

use std::fmt;

/// A general-purpose register `x0`..`x{n-1}`.
///
/// `x0` is the hard-wired zero register: reads return 0 and writes are
/// discarded at the state boundary, not by the instruction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u8);

impl Reg {
    pub const ZERO: Reg = Reg(0);

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Instruction class: the operand shape shared by a group of opcodes.
///
/// Opcode mutation and sketch construction operate within a class, so two
/// opcodes of the same class are interchangeable without touching operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrClass {
    /// Register-register-register (`add x1, x2, x3`)
    Rrr,
    /// Register-register-immediate (`addi x1, x2, -5`)
    Rri,
    /// Register-register-shift-amount (`slli x1, x2, 3`)
    RrShamt,
    /// Register-register (`mv x1, x2`, `not x1, x2`)
    Rr,
    /// Register-immediate (`li x1, 7`, `lui x1, 16`)
    Ri,
    /// Memory load (`lw x1, 8(x2)`)
    Load,
    /// Memory store (`sw x1, 8(x2)`)
    Store,
    /// No operands (`nop`)
    Nullary,
}

/// Operand vector of an instruction, shaped by its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operands {
    Rrr { rd: Reg, rs1: Reg, rs2: Reg },
    Rri { rd: Reg, rs1: Reg, imm: i64 },
    RrShamt { rd: Reg, rs1: Reg, shamt: u32 },
    Rr { rd: Reg, rs: Reg },
    Ri { rd: Reg, imm: i64 },
    Load { rd: Reg, base: Reg, offset: i64 },
    Store { src: Reg, base: Reg, offset: i64 },
    Nullary,
}

impl Operands {
    pub fn class(&self) -> InstrClass {
        match self {
            Operands::Rrr { .. } => InstrClass::Rrr,
            Operands::Rri { .. } => InstrClass::Rri,
            Operands::RrShamt { .. } => InstrClass::RrShamt,
            Operands::Rr { .. } => InstrClass::Rr,
            Operands::Ri { .. } => InstrClass::Ri,
            Operands::Load { .. } => InstrClass::Load,
            Operands::Store { .. } => InstrClass::Store,
            Operands::Nullary => InstrClass::Nullary,
        }
    }

    /// The register this shape writes, if any.
    pub fn destination(&self) -> Option<Reg> {
        match self {
            Operands::Rrr { rd, .. }
            | Operands::Rri { rd, .. }
            | Operands::RrShamt { rd, .. }
            | Operands::Rr { rd, .. }
            | Operands::Ri { rd, .. }
            | Operands::Load { rd, .. } => Some(*rd),
            Operands::Store { .. } | Operands::Nullary => None,
        }
    }

    /// All registers this shape reads.
    pub fn sources(&self) -> Vec<Reg> {
        match self {
            Operands::Rrr { rs1, rs2, .. } => vec![*rs1, *rs2],
            Operands::Rri { rs1, .. } | Operands::RrShamt { rs1, .. } => vec![*rs1],
            Operands::Rr { rs, .. } => vec![*rs],
            Operands::Ri { .. } => vec![],
            Operands::Load { base, .. } => vec![*base],
            Operands::Store { src, base, .. } => vec![*src, *base],
            Operands::Nullary => vec![],
        }
    }
}
