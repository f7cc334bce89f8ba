//! Opcode table and instruction representation

use std::fmt;

use super::types::{InstrClass, Operands, Reg};

/// Every opcode the machine model knows, plus [`Opcode::Unknown`] which
/// stands for a synthesis hole (`??` in assembly text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // R-type
    Add,
    Sub,
    Sll,
    Srl,
    Sra,
    Slt,
    Sltu,
    And,
    Or,
    Xor,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    // I-type arithmetic
    Addi,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    // Immediate shifts
    Slli,
    Srli,
    Srai,
    // Loads
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    // Stores
    Sb,
    Sh,
    Sw,
    // Upper immediate
    Lui,
    // Pseudo-instructions
    Mv,
    Not,
    Neg,
    Li,
    Nop,
    /// Synthesis hole, printed `??`. Fatal when interpreted.
    Unknown,
}

impl Opcode {
    /// All real opcodes, in mnemonic table order. Excludes [`Opcode::Unknown`].
    pub const ALL: [Opcode; 41] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Sll,
        Opcode::Srl,
        Opcode::Sra,
        Opcode::Slt,
        Opcode::Sltu,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Mul,
        Opcode::Mulh,
        Opcode::Mulhsu,
        Opcode::Mulhu,
        Opcode::Div,
        Opcode::Divu,
        Opcode::Rem,
        Opcode::Remu,
        Opcode::Addi,
        Opcode::Slti,
        Opcode::Sltiu,
        Opcode::Andi,
        Opcode::Ori,
        Opcode::Xori,
        Opcode::Slli,
        Opcode::Srli,
        Opcode::Srai,
        Opcode::Lb,
        Opcode::Lbu,
        Opcode::Lh,
        Opcode::Lhu,
        Opcode::Lw,
        Opcode::Sb,
        Opcode::Sh,
        Opcode::Sw,
        Opcode::Lui,
        Opcode::Mv,
        Opcode::Not,
        Opcode::Neg,
        Opcode::Li,
        Opcode::Nop,
    ];

    pub fn class(&self) -> InstrClass {
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Sll
            | Opcode::Srl
            | Opcode::Sra
            | Opcode::Slt
            | Opcode::Sltu
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Mul
            | Opcode::Mulh
            | Opcode::Mulhsu
            | Opcode::Mulhu
            | Opcode::Div
            | Opcode::Divu
            | Opcode::Rem
            | Opcode::Remu => InstrClass::Rrr,
            Opcode::Addi
            | Opcode::Slti
            | Opcode::Sltiu
            | Opcode::Andi
            | Opcode::Ori
            | Opcode::Xori => InstrClass::Rri,
            Opcode::Slli | Opcode::Srli | Opcode::Srai => InstrClass::RrShamt,
            Opcode::Lb | Opcode::Lbu | Opcode::Lh | Opcode::Lhu | Opcode::Lw => InstrClass::Load,
            Opcode::Sb | Opcode::Sh | Opcode::Sw => InstrClass::Store,
            Opcode::Lui | Opcode::Li => InstrClass::Ri,
            Opcode::Mv | Opcode::Not | Opcode::Neg => InstrClass::Rr,
            Opcode::Nop | Opcode::Unknown => InstrClass::Nullary,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Sll => "sll",
            Opcode::Srl => "srl",
            Opcode::Sra => "sra",
            Opcode::Slt => "slt",
            Opcode::Sltu => "sltu",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Mul => "mul",
            Opcode::Mulh => "mulh",
            Opcode::Mulhsu => "mulhsu",
            Opcode::Mulhu => "mulhu",
            Opcode::Div => "div",
            Opcode::Divu => "divu",
            Opcode::Rem => "rem",
            Opcode::Remu => "remu",
            Opcode::Addi => "addi",
            Opcode::Slti => "slti",
            Opcode::Sltiu => "sltiu",
            Opcode::Andi => "andi",
            Opcode::Ori => "ori",
            Opcode::Xori => "xori",
            Opcode::Slli => "slli",
            Opcode::Srli => "srli",
            Opcode::Srai => "srai",
            Opcode::Lb => "lb",
            Opcode::Lbu => "lbu",
            Opcode::Lh => "lh",
            Opcode::Lhu => "lhu",
            Opcode::Lw => "lw",
            Opcode::Sb => "sb",
            Opcode::Sh => "sh",
            Opcode::Sw => "sw",
            Opcode::Lui => "lui",
            Opcode::Mv => "mv",
            Opcode::Not => "not",
            Opcode::Neg => "neg",
            Opcode::Li => "li",
            Opcode::Nop => "nop",
            Opcode::Unknown => "??",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        if s == "??" {
            return Some(Opcode::Unknown);
        }
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == s)
    }

    /// Whether swapping the two source registers preserves semantics.
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Mul
        )
    }

    /// Whether this opcode touches memory.
    pub fn accesses_memory(&self) -> bool {
        matches!(self.class(), InstrClass::Load | InstrClass::Store)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One instruction: an opcode and operands whose shape matches its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Operands,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Operands) -> Self {
        Instruction { opcode, operands }
    }

    pub fn nop() -> Self {
        Instruction {
            opcode: Opcode::Nop,
            operands: Operands::Nullary,
        }
    }

    pub fn hole() -> Self {
        Instruction {
            opcode: Opcode::Unknown,
            operands: Operands::Nullary,
        }
    }

    pub fn rrr(opcode: Opcode, rd: Reg, rs1: Reg, rs2: Reg) -> Self {
        Instruction {
            opcode,
            operands: Operands::Rrr { rd, rs1, rs2 },
        }
    }

    pub fn rri(opcode: Opcode, rd: Reg, rs1: Reg, imm: i64) -> Self {
        Instruction {
            opcode,
            operands: Operands::Rri { rd, rs1, imm },
        }
    }

    pub fn shift_imm(opcode: Opcode, rd: Reg, rs1: Reg, shamt: u32) -> Self {
        Instruction {
            opcode,
            operands: Operands::RrShamt { rd, rs1, shamt },
        }
    }

    pub fn rr(opcode: Opcode, rd: Reg, rs: Reg) -> Self {
        Instruction {
            opcode,
            operands: Operands::Rr { rd, rs },
        }
    }

    pub fn ri(opcode: Opcode, rd: Reg, imm: i64) -> Self {
        Instruction {
            opcode,
            operands: Operands::Ri { rd, imm },
        }
    }

    pub fn destination(&self) -> Option<Reg> {
        self.operands.destination()
    }

    pub fn sources(&self) -> Vec<Reg> {
        self.operands.sources()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operands {
            Operands::Rrr { rd, rs1, rs2 } => {
                write!(f, "{} {}, {}, {}", self.opcode, rd, rs1, rs2)
            }
            Operands::Rri { rd, rs1, imm } => {
                write!(f, "{} {}, {}, {}", self.opcode, rd, rs1, imm)
            }
            Operands::RrShamt { rd, rs1, shamt } => {
                write!(f, "{} {}, {}, {}", self.opcode, rd, rs1, shamt)
            }
            Operands::Rr { rd, rs } => write!(f, "{} {}, {}", self.opcode, rd, rs),
            Operands::Ri { rd, imm } => write!(f, "{} {}, {}", self.opcode, rd, imm),
            Operands::Load { rd, base, offset } => {
                write!(f, "{} {}, {}({})", self.opcode, rd, offset, base)
            }
            Operands::Store { src, base, offset } => {
                write!(f, "{} {}, {}({})", self.opcode, src, offset, base)
            }
            Operands::Nullary => f.write_str(self.opcode.mnemonic()),
        }
    }
}

/// A straight-line program.
pub type Program = Vec<Instruction>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_table_is_complete_and_distinct() {
        let mut mnemonics: Vec<&str> = Opcode::ALL.iter().map(|op| op.mnemonic()).collect();
        assert_eq!(mnemonics.len(), 41);
        mnemonics.sort_unstable();
        mnemonics.dedup();
        assert_eq!(mnemonics.len(), 41);
    }

    #[test]
    fn test_mnemonic_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("??"), Some(Opcode::Unknown));
        assert_eq!(Opcode::from_mnemonic("bogus"), None);
    }

    #[test]
    fn test_commutativity() {
        assert!(Opcode::Add.is_commutative());
        assert!(Opcode::Xor.is_commutative());
        assert!(!Opcode::Sub.is_commutative());
        assert!(!Opcode::Sll.is_commutative());
    }

    #[test]
    fn test_display_formats() {
        let add = Instruction::rrr(Opcode::Add, Reg(1), Reg(2), Reg(3));
        assert_eq!(format!("{add}"), "add x1, x2, x3");

        let addi = Instruction::rri(Opcode::Addi, Reg(1), Reg(2), -5);
        assert_eq!(format!("{addi}"), "addi x1, x2, -5");

        let lw = Instruction::new(
            Opcode::Lw,
            Operands::Load {
                rd: Reg(1),
                base: Reg(2),
                offset: 8,
            },
        );
        assert_eq!(format!("{lw}"), "lw x1, 8(x2)");

        let sw = Instruction::new(
            Opcode::Sw,
            Operands::Store {
                src: Reg(3),
                base: Reg(2),
                offset: 8,
            },
        );
        assert_eq!(format!("{sw}"), "sw x3, 8(x2)");

        assert_eq!(format!("{}", Instruction::nop()), "nop");
        assert_eq!(format!("{}", Instruction::hole()), "??");
    }
}
