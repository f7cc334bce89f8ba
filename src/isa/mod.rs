//! ISA capability trait and the RV32 instantiation
//!
//! The search strategies are generic over the pieces of an ISA they cannot
//! derive from the simulator alone: closed-form inverse semantics for the
//! backward enumeration pass and pairwise pruning of instruction sequences.

use crate::ir::Opcode;
use crate::machine::MachineConfig;
use crate::semantics::concrete::finitize;

/// Which operand of a binary operation is known when solving backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownOperand {
    /// The left operand is known; solve for the right.
    Lhs(u64),
    /// The right operand is known; solve for the left.
    Rhs(u64),
}

/// ISA-specific hooks consumed by the search strategies.
pub trait Isa: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve `op(a, b) == out` for the missing operand, when the opcode is
    /// invertible in closed form. Unary opcodes take [`KnownOperand::Lhs`]
    /// with a dummy value. Returns `None` for non-invertible opcodes; the
    /// caller falls back to enumerating the operand domain.
    fn invert(
        &self,
        config: &MachineConfig,
        op: Opcode,
        known: KnownOperand,
        out: u64,
    ) -> Option<u64>;

    /// Whether a two-instruction sequence can never appear in an optimal
    /// program and may be pruned from enumeration. Flag-less ISAs have no
    /// such pairs.
    fn prune_pair(&self, _first: Opcode, _second: Opcode) -> bool {
        false
    }
}

/// The RV32 base-plus-multiply ISA.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rv32;

impl Isa for Rv32 {
    fn name(&self) -> &'static str {
        "rv32"
    }

    fn invert(
        &self,
        config: &MachineConfig,
        op: Opcode,
        known: KnownOperand,
        out: u64,
    ) -> Option<u64> {
        let solved = match (op, known) {
            (Opcode::Add, KnownOperand::Lhs(a)) => out.wrapping_sub(a),
            (Opcode::Add, KnownOperand::Rhs(b)) => out.wrapping_sub(b),
            (Opcode::Sub, KnownOperand::Lhs(a)) => a.wrapping_sub(out),
            (Opcode::Sub, KnownOperand::Rhs(b)) => out.wrapping_add(b),
            (Opcode::Xor, KnownOperand::Lhs(a)) => out ^ a,
            (Opcode::Xor, KnownOperand::Rhs(b)) => out ^ b,
            (Opcode::Addi, KnownOperand::Rhs(imm)) => out.wrapping_sub(imm),
            (Opcode::Xori, KnownOperand::Rhs(imm)) => out ^ imm,
            (Opcode::Mv, _) => out,
            (Opcode::Not, _) => !out,
            (Opcode::Neg, _) => 0u64.wrapping_sub(out),
            _ => return None,
        };
        Some(finitize(config, solved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_inverse() {
        let config = MachineConfig::default();
        // out = a + b, solve for b
        let b = Rv32.invert(&config, Opcode::Add, KnownOperand::Lhs(7), 10);
        assert_eq!(b, Some(3));
        // wrapping case
        let b = Rv32.invert(&config, Opcode::Add, KnownOperand::Lhs(5), 3);
        assert_eq!(b, Some(0xffff_fffe));
    }

    #[test]
    fn test_sub_inverse_is_side_sensitive() {
        let config = MachineConfig::default();
        // out = a - b
        assert_eq!(
            Rv32.invert(&config, Opcode::Sub, KnownOperand::Lhs(10), 3),
            Some(7)
        );
        assert_eq!(
            Rv32.invert(&config, Opcode::Sub, KnownOperand::Rhs(3), 7),
            Some(10)
        );
    }

    #[test]
    fn test_unary_inverses() {
        let config = MachineConfig::default();
        assert_eq!(
            Rv32.invert(&config, Opcode::Not, KnownOperand::Lhs(0), 0),
            Some(0xffff_ffff)
        );
        assert_eq!(
            Rv32.invert(&config, Opcode::Neg, KnownOperand::Lhs(0), 5),
            Some(0xffff_fffb)
        );
        assert_eq!(
            Rv32.invert(&config, Opcode::Mv, KnownOperand::Lhs(0), 42),
            Some(42)
        );
    }

    #[test]
    fn test_non_invertible_opcodes() {
        let config = MachineConfig::default();
        assert_eq!(
            Rv32.invert(&config, Opcode::And, KnownOperand::Lhs(0), 0),
            None
        );
        assert_eq!(
            Rv32.invert(&config, Opcode::Mul, KnownOperand::Lhs(2), 6),
            None
        );
    }

    #[test]
    fn test_no_pruned_pairs() {
        assert!(!Rv32.prune_pair(Opcode::Add, Opcode::Sub));
    }
}
