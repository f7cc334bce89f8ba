//! Mutation operators for the MCMC walk

use rand::Rng;

use crate::ir::{InstrClass, Instruction, Program};
use crate::search::candidate::InstructionSpace;
use crate::search::config::MutationWeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Resample the operands of one instruction, keeping its opcode
    Operand,
    /// Replace the opcode within its class, keeping operands
    Opcode,
    /// Swap two instructions
    Swap,
    /// Replace one instruction with a fresh random one
    Instruction,
}

pub struct Mutator {
    space: InstructionSpace,
    thresholds: [f64; 4],
}

impl Mutator {
    pub fn new(space: InstructionSpace, weights: MutationWeights) -> Self {
        Mutator {
            space,
            thresholds: weights.cumulative_thresholds(),
        }
    }

    pub fn space(&self) -> &InstructionSpace {
        &self.space
    }

    fn sample_kind<R: Rng>(&self, rng: &mut R) -> MutationKind {
        let u: f64 = rng.random();
        if u < self.thresholds[0] {
            MutationKind::Operand
        } else if u < self.thresholds[1] {
            MutationKind::Opcode
        } else if u < self.thresholds[2] {
            MutationKind::Swap
        } else {
            MutationKind::Instruction
        }
    }

    /// Produce a mutated copy of `program`. The original is left untouched so
    /// a rejected proposal costs nothing.
    pub fn mutate<R: Rng>(&self, rng: &mut R, program: &Program) -> Program {
        let mut next = program.clone();
        if next.is_empty() {
            return next;
        }
        let kind = self.sample_kind(rng);
        let pos = rng.random_range(0..next.len());
        match kind {
            MutationKind::Swap if next.len() >= 2 => {
                let other = rng.random_range(0..next.len());
                next.swap(pos, other);
            }
            MutationKind::Operand if self.mutable_in_place(&next[pos]) => {
                let class = next[pos].opcode.class();
                next[pos] = Instruction::new(
                    next[pos].opcode,
                    self.space.random_operands(rng, class),
                );
            }
            MutationKind::Opcode if self.mutable_in_place(&next[pos]) => {
                let class = next[pos].opcode.class();
                if let Some(op) =
                    self.space
                        .random_opcode_in_class(rng, class, next[pos].opcode)
                {
                    next[pos] = Instruction::new(op, next[pos].operands);
                } else {
                    next[pos] = self.space.random_instruction(rng);
                }
            }
            // Swap on a length-1 program and in-place mutations of memory
            // instructions degrade to full replacement.
            _ => {
                next[pos] = self.space.random_instruction(rng);
            }
        }
        next
    }

    /// Memory instructions are outside the synthesis space, so their operands
    /// and opcodes cannot be resampled from it.
    fn mutable_in_place(&self, instr: &Instruction) -> bool {
        !matches!(
            instr.opcode.class(),
            InstrClass::Load | InstrClass::Store | InstrClass::Nullary
        )
    }

    /// A fresh random program of the given length, for synthesis mode.
    pub fn random_program<R: Rng>(&self, rng: &mut R, length: usize) -> Program {
        (0..length)
            .map(|_| self.space.random_instruction(rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::encode;
    use crate::machine::{MachineModel, PoolConstraints};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn mutator() -> Mutator {
        let mut model = MachineModel::default();
        model
            .apply_constraints(PoolConstraints::new().with_groups(["slt-synthesis"]))
            .unwrap();
        Mutator::new(
            InstructionSpace::new(&model),
            MutationWeights::default(),
        )
    }

    #[test]
    fn test_mutation_preserves_length() {
        let m = mutator();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let program = encode("sub x1, x2, x3\nxor x4, x1, x2\nsltu x5, x2, x3").unwrap();
        for _ in 0..200 {
            assert_eq!(m.mutate(&mut rng, &program).len(), program.len());
        }
    }

    #[test]
    fn test_mutation_does_not_touch_original() {
        let m = mutator();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let program = encode("sub x1, x2, x3").unwrap();
        let copy = program.clone();
        for _ in 0..50 {
            let _ = m.mutate(&mut rng, &program);
        }
        assert_eq!(program, copy);
    }

    #[test]
    fn test_mutations_eventually_change_something() {
        let m = mutator();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let program = encode("sub x1, x2, x3\nxor x4, x1, x2").unwrap();
        let changed = (0..100).any(|_| m.mutate(&mut rng, &program) != program);
        assert!(changed);
    }

    #[test]
    fn test_random_program_length() {
        let m = mutator();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        assert_eq!(m.random_program(&mut rng, 4).len(), 4);
        assert!(m.random_program(&mut rng, 0).is_empty());
    }
}
