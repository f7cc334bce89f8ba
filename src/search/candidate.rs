//! Candidate instruction space
//!
//! Enumerates and samples instructions over the active opcode pool and the
//! model's operand domains. Memory opcodes are excluded: synthesized code is
//! register-to-register dataflow, and programs that need loads or stores keep
//! them in the fixed prefix/postfix context instead.

use rand::Rng;

use crate::ir::{InstrClass, Instruction, Opcode, Operands, Reg};
use crate::machine::MachineModel;

/// Immediates worth trying by default: small constants and a byte mask.
const DEFAULT_IMMEDIATES: &[i64] = &[-2, -1, 0, 1, 2, 4, 8, 255];

#[derive(Debug, Clone)]
pub struct InstructionSpace {
    classes: Vec<(InstrClass, Vec<Opcode>)>,
    nregs: usize,
    imms: Vec<i64>,
    shamts: Vec<u32>,
}

impl InstructionSpace {
    pub fn new(model: &MachineModel) -> Self {
        let mut classes = Vec::new();
        for class in model.pool().classes() {
            if matches!(class, InstrClass::Load | InstrClass::Store) {
                continue;
            }
            let members = model.pool().class_members(class);
            if !members.is_empty() {
                classes.push((class, members));
            }
        }
        // nop is always samplable even when the pool drops it: the stochastic
        // walk relies on degrading a slot to nop to realize shorter programs.
        if !classes.iter().any(|(c, _)| *c == InstrClass::Nullary) {
            classes.push((InstrClass::Nullary, vec![Opcode::Nop]));
        }
        InstructionSpace {
            classes,
            nregs: model.config.nregs,
            imms: DEFAULT_IMMEDIATES.to_vec(),
            shamts: (1..model.config.bits).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn opcodes(&self) -> impl Iterator<Item = Opcode> + '_ {
        self.classes.iter().flat_map(|(_, ops)| ops.iter().copied())
    }

    pub fn immediates(&self) -> &[i64] {
        &self.imms
    }

    pub fn shift_amounts(&self) -> &[u32] {
        &self.shamts
    }

    pub fn registers(&self) -> impl Iterator<Item = Reg> {
        (0..self.nregs).map(|i| Reg(i as u8))
    }

    /// Destination registers: everything except the hard-wired zero.
    pub fn destinations(&self) -> impl Iterator<Item = Reg> {
        (1..self.nregs).map(|i| Reg(i as u8))
    }

    /// A different opcode of the same class, for the opcode mutation.
    pub fn random_opcode_in_class<R: Rng>(
        &self,
        rng: &mut R,
        class: InstrClass,
        current: Opcode,
    ) -> Option<Opcode> {
        let members = &self.classes.iter().find(|(c, _)| *c == class)?.1;
        let others: Vec<Opcode> = members.iter().copied().filter(|op| *op != current).collect();
        if others.is_empty() {
            None
        } else {
            Some(others[rng.random_range(0..others.len())])
        }
    }

    pub fn random_operands<R: Rng>(&self, rng: &mut R, class: InstrClass) -> Operands {
        let rd = Reg(rng.random_range(1..self.nregs) as u8);
        match class {
            InstrClass::Rrr => Operands::Rrr {
                rd,
                rs1: Reg(rng.random_range(0..self.nregs) as u8),
                rs2: Reg(rng.random_range(0..self.nregs) as u8),
            },
            InstrClass::Rri => Operands::Rri {
                rd,
                rs1: Reg(rng.random_range(0..self.nregs) as u8),
                imm: self.imms[rng.random_range(0..self.imms.len())],
            },
            InstrClass::RrShamt => Operands::RrShamt {
                rd,
                rs1: Reg(rng.random_range(0..self.nregs) as u8),
                shamt: self.shamts[rng.random_range(0..self.shamts.len())],
            },
            InstrClass::Rr => Operands::Rr {
                rd,
                rs: Reg(rng.random_range(0..self.nregs) as u8),
            },
            InstrClass::Ri => Operands::Ri {
                rd,
                imm: self.imms[rng.random_range(0..self.imms.len())],
            },
            InstrClass::Nullary => Operands::Nullary,
            InstrClass::Load | InstrClass::Store => {
                unreachable!("memory classes are excluded from the space")
            }
        }
    }

    pub fn random_instruction<R: Rng>(&self, rng: &mut R) -> Instruction {
        let (class, members) = &self.classes[rng.random_range(0..self.classes.len())];
        let opcode = members[rng.random_range(0..members.len())];
        Instruction::new(opcode, self.random_operands(rng, *class))
    }

    /// Every instruction in the space that reads only from `readable` and
    /// writes into `writable`. The enumerative strategy restricts both sets
    /// to keep the tables tractable.
    pub fn instructions_over(&self, readable: &[Reg], writable: &[Reg]) -> Vec<Instruction> {
        let mut out = Vec::new();
        for (class, members) in &self.classes {
            for opcode in members {
                match class {
                    InstrClass::Rrr => {
                        for rd in writable {
                            for rs1 in readable {
                                for rs2 in readable {
                                    if opcode.is_commutative() && rs2.0 < rs1.0 {
                                        continue;
                                    }
                                    out.push(Instruction::rrr(*opcode, *rd, *rs1, *rs2));
                                }
                            }
                        }
                    }
                    InstrClass::Rri => {
                        for rd in writable {
                            for rs1 in readable {
                                for imm in &self.imms {
                                    out.push(Instruction::rri(*opcode, *rd, *rs1, *imm));
                                }
                            }
                        }
                    }
                    InstrClass::RrShamt => {
                        for rd in writable {
                            for rs1 in readable {
                                for shamt in &self.shamts {
                                    out.push(Instruction::shift_imm(*opcode, *rd, *rs1, *shamt));
                                }
                            }
                        }
                    }
                    InstrClass::Rr => {
                        for rd in writable {
                            for rs in readable {
                                out.push(Instruction::rr(*opcode, *rd, *rs));
                            }
                        }
                    }
                    InstrClass::Ri => {
                        for rd in writable {
                            for imm in &self.imms {
                                out.push(Instruction::ri(*opcode, *rd, *imm));
                            }
                        }
                    }
                    InstrClass::Nullary => {}
                    InstrClass::Load | InstrClass::Store => {}
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{CostModel, MachineModel, PoolConstraints};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn space_for_groups(groups: &[&str]) -> InstructionSpace {
        let mut model = MachineModel::default();
        model
            .apply_constraints(PoolConstraints::new().with_groups(groups.iter().copied()))
            .unwrap();
        InstructionSpace::new(&model)
    }

    #[test]
    fn test_memory_opcodes_excluded() {
        let model = MachineModel::default();
        let space = InstructionSpace::new(&model);
        assert!(space.opcodes().all(|op| !op.accesses_memory()));
    }

    #[test]
    fn test_random_instructions_stay_in_pool() {
        let space = space_for_groups(&["and-synthesis"]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let instr = space.random_instruction(&mut rng);
            assert!(matches!(
                instr.opcode,
                Opcode::Not | Opcode::Or | Opcode::Sub | Opcode::Add | Opcode::Nop
            ));
            assert!(!instr.destination().unwrap_or(Reg(1)).is_zero());
        }
    }

    #[test]
    fn test_opcode_mutation_stays_in_class() {
        let space = space_for_groups(&["slt-synthesis"]);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..50 {
            if let Some(op) =
                space.random_opcode_in_class(&mut rng, InstrClass::Rrr, Opcode::Sub)
            {
                assert_ne!(op, Opcode::Sub);
                assert_eq!(op.class(), InstrClass::Rrr);
            }
        }
    }

    #[test]
    fn test_commutative_enumeration_deduplicates() {
        let space = space_for_groups(&["and-synthesis"]);
        let regs = [Reg(1), Reg(2)];
        let instrs = space.instructions_over(&regs, &[Reg(1)]);
        // add x1, x2, x1 is skipped because add x1, x1, x2 is kept
        assert!(instrs.contains(&Instruction::rrr(Opcode::Add, Reg(1), Reg(1), Reg(2))));
        assert!(!instrs.contains(&Instruction::rrr(Opcode::Add, Reg(1), Reg(2), Reg(1))));
        // sub is not commutative, both orders survive
        assert!(instrs.contains(&Instruction::rrr(Opcode::Sub, Reg(1), Reg(2), Reg(1))));
    }

    #[test]
    fn test_cost_1000_and_absent_from_space() {
        let costs = CostModel::new().with_cost(Opcode::And, 1000);
        let model = MachineModel::default().with_costs(costs).unwrap();
        let space = InstructionSpace::new(&model);
        assert!(space.opcodes().all(|op| op != Opcode::And));
    }
}
