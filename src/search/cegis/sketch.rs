//! Symbolic program sketch
//!
//! A sketch is a fixed number of slots, each with solver variables for the
//! opcode choice and the operands. Executing the sketch on a concrete test
//! input yields one bitvector per register, built from ITE chains over the
//! opcode and register-index variables; asserting that the live outputs equal
//! the reference outputs turns synthesis into a satisfiability query.
//!
//! The sketch space is pure register dataflow: memory and nullary opcodes are
//! not given slots. A nop slot is never needed because shorter lengths are
//! explored separately.

use z3::ast::{Bool, BV};

use crate::ir::{InstrClass, Instruction, Opcode, Operands, Reg};
use crate::machine::{CostModel, MachineConfig};
use crate::semantics::concrete::to_signed;
use crate::semantics::smt::arithmetic_shift_right;

const OP_SEL_BITS: u32 = 8;

/// Solver variables for one slot.
struct Slot {
    op: BV,
    rd: BV,
    rs1: BV,
    rs2: BV,
    imm: BV,
    shamt: BV,
}

pub struct Sketch {
    pool: Vec<Opcode>,
    slots: Vec<Slot>,
    config: MachineConfig,
}

impl Sketch {
    /// Build a sketch of `length` slots over the given opcodes. `tag` keeps
    /// variable names distinct across sketches in one process.
    pub fn new(config: &MachineConfig, pool: &[Opcode], length: usize, tag: &str) -> Self {
        let pool: Vec<Opcode> = pool
            .iter()
            .copied()
            .filter(|op| {
                !matches!(
                    op.class(),
                    InstrClass::Load | InstrClass::Store | InstrClass::Nullary
                )
            })
            .collect();
        let slots = (0..length)
            .map(|i| Slot {
                op: BV::new_const(format!("{tag}_s{i}_op"), OP_SEL_BITS),
                rd: BV::new_const(format!("{tag}_s{i}_rd"), OP_SEL_BITS),
                rs1: BV::new_const(format!("{tag}_s{i}_rs1"), OP_SEL_BITS),
                rs2: BV::new_const(format!("{tag}_s{i}_rs2"), OP_SEL_BITS),
                imm: BV::new_const(format!("{tag}_s{i}_imm"), config.bits),
                shamt: BV::new_const(format!("{tag}_s{i}_shamt"), config.bits),
            })
            .collect();
        Sketch {
            pool,
            slots,
            config: *config,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn length(&self) -> usize {
        self.slots.len()
    }

    /// Structural constraints: every selector within range, destinations
    /// never the zero register, shift amounts below the word width.
    pub fn well_formed(&self) -> Vec<Bool> {
        let mut constraints = Vec::new();
        let pool_size = BV::from_u64(self.pool.len() as u64, OP_SEL_BITS);
        let nregs = BV::from_u64(self.config.nregs as u64, OP_SEL_BITS);
        let zero = BV::from_u64(0, OP_SEL_BITS);
        let bits = BV::from_u64(self.config.bits as u64, self.config.bits);
        for slot in &self.slots {
            constraints.push(slot.op.bvult(&pool_size));
            constraints.push(slot.rd.bvult(&nregs));
            constraints.push(slot.rd.eq(&zero).not());
            constraints.push(slot.rs1.bvult(&nregs));
            constraints.push(slot.rs2.bvult(&nregs));
            constraints.push(slot.shamt.bvult(&bits));
        }
        constraints
    }

    /// Run the sketch on one register file, producing the final register
    /// file. Register 0 stays pinned to zero.
    pub fn execute(&self, input_regs: &[BV]) -> Vec<BV> {
        let mut regs = input_regs.to_vec();
        for slot in &self.slots {
            let a = self.read(&regs, &slot.rs1);
            let b = self.read(&regs, &slot.rs2);
            let result = self.slot_result(slot, &a, &b);
            let mut next = regs.clone();
            for (r, item) in next.iter_mut().enumerate().skip(1) {
                let is_rd = slot.rd.eq(&BV::from_u64(r as u64, OP_SEL_BITS));
                *item = is_rd.ite(&result, &regs[r]);
            }
            regs = next;
        }
        regs
    }

    /// ITE chain selecting a register by a symbolic index.
    fn read(&self, regs: &[BV], index: &BV) -> BV {
        let mut value = BV::from_u64(0, self.config.bits);
        for (r, reg) in regs.iter().enumerate().skip(1) {
            let matches = index.eq(&BV::from_u64(r as u64, OP_SEL_BITS));
            value = matches.ite(reg, &value);
        }
        value
    }

    /// ITE chain over the pool applying each opcode's semantics.
    fn slot_result(&self, slot: &Slot, a: &BV, b: &BV) -> BV {
        let config = &self.config;
        let bits = config.bits;
        let shamt_mask = BV::from_u64((bits - 1) as u64, bits);
        let mut result = BV::from_u64(0, bits);
        for (k, op) in self.pool.iter().enumerate() {
            let semantics = match op.class() {
                InstrClass::Rrr => binary_semantics(config, *op, a, b, &shamt_mask),
                InstrClass::Rri => binary_semantics(config, rri_base(*op), a, &slot.imm, &shamt_mask),
                InstrClass::RrShamt => {
                    let s = slot.shamt.bvand(&shamt_mask);
                    match op {
                        Opcode::Slli => a.bvshl(&s),
                        Opcode::Srli => a.bvlshr(&s),
                        Opcode::Srai => arithmetic_shift_right(config, a, &s),
                        _ => unreachable!("not a shift opcode"),
                    }
                }
                InstrClass::Rr => match op {
                    Opcode::Mv => a.clone(),
                    Opcode::Not => a.bvnot(),
                    Opcode::Neg => BV::from_u64(0, bits).bvsub(a),
                    _ => unreachable!("not a unary opcode"),
                },
                InstrClass::Ri => match op {
                    Opcode::Li => slot.imm.clone(),
                    Opcode::Lui => slot.imm.bvshl(&BV::from_u64(12, bits)),
                    _ => unreachable!("not an immediate opcode"),
                },
                InstrClass::Load | InstrClass::Store | InstrClass::Nullary => {
                    unreachable!("filtered out of the sketch pool")
                }
            };
            let selected = slot.op.eq(&BV::from_u64(k as u64, OP_SEL_BITS));
            result = selected.ite(&semantics, &result);
        }
        result
    }

    /// Symbolic cost of the sketch under the cost model.
    pub fn cost(&self, costs: &CostModel) -> BV {
        let mut total = BV::from_u64(0, 32);
        for slot in &self.slots {
            let mut slot_cost = BV::from_u64(0, 32);
            for (k, op) in self.pool.iter().enumerate() {
                let selected = slot.op.eq(&BV::from_u64(k as u64, OP_SEL_BITS));
                slot_cost = selected.ite(&BV::from_u64(costs.cost(*op), 32), &slot_cost);
            }
            total = total.bvadd(&slot_cost);
        }
        total
    }

    /// Decode a solver model into a concrete program.
    pub fn decode(&self, model: &z3::Model) -> Option<Vec<Instruction>> {
        let mut program = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let k = model.eval(&slot.op, true)?.as_u64()? as usize;
            let op = *self.pool.get(k)?;
            let rd = Reg(model.eval(&slot.rd, true)?.as_u64()? as u8);
            let rs1 = Reg(model.eval(&slot.rs1, true)?.as_u64()? as u8);
            let rs2 = Reg(model.eval(&slot.rs2, true)?.as_u64()? as u8);
            let imm = to_signed(
                &self.config,
                model.eval(&slot.imm, true)?.as_u64()? & self.config.mask(),
            );
            let shamt =
                (model.eval(&slot.shamt, true)?.as_u64()? & (self.config.bits - 1) as u64) as u32;
            let operands = match op.class() {
                InstrClass::Rrr => Operands::Rrr { rd, rs1, rs2 },
                InstrClass::Rri => Operands::Rri { rd, rs1, imm },
                InstrClass::RrShamt => Operands::RrShamt { rd, rs1, shamt },
                InstrClass::Rr => Operands::Rr { rd, rs: rs1 },
                InstrClass::Ri => Operands::Ri { rd, imm },
                InstrClass::Load | InstrClass::Store | InstrClass::Nullary => return None,
            };
            program.push(Instruction::new(op, operands));
        }
        Some(program)
    }
}

/// Shared binary bitvector semantics for R-type opcodes; I-type opcodes map
/// onto them with the immediate as the right operand.
fn binary_semantics(config: &MachineConfig, op: Opcode, a: &BV, b: &BV, shamt_mask: &BV) -> BV {
    let bits = config.bits;
    let one = BV::from_u64(1, bits);
    let zero = BV::from_u64(0, bits);
    match op {
        Opcode::Add => a.bvadd(b),
        Opcode::Sub => a.bvsub(b),
        Opcode::Sll => a.bvshl(&b.bvand(shamt_mask)),
        Opcode::Srl => a.bvlshr(&b.bvand(shamt_mask)),
        Opcode::Sra => arithmetic_shift_right(config, a, &b.bvand(shamt_mask)),
        Opcode::Slt => a.bvslt(b).ite(&one, &zero),
        Opcode::Sltu => a.bvult(b).ite(&one, &zero),
        Opcode::And => a.bvand(b),
        Opcode::Or => a.bvor(b),
        Opcode::Xor => a.bvxor(b),
        Opcode::Mul => a.bvmul(b),
        Opcode::Mulh => a
            .sign_ext(bits)
            .bvmul(&b.sign_ext(bits))
            .extract(2 * bits - 1, bits),
        Opcode::Mulhu => a
            .zero_ext(bits)
            .bvmul(&b.zero_ext(bits))
            .extract(2 * bits - 1, bits),
        Opcode::Mulhsu => a
            .sign_ext(bits)
            .bvmul(&b.zero_ext(bits))
            .extract(2 * bits - 1, bits),
        Opcode::Div => {
            let all_ones = BV::from_u64(config.mask(), bits);
            b.eq(&zero).ite(&all_ones, &a.bvsdiv(b))
        }
        Opcode::Divu => {
            let all_ones = BV::from_u64(config.mask(), bits);
            b.eq(&zero).ite(&all_ones, &a.bvudiv(b))
        }
        Opcode::Rem => b.eq(&zero).ite(a, &a.bvsrem(b)),
        Opcode::Remu => b.eq(&zero).ite(a, &a.bvurem(b)),
        _ => unreachable!("not a binary opcode"),
    }
}

/// The R-type opcode computing the same function as an I-type opcode.
fn rri_base(op: Opcode) -> Opcode {
    match op {
        Opcode::Addi => Opcode::Add,
        Opcode::Slti => Opcode::Slt,
        Opcode::Sltiu => Opcode::Sltu,
        Opcode::Andi => Opcode::And,
        Opcode::Ori => Opcode::Or,
        Opcode::Xori => Opcode::Xor,
        _ => unreachable!("not an I-type opcode"),
    }
}
