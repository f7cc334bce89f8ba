//! Symbolic simulator over z3 bitvectors
//!
//! Mirrors the concrete interpreter instruction for instruction. Every
//! operation is expressed as pure bitvector dataflow; in particular the
//! arithmetic shift right uses the same xor/subtract composition as the
//! concrete backend instead of a dedicated solver primitive.

use z3::ast::{Array, Bool, BV};
use z3::Sort;

use crate::error::SimError;
use crate::ir::{Instruction, Opcode, Operands, Reg};
use crate::machine::MachineConfig;

use super::state::{ConcreteState, LiveOut};

/// Symbolic machine state: one bitvector per register and an array from
/// addresses to bytes. Register 0 is pinned to the zero bitvector.
#[derive(Debug, Clone)]
pub struct SymbolicState {
    regs: Vec<BV>,
    pub mem: Array,
    /// Byte addresses touched by loads and stores, as expressions over the
    /// input state. Counterexample extraction evaluates the initial memory
    /// at these to reconstruct a concrete witness.
    pub accessed: Vec<BV>,
    bits: u32,
}

impl SymbolicState {
    /// Fresh unconstrained state. `prefix` namespaces the solver variables so
    /// two states can live in one query.
    pub fn new_symbolic(config: &MachineConfig, prefix: &str) -> Self {
        let bits = config.bits;
        let mut regs = Vec::with_capacity(config.nregs);
        regs.push(BV::from_u64(0, bits));
        for i in 1..config.nregs {
            regs.push(BV::new_const(format!("{prefix}_x{i}"), bits));
        }
        let mem = Array::new_const(
            format!("{prefix}_mem"),
            &Sort::bitvector(bits),
            &Sort::bitvector(8),
        );
        SymbolicState {
            regs,
            mem,
            accessed: Vec::new(),
            bits,
        }
    }

    /// Encode a concrete state as constants.
    pub fn from_concrete(config: &MachineConfig, state: &ConcreteState) -> Self {
        let bits = config.bits;
        let regs = state
            .regs()
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if i == 0 {
                    BV::from_u64(0, bits)
                } else {
                    BV::from_u64(*v, bits)
                }
            })
            .collect();
        let mut mem = Array::const_array(&Sort::bitvector(bits), &BV::from_u64(0, 8));
        for (addr, byte) in state.mem.bytes() {
            mem = mem.store(
                &BV::from_u64(addr, bits),
                &BV::from_u64(byte as u64, 8),
            );
        }
        SymbolicState {
            regs,
            mem,
            accessed: Vec::new(),
            bits,
        }
    }

    /// Wrap an existing register file. Memory starts out all zeroes; callers
    /// must not execute memory opcodes on such a state unless that is what
    /// they mean.
    pub fn from_regs(config: &MachineConfig, mut regs: Vec<BV>) -> Self {
        regs[0] = BV::from_u64(0, config.bits);
        let mem = Array::const_array(&Sort::bitvector(config.bits), &BV::from_u64(0, 8));
        SymbolicState {
            regs,
            mem,
            accessed: Vec::new(),
            bits: config.bits,
        }
    }

    pub fn get_reg(&self, reg: Reg) -> BV {
        if reg.is_zero() {
            BV::from_u64(0, self.bits)
        } else {
            self.regs[reg.index()].clone()
        }
    }

    pub fn set_reg(&mut self, reg: Reg, value: BV) {
        if !reg.is_zero() {
            self.regs[reg.index()] = value;
        }
    }

    fn load_byte(&self, addr: &BV) -> BV {
        self.mem
            .select(addr)
            .as_bv()
            .unwrap_or_else(|| BV::from_u64(0, 8))
    }
}

/// Execute one instruction symbolically. `index` is only used for error
/// reporting on synthesis holes.
pub fn step(
    config: &MachineConfig,
    state: &mut SymbolicState,
    instr: &Instruction,
    index: usize,
) -> Result<(), SimError> {
    let bits = config.bits;
    let shamt_mask = BV::from_u64((bits - 1) as u64, bits);

    match (instr.opcode, instr.operands) {
        (op, Operands::Rrr { rd, rs1, rs2 }) => {
            let a = state.get_reg(rs1);
            let b = state.get_reg(rs2);
            let result = rrr_result(config, op, &a, &b, &shamt_mask);
            state.set_reg(rd, result);
        }
        (op, Operands::Rri { rd, rs1, imm }) => {
            let a = state.get_reg(rs1);
            let b = BV::from_u64(imm as u64 & config.mask(), bits);
            let result = match op {
                Opcode::Addi => a.bvadd(&b),
                Opcode::Slti => bool_to_word(config, &a.bvslt(&b)),
                Opcode::Sltiu => bool_to_word(config, &a.bvult(&b)),
                Opcode::Andi => a.bvand(&b),
                Opcode::Ori => a.bvor(&b),
                Opcode::Xori => a.bvxor(&b),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result);
        }
        (op, Operands::RrShamt { rd, rs1, shamt }) => {
            let a = state.get_reg(rs1);
            let s = BV::from_u64(shamt as u64 & (bits - 1) as u64, bits);
            let result = match op {
                Opcode::Slli => a.bvshl(&s),
                Opcode::Srli => a.bvlshr(&s),
                Opcode::Srai => arithmetic_shift_right(config, &a, &s),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result);
        }
        (op, Operands::Rr { rd, rs }) => {
            let a = state.get_reg(rs);
            let result = match op {
                Opcode::Mv => a,
                Opcode::Not => a.bvnot(),
                Opcode::Neg => BV::from_u64(0, bits).bvsub(&a),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result);
        }
        (op, Operands::Ri { rd, imm }) => {
            let value = match op {
                Opcode::Li => imm as u64 & config.mask(),
                Opcode::Lui => ((imm as u64) << 12) & config.mask(),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, BV::from_u64(value, bits));
        }
        (op, Operands::Load { rd, base, offset }) => {
            let addr = state
                .get_reg(base)
                .bvadd(&BV::from_u64(offset as u64 & config.mask(), bits));
            let (width, signed) = match op {
                Opcode::Lb => (1, true),
                Opcode::Lbu => (1, false),
                Opcode::Lh => (2, true),
                Opcode::Lhu => (2, false),
                Opcode::Lw => (4, true),
                _ => unreachable!("operand shape checked at construction"),
            };
            for i in 0..width {
                state
                    .accessed
                    .push(addr.bvadd(&BV::from_u64(i as u64, bits)));
            }
            let value = load_value(config, state, &addr, width, signed);
            state.set_reg(rd, value);
        }
        (op, Operands::Store { src, base, offset }) => {
            let addr = state
                .get_reg(base)
                .bvadd(&BV::from_u64(offset as u64 & config.mask(), bits));
            let value = state.get_reg(src);
            let width = match op {
                Opcode::Sb => 1,
                Opcode::Sh => 2,
                Opcode::Sw => 4,
                _ => unreachable!("operand shape checked at construction"),
            };
            for i in 0..width {
                let byte_addr = addr.bvadd(&BV::from_u64(i as u64, bits));
                let byte = value.extract(8 * i + 7, 8 * i);
                state.accessed.push(byte_addr.clone());
                state.mem = state.mem.store(&byte_addr, &byte);
            }
        }
        (Opcode::Nop, Operands::Nullary) => {}
        (Opcode::Unknown, _) => return Err(SimError::UnknownOpcode(index)),
        (op, ops) => unreachable!("opcode {op} with operand shape {ops:?}"),
    }
    Ok(())
}

fn rrr_result(config: &MachineConfig, op: Opcode, a: &BV, b: &BV, shamt_mask: &BV) -> BV {
    let bits = config.bits;
    match op {
        Opcode::Add => a.bvadd(b),
        Opcode::Sub => a.bvsub(b),
        Opcode::Sll => a.bvshl(&b.bvand(shamt_mask)),
        Opcode::Srl => a.bvlshr(&b.bvand(shamt_mask)),
        Opcode::Sra => arithmetic_shift_right(config, a, &b.bvand(shamt_mask)),
        Opcode::Slt => bool_to_word(config, &a.bvslt(b)),
        Opcode::Sltu => bool_to_word(config, &a.bvult(b)),
        Opcode::And => a.bvand(b),
        Opcode::Or => a.bvor(b),
        Opcode::Xor => a.bvxor(b),
        Opcode::Mul => a.bvmul(b),
        Opcode::Mulh => {
            let wide = a.sign_ext(bits).bvmul(&b.sign_ext(bits));
            wide.extract(2 * bits - 1, bits)
        }
        Opcode::Mulhu => {
            let wide = a.zero_ext(bits).bvmul(&b.zero_ext(bits));
            wide.extract(2 * bits - 1, bits)
        }
        Opcode::Mulhsu => {
            let wide = a.sign_ext(bits).bvmul(&b.zero_ext(bits));
            wide.extract(2 * bits - 1, bits)
        }
        Opcode::Div => {
            // Division by zero yields all ones; bvsdiv already wraps MIN / -1.
            let zero = BV::from_u64(0, bits);
            let all_ones = BV::from_u64(config.mask(), bits);
            b.eq(&zero).ite(&all_ones, &a.bvsdiv(b))
        }
        Opcode::Divu => {
            let zero = BV::from_u64(0, bits);
            let all_ones = BV::from_u64(config.mask(), bits);
            b.eq(&zero).ite(&all_ones, &a.bvudiv(b))
        }
        Opcode::Rem => {
            let zero = BV::from_u64(0, bits);
            b.eq(&zero).ite(a, &a.bvsrem(b))
        }
        Opcode::Remu => {
            let zero = BV::from_u64(0, bits);
            b.eq(&zero).ite(a, &a.bvurem(b))
        }
        _ => unreachable!("operand shape checked at construction"),
    }
}

/// Arithmetic shift right as pure dataflow over logical shifts:
/// `asr(x, s) = ((x ^ m) >> s) - (m >> s)` with `m` the sign bit mask.
pub fn arithmetic_shift_right(config: &MachineConfig, x: &BV, s: &BV) -> BV {
    let m = BV::from_u64(config.sign_bit(), config.bits);
    x.bvxor(&m).bvlshr(s).bvsub(&m.bvlshr(s))
}

fn bool_to_word(config: &MachineConfig, cond: &Bool) -> BV {
    cond.ite(
        &BV::from_u64(1, config.bits),
        &BV::from_u64(0, config.bits),
    )
}

fn load_value(
    config: &MachineConfig,
    state: &SymbolicState,
    addr: &BV,
    width: u32,
    signed: bool,
) -> BV {
    let bits = config.bits;
    let mut raw = state.load_byte(addr);
    for i in 1..width {
        let byte = state.load_byte(&addr.bvadd(&BV::from_u64(i as u64, bits)));
        raw = byte.concat(&raw);
    }
    let raw_bits = 8 * width;
    if raw_bits == bits {
        raw
    } else if raw_bits < bits {
        if signed {
            raw.sign_ext(bits - raw_bits)
        } else {
            raw.zero_ext(bits - raw_bits)
        }
    } else {
        raw.extract(bits - 1, 0)
    }
}

/// Run a whole program, threading the symbolic state through each step.
pub fn interpret(
    config: &MachineConfig,
    input: &SymbolicState,
    program: &[Instruction],
) -> Result<SymbolicState, SimError> {
    let mut state = input.clone();
    for (index, instr) in program.iter().enumerate() {
        step(config, &mut state, instr, index)?;
    }
    Ok(state)
}

/// A constraint that two final states disagree on some observed location.
/// Asserting this and checking for SAT asks the solver for a counterexample.
pub fn states_differ(live_out: &LiveOut, a: &SymbolicState, b: &SymbolicState) -> Bool {
    let mut differ = Bool::from_bool(false);
    for reg in &live_out.regs {
        let mismatch = a.get_reg(*reg).eq(&b.get_reg(*reg)).not();
        differ = Bool::or(&[&differ, &mismatch]);
    }
    if live_out.mem {
        let mem_mismatch = a.mem.eq(&b.mem).not();
        differ = Bool::or(&[&differ, &mem_mismatch]);
    }
    differ
}
