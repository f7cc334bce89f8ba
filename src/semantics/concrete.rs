//! Concrete interpreter
//!
//! All arithmetic is finitized to the configured bit width. Register values
//! held in [`ConcreteState`] are always already finitized; the interpreter
//! maintains that invariant at every write.

use crate::error::SimError;
use crate::ir::{Instruction, Opcode, Operands};
use crate::machine::MachineConfig;

use super::state::ConcreteState;

/// Truncate a value to the machine word width.
pub fn finitize(config: &MachineConfig, value: u64) -> u64 {
    value & config.mask()
}

/// Reinterpret a finitized value as a signed number.
pub fn to_signed(config: &MachineConfig, value: u64) -> i64 {
    let shift = 64 - config.bits;
    ((value << shift) as i64) >> shift
}

/// Execute one instruction in place. `index` is only used for error reporting.
pub fn step(
    config: &MachineConfig,
    state: &mut ConcreteState,
    instr: &Instruction,
    index: usize,
) -> Result<(), SimError> {
    let mask = config.mask();
    let shamt_mask = (config.bits - 1) as u64;

    match (instr.opcode, instr.operands) {
        (op, Operands::Rrr { rd, rs1, rs2 }) => {
            let a = state.get_reg(rs1);
            let b = state.get_reg(rs2);
            let result = rrr_result(config, op, a, b);
            state.set_reg(rd, result & mask);
        }
        (op, Operands::Rri { rd, rs1, imm }) => {
            let a = state.get_reg(rs1);
            let b = finitize(config, imm as u64);
            let result = match op {
                Opcode::Addi => a.wrapping_add(b),
                Opcode::Slti => (to_signed(config, a) < to_signed(config, b)) as u64,
                Opcode::Sltiu => (a < b) as u64,
                Opcode::Andi => a & b,
                Opcode::Ori => a | b,
                Opcode::Xori => a ^ b,
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result & mask);
        }
        (op, Operands::RrShamt { rd, rs1, shamt }) => {
            let a = state.get_reg(rs1);
            let s = shamt as u64 & shamt_mask;
            let result = match op {
                Opcode::Slli => a << s,
                Opcode::Srli => a >> s,
                Opcode::Srai => arithmetic_shift_right(config, a, s),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result & mask);
        }
        (op, Operands::Rr { rd, rs }) => {
            let a = state.get_reg(rs);
            let result = match op {
                Opcode::Mv => a,
                Opcode::Not => !a,
                Opcode::Neg => 0u64.wrapping_sub(a),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result & mask);
        }
        (op, Operands::Ri { rd, imm }) => {
            let result = match op {
                Opcode::Li => imm as u64,
                Opcode::Lui => (imm as u64) << 12,
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, result & mask);
        }
        (op, Operands::Load { rd, base, offset }) => {
            let addr = finitize(config, state.get_reg(base).wrapping_add(offset as u64));
            let value = match op {
                Opcode::Lb => state.mem.load_signed(addr, 1),
                Opcode::Lbu => state.mem.load_unsigned(addr, 1),
                Opcode::Lh => state.mem.load_signed(addr, 2),
                Opcode::Lhu => state.mem.load_unsigned(addr, 2),
                Opcode::Lw => state.mem.load_signed(addr, 4),
                _ => unreachable!("operand shape checked at construction"),
            };
            state.set_reg(rd, value & mask);
        }
        (op, Operands::Store { src, base, offset }) => {
            let addr = finitize(config, state.get_reg(base).wrapping_add(offset as u64));
            let value = state.get_reg(src);
            let width = match op {
                Opcode::Sb => 1,
                Opcode::Sh => 2,
                Opcode::Sw => 4,
                _ => unreachable!("operand shape checked at construction"),
            };
            state.mem.store(addr, value, width);
        }
        (Opcode::Nop, Operands::Nullary) => {}
        (Opcode::Unknown, _) => return Err(SimError::UnknownOpcode(index)),
        (op, ops) => unreachable!("opcode {op} with operand shape {ops:?}"),
    }
    Ok(())
}

fn rrr_result(config: &MachineConfig, op: Opcode, a: u64, b: u64) -> u64 {
    let mask = config.mask();
    let shamt_mask = (config.bits - 1) as u64;
    let bits = config.bits;
    match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Sll => a << (b & shamt_mask),
        Opcode::Srl => a >> (b & shamt_mask),
        Opcode::Sra => arithmetic_shift_right(config, a, b & shamt_mask),
        Opcode::Slt => (to_signed(config, a) < to_signed(config, b)) as u64,
        Opcode::Sltu => (a < b) as u64,
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::Mulh => {
            let product = to_signed(config, a) as i128 * to_signed(config, b) as i128;
            (product >> bits) as u64
        }
        Opcode::Mulhu => {
            let product = a as u128 * b as u128;
            (product >> bits) as u64
        }
        Opcode::Mulhsu => {
            let product = to_signed(config, a) as i128 * b as i128;
            (product >> bits) as u64
        }
        Opcode::Div => {
            let (sa, sb) = (to_signed(config, a), to_signed(config, b));
            if sb == 0 {
                mask
            } else if sa == min_signed(config) && sb == -1 {
                a
            } else {
                (sa / sb) as u64
            }
        }
        Opcode::Divu => {
            if b == 0 {
                mask
            } else {
                a / b
            }
        }
        Opcode::Rem => {
            let (sa, sb) = (to_signed(config, a), to_signed(config, b));
            if sb == 0 {
                a
            } else if sa == min_signed(config) && sb == -1 {
                0
            } else {
                (sa % sb) as u64
            }
        }
        Opcode::Remu => {
            if b == 0 {
                a
            } else {
                a % b
            }
        }
        _ => unreachable!("operand shape checked at construction"),
    }
}

/// Arithmetic shift right via logical shifts only:
/// `asr(x, s) = ((x ^ m) >> s) - (m >> s)` where `m` is the sign bit mask.
/// The same composition is used symbolically so both simulators share one
/// definition of the operation.
pub fn arithmetic_shift_right(config: &MachineConfig, x: u64, s: u64) -> u64 {
    let m = config.sign_bit();
    let x = x & config.mask();
    ((x ^ m) >> s).wrapping_sub(m >> s) & config.mask()
}

fn min_signed(config: &MachineConfig) -> i64 {
    to_signed(config, config.sign_bit())
}

/// Run a whole program on a copy of `input` and return the final state.
pub fn interpret(
    config: &MachineConfig,
    input: &ConcreteState,
    program: &[Instruction],
) -> Result<ConcreteState, SimError> {
    let mut state = input.clone();
    for (index, instr) in program.iter().enumerate() {
        step(config, &mut state, instr, index)?;
    }
    Ok(state)
}

/// Run `program` on `input` and report whether its final state matches
/// `expected` on every live location. Exits early once a live register has
/// received its final write and already disagrees.
pub fn interpret_matches(
    config: &MachineConfig,
    input: &ConcreteState,
    program: &[Instruction],
    expected: &ConcreteState,
    live_out: &super::state::LiveOut,
) -> Result<bool, SimError> {
    // Index of the last write to each live register, if any.
    let mut last_write: Vec<Option<usize>> = vec![None; config.nregs];
    for (index, instr) in program.iter().enumerate() {
        if let Some(rd) = instr.destination() {
            if !rd.is_zero() {
                last_write[rd.index()] = Some(index);
            }
        }
    }

    let mut state = input.clone();
    for (index, instr) in program.iter().enumerate() {
        step(config, &mut state, instr, index)?;
        for reg in &live_out.regs {
            if last_write[reg.index()] == Some(index)
                && state.get_reg(*reg) != expected.get_reg(*reg)
            {
                return Ok(false);
            }
        }
    }
    Ok(live_out.states_agree(&state, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{encode, Reg};
    use crate::semantics::state::LiveOut;

    fn run(text: &str, init: &[(u8, u64)]) -> ConcreteState {
        let config = MachineConfig::default();
        let program = encode(text).unwrap();
        let mut state = ConcreteState::new(&config);
        for (reg, value) in init {
            state.set_reg(Reg(*reg), finitize(&config, *value));
        }
        interpret(&config, &state, &program).unwrap()
    }

    #[test]
    fn test_add_wraps() {
        let out = run("add x1, x2, x3", &[(2, 0xffff_ffff), (3, 1)]);
        assert_eq!(out.get_reg(Reg(1)), 0);
    }

    #[test]
    fn test_arithmetic_shift_right_negative() {
        let config = MachineConfig::default();
        // -8 >> 2 == -2
        assert_eq!(
            arithmetic_shift_right(&config, 0xffff_fff8, 2),
            0xffff_fffe
        );
        // -7 >> 1 == -4
        assert_eq!(
            arithmetic_shift_right(&config, 0xffff_fff9, 1),
            0xffff_fffc
        );
        // -1 >> 31 == -1
        assert_eq!(
            arithmetic_shift_right(&config, 0xffff_ffff, 31),
            0xffff_ffff
        );
        // 0x7fffffff >> 1 == 0x3fffffff
        assert_eq!(arithmetic_shift_right(&config, 0x7fff_ffff, 1), 0x3fff_ffff);
    }

    #[test]
    fn test_sra_matches_native_shift() {
        let config = MachineConfig::default();
        for x in [0u64, 1, 7, 0x8000_0000, 0xffff_fff8, 0x7fff_ffff] {
            for s in [0u64, 1, 2, 15, 31] {
                let expected = ((x as u32 as i32) >> s) as u32 as u64;
                assert_eq!(arithmetic_shift_right(&config, x, s), expected);
            }
        }
    }

    #[test]
    fn test_shift_amount_masked() {
        // 33 & 31 == 1
        let out = run("sll x1, x2, x3", &[(2, 1), (3, 33)]);
        assert_eq!(out.get_reg(Reg(1)), 2);
    }

    #[test]
    fn test_slt_signed_vs_unsigned() {
        let out = run("slt x1, x2, x3\nsltu x4, x2, x3", &[(2, 0xffff_ffff), (3, 1)]);
        assert_eq!(out.get_reg(Reg(1)), 1, "-1 < 1 signed");
        assert_eq!(out.get_reg(Reg(4)), 0, "0xffffffff > 1 unsigned");
    }

    #[test]
    fn test_div_by_zero_convention() {
        let out = run("div x1, x2, x3\nrem x4, x2, x3", &[(2, 100), (3, 0)]);
        assert_eq!(out.get_reg(Reg(1)), 0xffff_ffff);
        assert_eq!(out.get_reg(Reg(4)), 100);
    }

    #[test]
    fn test_div_overflow_convention() {
        // MIN / -1 yields MIN, remainder 0
        let out = run(
            "div x1, x2, x3\nrem x4, x2, x3",
            &[(2, 0x8000_0000), (3, 0xffff_ffff)],
        );
        assert_eq!(out.get_reg(Reg(1)), 0x8000_0000);
        assert_eq!(out.get_reg(Reg(4)), 0);
    }

    #[test]
    fn test_mulh() {
        let out = run("mulh x1, x2, x3\nmulhu x4, x2, x3", &[(2, 0xffff_ffff), (3, 2)]);
        // -1 * 2 = -2; high word is all ones
        assert_eq!(out.get_reg(Reg(1)), 0xffff_ffff);
        // 0xffffffff * 2 = 0x1_fffffffe; high word is 1
        assert_eq!(out.get_reg(Reg(4)), 1);
    }

    #[test]
    fn test_writes_to_x0_discarded() {
        let out = run("addi x0, x0, 7\nadd x1, x0, x0", &[]);
        assert_eq!(out.get_reg(Reg(0)), 0);
        assert_eq!(out.get_reg(Reg(1)), 0);
    }

    #[test]
    fn test_load_store_round_trip() {
        let out = run("sw x2, 8(x3)\nlw x1, 8(x3)\nlb x4, 11(x3)", &[(2, 0x80f1_1234), (3, 0x100)]);
        assert_eq!(out.get_reg(Reg(1)), 0x80f1_1234);
        // top byte 0x80, sign-extended then finitized
        assert_eq!(out.get_reg(Reg(4)), 0xffff_ff80);
    }

    #[test]
    fn test_pseudo_ops() {
        let out = run("li x1, -1\nnot x2, x1\nneg x3, x1\nmv x4, x1", &[]);
        assert_eq!(out.get_reg(Reg(1)), 0xffff_ffff);
        assert_eq!(out.get_reg(Reg(2)), 0);
        assert_eq!(out.get_reg(Reg(3)), 1);
        assert_eq!(out.get_reg(Reg(4)), 0xffff_ffff);
    }

    #[test]
    fn test_lui() {
        let out = run("lui x1, 16", &[]);
        assert_eq!(out.get_reg(Reg(1)), 16 << 12);
    }

    #[test]
    fn test_hole_is_fatal() {
        let config = MachineConfig::default();
        let program = encode("add x1, x2, x3\n??").unwrap();
        let state = ConcreteState::new(&config);
        let err = interpret(&config, &state, &program).unwrap_err();
        assert!(matches!(err, SimError::UnknownOpcode(1)));
    }

    #[test]
    fn test_interpret_matches_early_exit() {
        let config = MachineConfig::default();
        let program = encode("add x1, x2, x3\nadd x1, x1, x1").unwrap();
        let mut input = ConcreteState::new(&config);
        input.set_reg(Reg(2), 3);
        input.set_reg(Reg(3), 4);
        let expected = interpret(&config, &input, &program).unwrap();
        let live = LiveOut::regs([Reg(1)]);
        assert!(interpret_matches(&config, &input, &program, &expected, &live).unwrap());

        let other = encode("add x1, x2, x2\nadd x1, x1, x1").unwrap();
        assert!(!interpret_matches(&config, &input, &other, &expected, &live).unwrap());
    }

    #[test]
    fn test_reduced_width() {
        let config = MachineConfig::new(4, 32).unwrap();
        let program = encode("add x1, x2, x3").unwrap();
        let mut state = ConcreteState::new(&config);
        state.set_reg(Reg(2), 9);
        state.set_reg(Reg(3), 9);
        let out = interpret(&config, &state, &program).unwrap();
        assert_eq!(out.get_reg(Reg(1)), 2); // 18 mod 16
    }
}
