//! Assembly text encoding and decoding
//!
//! A program is one instruction per line. `#` starts a comment, blank lines
//! are skipped, and `??` encodes a synthesis hole. `encode` and `decode` are
//! exact inverses on every well-formed program.

use crate::error::ModelError;

use super::instructions::{Instruction, Opcode, Program};
use super::types::{InstrClass, Operands, Reg};

/// Parse assembly text into a program.
pub fn encode(text: &str) -> Result<Program, ModelError> {
    let mut program = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = match raw.find('#') {
            Some(i) => &raw[..i],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let instr = parse_line(line).map_err(|e| e.at_line(lineno + 1))?;
        program.push(instr);
    }
    Ok(program)
}

/// Render a program back to assembly text, one instruction per line.
pub fn decode(program: &[Instruction]) -> String {
    let mut out = String::new();
    for instr in program {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}

fn parse_line(line: &str) -> Result<Instruction, ModelError> {
    let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
        Some((m, r)) => (m, r.trim()),
        None => (line, ""),
    };
    let opcode = Opcode::from_mnemonic(mnemonic)
        .ok_or_else(|| ModelError::UnknownMnemonic(mnemonic.to_string()))?;

    let args: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    let operands = match opcode.class() {
        InstrClass::Rrr => {
            let [rd, rs1, rs2] = expect_args::<3>(line, &args)?;
            Operands::Rrr {
                rd: parse_reg(rd)?,
                rs1: parse_reg(rs1)?,
                rs2: parse_reg(rs2)?,
            }
        }
        InstrClass::Rri => {
            let [rd, rs1, imm] = expect_args::<3>(line, &args)?;
            Operands::Rri {
                rd: parse_reg(rd)?,
                rs1: parse_reg(rs1)?,
                imm: parse_imm(imm)?,
            }
        }
        InstrClass::RrShamt => {
            let [rd, rs1, shamt] = expect_args::<3>(line, &args)?;
            let shamt = parse_imm(shamt)?;
            if !(0..64).contains(&shamt) {
                return Err(ModelError::BadOperand {
                    instruction: line.to_string(),
                    detail: format!("shift amount out of range: {shamt}"),
                });
            }
            Operands::RrShamt {
                rd: parse_reg(rd)?,
                rs1: parse_reg(rs1)?,
                shamt: shamt as u32,
            }
        }
        InstrClass::Rr => {
            let [rd, rs] = expect_args::<2>(line, &args)?;
            Operands::Rr {
                rd: parse_reg(rd)?,
                rs: parse_reg(rs)?,
            }
        }
        InstrClass::Ri => {
            let [rd, imm] = expect_args::<2>(line, &args)?;
            Operands::Ri {
                rd: parse_reg(rd)?,
                imm: parse_imm(imm)?,
            }
        }
        InstrClass::Load => {
            let [rd, addr] = expect_args::<2>(line, &args)?;
            let (offset, base) = parse_mem_operand(line, addr)?;
            Operands::Load {
                rd: parse_reg(rd)?,
                base,
                offset,
            }
        }
        InstrClass::Store => {
            let [src, addr] = expect_args::<2>(line, &args)?;
            let (offset, base) = parse_mem_operand(line, addr)?;
            Operands::Store {
                src: parse_reg(src)?,
                base,
                offset,
            }
        }
        InstrClass::Nullary => {
            if !args.is_empty() {
                return Err(ModelError::BadOperand {
                    instruction: line.to_string(),
                    detail: format!("expected no operands, got {}", args.len()),
                });
            }
            Operands::Nullary
        }
    };

    Ok(Instruction::new(opcode, operands))
}

fn expect_args<'a, const N: usize>(
    line: &str,
    args: &[&'a str],
) -> Result<[&'a str; N], ModelError> {
    <[&str; N]>::try_from(args.to_vec()).map_err(|_| ModelError::BadOperand {
        instruction: line.to_string(),
        detail: format!("expected {N} operands, got {}", args.len()),
    })
}

fn parse_reg(s: &str) -> Result<Reg, ModelError> {
    let digits = s
        .strip_prefix('x')
        .ok_or_else(|| ModelError::BadRegister(s.to_string()))?;
    let n: u8 = digits
        .parse()
        .map_err(|_| ModelError::BadRegister(s.to_string()))?;
    if n >= 64 {
        return Err(ModelError::BadRegister(s.to_string()));
    }
    Ok(Reg(n))
}

fn parse_imm(s: &str) -> Result<i64, ModelError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16)
            .map_err(|_| ModelError::BadImmediate(s.to_string()));
    }
    if let Some(hex) = s.strip_prefix("-0x").or_else(|| s.strip_prefix("-0X")) {
        return i64::from_str_radix(hex, 16)
            .map(|v| -v)
            .map_err(|_| ModelError::BadImmediate(s.to_string()));
    }
    s.parse()
        .map_err(|_| ModelError::BadImmediate(s.to_string()))
}

/// Parse `offset(base)`, e.g. `8(x2)` or `-4(x10)`.
fn parse_mem_operand(line: &str, s: &str) -> Result<(i64, Reg), ModelError> {
    let open = s.find('(').ok_or_else(|| ModelError::BadOperand {
        instruction: line.to_string(),
        detail: format!("expected offset(base), got {s}"),
    })?;
    let close = s.rfind(')').ok_or_else(|| ModelError::BadOperand {
        instruction: line.to_string(),
        detail: format!("unclosed memory operand: {s}"),
    })?;
    if close != s.len() - 1 || close <= open {
        return Err(ModelError::BadOperand {
            instruction: line.to_string(),
            detail: format!("malformed memory operand: {s}"),
        });
    }
    let offset = parse_imm(s[..open].trim())?;
    let base = parse_reg(s[open + 1..close].trim())?;
    Ok((offset, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) {
        let program = encode(text).unwrap();
        let rendered = decode(&program);
        let again = encode(&rendered).unwrap();
        assert_eq!(program, again);
    }

    #[test]
    fn test_basic_round_trip() {
        round_trip("add x1, x2, x3\naddi x4, x5, -12\nslli x6, x7, 3\n");
    }

    #[test]
    fn test_memory_syntax() {
        let program = encode("lw x1, 8(x2)\nsw x3, -4(x10)\n").unwrap();
        assert_eq!(
            program[0].operands,
            Operands::Load {
                rd: Reg(1),
                base: Reg(2),
                offset: 8
            }
        );
        assert_eq!(
            program[1].operands,
            Operands::Store {
                src: Reg(3),
                base: Reg(10),
                offset: -4
            }
        );
        round_trip("lw x1, 8(x2)\nsw x3, -4(x10)\n");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let program = encode("# preamble\n\nadd x1, x2, x3 # comment\n\n").unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(program[0].opcode, Opcode::Add);
    }

    #[test]
    fn test_hole_round_trips() {
        let program = encode("??\nadd x1, x2, x3\n").unwrap();
        assert_eq!(program[0].opcode, Opcode::Unknown);
        assert_eq!(decode(&program), "??\nadd x1, x2, x3\n");
    }

    #[test]
    fn test_hex_immediates() {
        let program = encode("andi x1, x2, 0xff\naddi x3, x4, -0x10\n").unwrap();
        assert_eq!(
            program[0].operands,
            Operands::Rri {
                rd: Reg(1),
                rs1: Reg(2),
                imm: 255
            }
        );
        assert_eq!(
            program[1].operands,
            Operands::Rri {
                rd: Reg(3),
                rs1: Reg(4),
                imm: -16
            }
        );
    }

    #[test]
    fn test_unknown_mnemonic_rejected() {
        assert!(matches!(
            encode("frobnicate x1, x2"),
            Err(ModelError::AtLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_wrong_arity_rejected() {
        assert!(encode("add x1, x2").is_err());
        assert!(encode("nop x1").is_err());
        assert!(encode("mv x1, x2, x3").is_err());
    }

    #[test]
    fn test_malformed_memory_rejected() {
        assert!(encode("lw x1, 8").is_err());
        assert!(encode("lw x1, 8(x2").is_err());
        assert!(encode("lw x1, (x2)8").is_err());
    }

    #[test]
    fn test_bad_register_rejected() {
        assert!(encode("add x1, y2, x3").is_err());
        assert!(encode("add x1, x99, x3").is_err());
    }
}
