//! Backward execution over partially-known states
//!
//! The backward half of the bidirectional search runs instructions in
//! reverse: given what a register file must look like *after* an
//! instruction, compute what it must have looked like *before*. Invertible
//! opcodes solve for the missing operand in closed form via
//! [`Isa::invert`]; the rest enumerate the reduced-width value domain.

use crate::ir::{Instruction, Operands, Reg};
use crate::isa::{Isa, KnownOperand};
use crate::machine::MachineConfig;
use crate::semantics::concrete::{self, finitize};
use crate::semantics::ConcreteState;

/// A register file where some values are pinned and the rest are free.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialState {
    regs: Vec<Option<u64>>,
}

impl PartialState {
    pub fn unknown(nregs: usize) -> Self {
        let mut regs = vec![None; nregs];
        regs[0] = Some(0);
        PartialState { regs }
    }

    /// Pin the live registers to their values in `state`.
    pub fn from_live(state: &ConcreteState, live: &[Reg]) -> Self {
        let mut partial = Self::unknown(state.nregs());
        for reg in live {
            partial.regs[reg.index()] = Some(state.get_reg(*reg));
        }
        partial
    }

    pub fn get(&self, reg: Reg) -> Option<u64> {
        self.regs[reg.index()]
    }

    fn with(&self, reg: Reg, value: Option<u64>) -> Self {
        let mut next = self.clone();
        if !reg.is_zero() {
            next.regs[reg.index()] = value;
        }
        next
    }

    /// Drop whatever is pinned at `reg`.
    pub fn forget(&self, reg: Reg) -> Self {
        self.with(reg, None)
    }

    /// Pin `reg` to `value`, or report inconsistency if it is already pinned
    /// to something else.
    fn constrain(&self, reg: Reg, value: u64) -> Option<Self> {
        match self.get(reg) {
            Some(existing) if existing != value => None,
            Some(_) => Some(self.clone()),
            None => Some(self.with(reg, Some(value))),
        }
    }

    /// Bitmask of pinned registers, for grouping lookups by shape.
    pub fn known_mask(&self) -> u64 {
        self.regs
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .fold(0u64, |mask, (i, _)| mask | (1 << i))
    }

    /// Pinned values in register order, the lookup key within a mask group.
    pub fn known_values(&self) -> Vec<u64> {
        self.regs.iter().filter_map(|v| *v).collect()
    }

    /// Whether a concrete state satisfies every pinned register.
    pub fn matches(&self, state: &ConcreteState) -> bool {
        self.regs
            .iter()
            .enumerate()
            .all(|(i, v)| v.is_none_or(|value| state.get_reg(Reg(i as u8)) == value))
    }
}

/// Forward application on a scratch state, used for consistency checks and
/// the enumeration fallback. Only register-file instructions are handled.
fn apply(config: &MachineConfig, instr: &Instruction, sources: &[(Reg, u64)]) -> Option<u64> {
    let mut state = ConcreteState::new(config);
    for (reg, value) in sources {
        state.set_reg(*reg, *value);
    }
    concrete::step(config, &mut state, instr, 0).ok()?;
    instr.destination().map(|rd| state.get_reg(rd))
}

/// All pre-states from which executing `instr` yields a state matching
/// `post`. Empty when the instruction cannot produce the required value, or
/// when it would be a dead write.
pub fn step_backward(
    isa: &dyn Isa,
    config: &MachineConfig,
    domain: &[u64],
    instr: &Instruction,
    post: &PartialState,
) -> Vec<PartialState> {
    let Some(rd) = instr.destination() else {
        return Vec::new();
    };
    // A write to a register nobody observes never appears in an optimal
    // suffix.
    let Some(required) = post.get(rd) else {
        return Vec::new();
    };
    // The destination's previous value is lost.
    let pre = post.with(rd, None);
    let op = instr.opcode;

    match instr.operands {
        Operands::Rr { rs, .. } => {
            match isa.invert(config, op, KnownOperand::Lhs(0), required) {
                Some(a) => pre.constrain(rs, a).into_iter().collect(),
                None => enumerate_unary(config, domain, instr, rs, required, &pre),
            }
        }
        Operands::Ri { .. } => match apply(config, instr, &[]) {
            Some(v) if v == required => vec![pre],
            _ => Vec::new(),
        },
        Operands::Rri { rs1, imm, .. } => {
            let imm = finitize(config, imm as u64);
            match isa.invert(config, op, KnownOperand::Rhs(imm), required) {
                Some(a) => pre.constrain(rs1, a).into_iter().collect(),
                None => enumerate_unary(config, domain, instr, rs1, required, &pre),
            }
        }
        Operands::RrShamt { rs1, .. } => {
            enumerate_unary(config, domain, instr, rs1, required, &pre)
        }
        Operands::Rrr { rs1, rs2, .. } => {
            let mut out = Vec::new();
            match (pre.get(rs1), pre.get(rs2)) {
                (Some(a), Some(b)) => {
                    if apply(config, instr, &[(rs1, a), (rs2, b)]) == Some(required) {
                        out.push(pre.clone());
                    }
                }
                (Some(a), None) => match isa.invert(config, op, KnownOperand::Lhs(a), required) {
                    Some(b) => out.extend(pre.constrain(rs2, b)),
                    None => {
                        for b in domain {
                            if apply(config, instr, &[(rs1, a), (rs2, *b)]) == Some(required) {
                                out.extend(pre.constrain(rs2, *b));
                            }
                        }
                    }
                },
                (None, Some(b)) => match isa.invert(config, op, KnownOperand::Rhs(b), required) {
                    Some(a) => out.extend(pre.constrain(rs1, a)),
                    None => {
                        for a in domain {
                            if apply(config, instr, &[(rs1, *a), (rs2, b)]) == Some(required) {
                                out.extend(pre.constrain(rs1, *a));
                            }
                        }
                    }
                },
                (None, None) => {
                    for a in domain {
                        match isa.invert(config, op, KnownOperand::Lhs(*a), required) {
                            Some(b) => {
                                if let Some(p) = pre.constrain(rs1, *a) {
                                    out.extend(p.constrain(rs2, b));
                                }
                            }
                            None => {
                                for b in domain {
                                    if apply(config, instr, &[(rs1, *a), (rs2, *b)])
                                        == Some(required)
                                    {
                                        if let Some(p) = pre.constrain(rs1, *a) {
                                            out.extend(p.constrain(rs2, *b));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            out
        }
        Operands::Load { .. } | Operands::Store { .. } | Operands::Nullary => Vec::new(),
    }
}

/// Backward step through fixed context code. Unlike [`step_backward`], a
/// write nobody downstream observes passes through (the instruction is part
/// of the program, pruning it is not an option) and nullary instructions are
/// transparent.
pub fn step_backward_context(
    isa: &dyn Isa,
    config: &MachineConfig,
    domain: &[u64],
    instr: &Instruction,
    post: &PartialState,
) -> Vec<PartialState> {
    match instr.destination() {
        None => vec![post.clone()],
        Some(rd) if post.get(rd).is_none() => vec![post.forget(rd)],
        Some(_) => step_backward(isa, config, domain, instr, post),
    }
}

fn enumerate_unary(
    config: &MachineConfig,
    domain: &[u64],
    instr: &Instruction,
    rs: Reg,
    required: u64,
    pre: &PartialState,
) -> Vec<PartialState> {
    match pre.get(rs) {
        Some(a) => {
            if apply(config, instr, &[(rs, a)]) == Some(required) {
                vec![pre.clone()]
            } else {
                Vec::new()
            }
        }
        None => domain
            .iter()
            .filter(|a| apply(config, instr, &[(rs, **a)]) == Some(required))
            .filter_map(|a| pre.constrain(rs, *a))
            .collect(),
    }
}

/// Every value expressible at the configured width.
pub fn value_domain(config: &MachineConfig) -> Vec<u64> {
    (0..=config.mask()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;
    use crate::isa::Rv32;

    fn reduced() -> MachineConfig {
        MachineConfig::new(4, 8).unwrap()
    }

    #[test]
    fn test_invertible_backward_step_is_exact() {
        let config = reduced();
        let domain = value_domain(&config);
        // post: x1 = 5; instr: add x1, x2, x3 with x3 pinned to 2
        let mut goal = PartialState::unknown(8);
        goal = goal.with(Reg(1), Some(5)).with(Reg(3), Some(2));
        let instr = Instruction::rrr(Opcode::Add, Reg(1), Reg(2), Reg(3));
        let pres = step_backward(&Rv32, &config, &domain, &instr, &goal);
        assert_eq!(pres.len(), 1);
        assert_eq!(pres[0].get(Reg(2)), Some(3));
        assert_eq!(pres[0].get(Reg(1)), None, "overwritten value is free");
        assert_eq!(pres[0].get(Reg(3)), Some(2));
    }

    #[test]
    fn test_non_invertible_enumerates_domain() {
        let config = reduced();
        let domain = value_domain(&config);
        // or x1, x2, x3 with x1 required 0 forces both sources to 0
        let goal = PartialState::unknown(8).with(Reg(1), Some(0));
        let instr = Instruction::rrr(Opcode::Or, Reg(1), Reg(2), Reg(3));
        let pres = step_backward(&Rv32, &config, &domain, &instr, &goal);
        assert_eq!(pres.len(), 1);
        assert_eq!(pres[0].get(Reg(2)), Some(0));
        assert_eq!(pres[0].get(Reg(3)), Some(0));
    }

    #[test]
    fn test_dead_write_is_pruned() {
        let config = reduced();
        let domain = value_domain(&config);
        let goal = PartialState::unknown(8).with(Reg(1), Some(5));
        // writes x4, which the goal does not observe
        let instr = Instruction::rr(Opcode::Not, Reg(4), Reg(2));
        assert!(step_backward(&Rv32, &config, &domain, &instr, &goal).is_empty());
    }

    #[test]
    fn test_inconsistent_requirement_has_no_solutions() {
        let config = reduced();
        let domain = value_domain(&config);
        // x1 must be 5 but also equals mv of x2 which is pinned to 3
        let goal = PartialState::unknown(8)
            .with(Reg(1), Some(5))
            .with(Reg(2), Some(3));
        let instr = Instruction::rr(Opcode::Mv, Reg(1), Reg(2));
        assert!(step_backward(&Rv32, &config, &domain, &instr, &goal).is_empty());
    }

    #[test]
    fn test_backward_states_are_sound() {
        // Every produced pre-state, run forward, must satisfy the post.
        let config = reduced();
        let domain = value_domain(&config);
        let goal = PartialState::unknown(8).with(Reg(1), Some(0b1010));
        for opcode in [Opcode::And, Opcode::Xor, Opcode::Sub, Opcode::Srl] {
            let instr = Instruction::rrr(opcode, Reg(1), Reg(2), Reg(3));
            for pre in step_backward(&Rv32, &config, &domain, &instr, &goal) {
                let a = pre.get(Reg(2)).unwrap_or(0);
                let b = pre.get(Reg(3)).unwrap_or(0);
                let mut state = ConcreteState::new(&config);
                state.set_reg(Reg(2), a);
                state.set_reg(Reg(3), b);
                concrete::step(&config, &mut state, &instr, 0).unwrap();
                assert!(goal.matches(&state), "{instr} from a={a} b={b}");
            }
        }
    }

    #[test]
    fn test_known_mask_and_values() {
        let partial = PartialState::unknown(8)
            .with(Reg(3), Some(7))
            .with(Reg(5), Some(1));
        assert_eq!(partial.known_mask(), 0b0010_1001); // x0, x3, x5
        assert_eq!(partial.known_values(), vec![0, 7, 1]);
    }
}
