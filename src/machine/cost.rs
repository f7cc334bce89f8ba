//! Per-opcode performance cost model

use std::collections::HashMap;

use crate::ir::Opcode;

/// Static performance cost of each opcode. Every opcode defaults to cost 1;
/// overrides let callers penalize expensive units (multipliers, dividers) or
/// price an opcode out of the pool entirely.
#[derive(Debug, Clone)]
pub struct CostModel {
    overrides: HashMap<Opcode, u64>,
    default_cost: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            overrides: HashMap::new(),
            default_cost: 1,
        }
    }
}

impl CostModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost(mut self, opcode: Opcode, cost: u64) -> Self {
        self.overrides.insert(opcode, cost);
        self
    }

    pub fn with_default_cost(mut self, cost: u64) -> Self {
        self.default_cost = cost;
        self
    }

    pub fn set_cost(&mut self, opcode: Opcode, cost: u64) {
        self.overrides.insert(opcode, cost);
    }

    /// `nop` is free unless overridden: the stochastic walk shortens a
    /// program by degrading slots to it.
    pub fn cost(&self, opcode: Opcode) -> u64 {
        match self.overrides.get(&opcode) {
            Some(cost) => *cost,
            None if opcode == Opcode::Nop => 0,
            None => self.default_cost,
        }
    }

    /// Total cost of a program: the sum of its opcode costs.
    pub fn program_cost(&self, program: &[crate::ir::Instruction]) -> u64 {
        program.iter().map(|i| self.cost(i.opcode)).sum()
    }

    /// The cheapest cost any computing instruction can have. A lower bound
    /// used to prune length ladders; `nop` is excluded since an all-nop
    /// program never replaces one that has to produce a value.
    pub fn min_instruction_cost(&self) -> u64 {
        Opcode::ALL
            .iter()
            .filter(|op| **op != Opcode::Nop)
            .map(|op| self.cost(*op))
            .min()
            .unwrap_or(self.default_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Reg};

    #[test]
    fn test_default_cost_is_one() {
        let model = CostModel::new();
        assert_eq!(model.cost(Opcode::Add), 1);
        assert_eq!(model.cost(Opcode::Div), 1);
    }

    #[test]
    fn test_override() {
        let model = CostModel::new().with_cost(Opcode::Mul, 4);
        assert_eq!(model.cost(Opcode::Mul), 4);
        assert_eq!(model.cost(Opcode::Add), 1);
    }

    #[test]
    fn test_program_cost() {
        let model = CostModel::new().with_cost(Opcode::Mul, 4);
        let program = vec![
            Instruction::rrr(Opcode::Add, Reg(1), Reg(2), Reg(3)),
            Instruction::rrr(Opcode::Mul, Reg(1), Reg(1), Reg(3)),
            Instruction::nop(),
        ];
        assert_eq!(model.program_cost(&program), 5);
    }

    #[test]
    fn test_nop_is_free_by_default() {
        let model = CostModel::new();
        assert_eq!(model.cost(Opcode::Nop), 0);
        assert_eq!(model.min_instruction_cost(), 1);
        let priced = CostModel::new().with_cost(Opcode::Nop, 2);
        assert_eq!(priced.cost(Opcode::Nop), 2);
    }
}
