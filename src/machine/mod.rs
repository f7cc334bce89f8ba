//! Machine model: bit width, register file size, cost model, opcode pool

pub mod cost;
pub mod pool;

pub use cost::CostModel;
pub use pool::{OpcodePool, PoolConstraints};

use crate::error::ModelError;

/// Structural parameters of the modeled machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Word size in bits. All arithmetic is finitized to this width.
    pub bits: u32,
    /// Number of general-purpose registers, including the hard-wired zero.
    pub nregs: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig { bits: 32, nregs: 32 }
    }
}

impl MachineConfig {
    pub fn new(bits: u32, nregs: usize) -> Result<Self, ModelError> {
        if bits == 0 || bits > 64 {
            return Err(ModelError::BadBitWidth(bits));
        }
        if nregs == 0 || nregs > 64 {
            return Err(ModelError::BadRegisterCount(nregs));
        }
        Ok(MachineConfig { bits, nregs })
    }

    /// Bitmask selecting the low `bits` bits of a word.
    pub fn mask(&self) -> u64 {
        if self.bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// The sign bit of a word at this width.
    pub fn sign_bit(&self) -> u64 {
        1u64 << (self.bits - 1)
    }

    /// A copy of this configuration at a reduced bit width, used by the
    /// enumerative strategy to shrink the search space before re-checking at
    /// full width.
    pub fn reduced(&self, bits: u32) -> Result<Self, ModelError> {
        MachineConfig::new(bits, self.nregs)
    }
}

/// The complete machine model handed to simulators, the oracle, and search.
#[derive(Debug, Clone)]
pub struct MachineModel {
    pub config: MachineConfig,
    pub costs: CostModel,
    pool: OpcodePool,
    constraints: PoolConstraints,
}

impl Default for MachineModel {
    fn default() -> Self {
        let costs = CostModel::new();
        let pool = OpcodePool::full(&costs);
        MachineModel {
            config: MachineConfig::default(),
            costs,
            pool,
            constraints: PoolConstraints::default(),
        }
    }
}

impl MachineModel {
    pub fn new(config: MachineConfig) -> Self {
        MachineModel {
            config,
            ..Default::default()
        }
    }

    pub fn with_costs(mut self, costs: CostModel) -> Result<Self, ModelError> {
        self.costs = costs;
        self.pool = OpcodePool::build(&self.constraints, &self.costs)?;
        Ok(self)
    }

    /// Rebuild the opcode pool under new constraints. The previous pool is
    /// fully replaced, not refined.
    pub fn apply_constraints(&mut self, constraints: PoolConstraints) -> Result<(), ModelError> {
        self.pool = OpcodePool::build(&constraints, &self.costs)?;
        self.constraints = constraints;
        Ok(())
    }

    pub fn pool(&self) -> &OpcodePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn test_default_config() {
        let config = MachineConfig::default();
        assert_eq!(config.bits, 32);
        assert_eq!(config.nregs, 32);
        assert_eq!(config.mask(), 0xffff_ffff);
        assert_eq!(config.sign_bit(), 0x8000_0000);
    }

    #[test]
    fn test_bad_parameters_rejected() {
        assert!(MachineConfig::new(0, 32).is_err());
        assert!(MachineConfig::new(65, 32).is_err());
        assert!(MachineConfig::new(32, 0).is_err());
        assert!(MachineConfig::new(32, 65).is_err());
    }

    #[test]
    fn test_full_width_mask() {
        let config = MachineConfig::new(64, 32).unwrap();
        assert_eq!(config.mask(), u64::MAX);
    }

    #[test]
    fn test_constraints_replace_pool() {
        let mut model = MachineModel::default();
        assert_eq!(model.pool().len(), 41);
        model
            .apply_constraints(PoolConstraints::new().with_groups(["and-synthesis"]))
            .unwrap();
        assert_eq!(model.pool().len(), 4);
        model.apply_constraints(PoolConstraints::default()).unwrap();
        assert_eq!(model.pool().len(), 41);
    }

    #[test]
    fn test_costs_refilter_pool() {
        let costs = CostModel::new().with_cost(Opcode::Div, 500);
        let model = MachineModel::default().with_costs(costs).unwrap();
        assert!(!model.pool().contains(Opcode::Div));
    }
}
