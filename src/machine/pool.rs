//! Opcode pool construction
//!
//! The pool is the set of opcodes search is allowed to synthesize with. It is
//! built in a fixed order: cost-threshold filter, then named-group
//! intersection, then whitelist intersection, then blacklist removal. The
//! result is immutable for the lifetime of a search; each worker gets its own
//! copy.

use std::collections::HashSet;

use crate::error::ModelError;
use crate::ir::{InstrClass, Opcode};

use super::cost::CostModel;

/// Curated opcode groups for common synthesis targets.
const GROUPS: &[(&str, &[Opcode])] = &[
    (
        "slt-synthesis",
        &[
            Opcode::Sub,
            Opcode::Srli,
            Opcode::Xor,
            Opcode::Sltu,
            Opcode::And,
            Opcode::Xori,
            Opcode::Or,
            Opcode::Addi,
            Opcode::Andi,
        ],
    ),
    (
        "and-synthesis",
        &[Opcode::Not, Opcode::Or, Opcode::Sub, Opcode::Add],
    ),
    (
        "or-synthesis",
        &[Opcode::Not, Opcode::And, Opcode::Sub, Opcode::Add],
    ),
    (
        "xor-synthesis",
        &[Opcode::And, Opcode::Or, Opcode::Sub, Opcode::Add, Opcode::Not],
    ),
    (
        "mul-synthesis",
        &[
            Opcode::Add,
            Opcode::Slli,
            Opcode::Sub,
            Opcode::Sll,
            Opcode::Srl,
            Opcode::Sra,
            Opcode::And,
            Opcode::Or,
            Opcode::Xor,
        ],
    ),
    (
        "mulh-synthesis",
        &[
            Opcode::Add,
            Opcode::Sub,
            Opcode::Sll,
            Opcode::Srl,
            Opcode::And,
            Opcode::Or,
            Opcode::Xor,
            Opcode::Mul,
            Opcode::Srli,
            Opcode::Slli,
        ],
    ),
];

/// Declarative restrictions on which opcodes the pool may contain.
#[derive(Debug, Clone, Default)]
pub struct PoolConstraints {
    /// Opcodes costing strictly more than this are excluded. `None` keeps the
    /// built-in threshold of 100.
    pub cost_threshold: Option<u64>,
    /// Names of curated groups; the pool is intersected with their union.
    pub groups: Vec<String>,
    /// Explicit allow-list intersected with the pool.
    pub whitelist: Option<Vec<Opcode>>,
    /// Opcodes removed from the pool after all other steps.
    pub blacklist: Vec<Opcode>,
}

const DEFAULT_COST_THRESHOLD: u64 = 100;

impl PoolConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_whitelist(mut self, opcodes: Vec<Opcode>) -> Self {
        self.whitelist = Some(opcodes);
        self
    }

    pub fn with_blacklist(mut self, opcodes: Vec<Opcode>) -> Self {
        self.blacklist = opcodes;
        self
    }

    pub fn with_cost_threshold(mut self, threshold: u64) -> Self {
        self.cost_threshold = Some(threshold);
        self
    }
}

/// The resolved opcode pool, partitioned by instruction class for mutation
/// and sketch construction.
#[derive(Debug, Clone)]
pub struct OpcodePool {
    active: Vec<Opcode>,
    active_set: HashSet<Opcode>,
}

impl OpcodePool {
    /// Build the pool from constraints and the cost model.
    pub fn build(constraints: &PoolConstraints, costs: &CostModel) -> Result<Self, ModelError> {
        let threshold = constraints.cost_threshold.unwrap_or(DEFAULT_COST_THRESHOLD);
        let mut active: Vec<Opcode> = Opcode::ALL
            .iter()
            .copied()
            .filter(|op| costs.cost(*op) <= threshold)
            .collect();

        if !constraints.groups.is_empty() {
            let mut union: HashSet<Opcode> = HashSet::new();
            for name in &constraints.groups {
                let members = GROUPS
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, ops)| *ops)
                    .ok_or_else(|| ModelError::UnknownGroup(name.clone()))?;
                union.extend(members.iter().copied());
            }
            active.retain(|op| union.contains(op));
        }

        if let Some(whitelist) = &constraints.whitelist {
            let allowed: HashSet<Opcode> = whitelist.iter().copied().collect();
            active.retain(|op| allowed.contains(op));
        }

        let banned: HashSet<Opcode> = constraints.blacklist.iter().copied().collect();
        active.retain(|op| !banned.contains(op));

        let active_set = active.iter().copied().collect();
        Ok(OpcodePool { active, active_set })
    }

    /// Unconstrained pool over every opcode.
    pub fn full(costs: &CostModel) -> Self {
        // The default constraints cannot name an unknown group.
        Self::build(&PoolConstraints::default(), costs)
            .unwrap_or_else(|_| unreachable!("default constraints are always valid"))
    }

    pub fn opcodes(&self) -> &[Opcode] {
        &self.active
    }

    pub fn contains(&self, opcode: Opcode) -> bool {
        self.active_set.contains(&opcode)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Opcodes of one class, in table order.
    pub fn class_members(&self, class: InstrClass) -> Vec<Opcode> {
        self.active
            .iter()
            .copied()
            .filter(|op| op.class() == class)
            .collect()
    }

    /// The classes that have at least one member in the pool.
    pub fn classes(&self) -> Vec<InstrClass> {
        let mut seen = Vec::new();
        for op in &self.active {
            let class = op.class();
            if !seen.contains(&class) {
                seen.push(class);
            }
        }
        seen
    }

    pub fn known_groups() -> Vec<&'static str> {
        GROUPS.iter().map(|(name, _)| *name).collect()
    }
}
