//! Machine state: register file, sparse memory, liveness masks

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ir::Reg;
use crate::machine::MachineConfig;

/// Sparse byte-addressed memory. Unwritten bytes read as zero.
///
/// The byte map sits behind an `Arc` so cloning a state for simulation is a
/// pointer copy; the map is only duplicated on the first write to a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Arc<BTreeMap<u64, u8>>,
}

impl Default for Memory {
    fn default() -> Self {
        Memory {
            bytes: Arc::new(BTreeMap::new()),
        }
    }
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_byte(&self, addr: u64) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }

    pub fn store_byte(&mut self, addr: u64, value: u8) {
        Arc::make_mut(&mut self.bytes).insert(addr, value);
    }

    /// Little-endian load of `width` bytes, zero-extended.
    pub fn load_unsigned(&self, addr: u64, width: u32) -> u64 {
        let mut value = 0u64;
        for i in 0..width as u64 {
            value |= (self.load_byte(addr.wrapping_add(i)) as u64) << (8 * i);
        }
        value
    }

    /// Little-endian load of `width` bytes, sign-extended to 64 bits.
    pub fn load_signed(&self, addr: u64, width: u32) -> u64 {
        let raw = self.load_unsigned(addr, width);
        let shift = 64 - 8 * width;
        ((raw << shift) as i64 >> shift) as u64
    }

    /// Little-endian store of the low `width` bytes of `value`.
    pub fn store(&mut self, addr: u64, value: u64, width: u32) {
        for i in 0..width as u64 {
            self.store_byte(addr.wrapping_add(i), (value >> (8 * i)) as u8);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate over every written byte in address order.
    pub fn bytes(&self) -> impl Iterator<Item = (u64, u8)> + '_ {
        self.bytes.iter().map(|(a, b)| (*a, *b))
    }

    /// Content equality over the union of populated addresses. Unlike `==`
    /// on the byte maps, an explicitly stored zero matches an untouched
    /// address.
    pub fn content_eq(&self, other: &Memory) -> bool {
        self.bytes().all(|(addr, byte)| other.load_byte(addr) == byte)
            && other.bytes().all(|(addr, byte)| self.load_byte(addr) == byte)
    }
}

/// A concrete machine state: register values and memory contents.
///
/// Register 0 is enforced here: reads of `x0` return 0 and writes to it are
/// discarded, so every instruction semantics function can stay oblivious.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteState {
    regs: Vec<u64>,
    pub mem: Memory,
}

impl ConcreteState {
    pub fn new(config: &MachineConfig) -> Self {
        ConcreteState {
            regs: vec![0; config.nregs],
            mem: Memory::new(),
        }
    }

    pub fn from_regs(regs: Vec<u64>) -> Self {
        ConcreteState {
            regs,
            mem: Memory::new(),
        }
    }

    pub fn nregs(&self) -> usize {
        self.regs.len()
    }

    pub fn get_reg(&self, reg: Reg) -> u64 {
        if reg.is_zero() {
            0
        } else {
            self.regs[reg.index()]
        }
    }

    pub fn set_reg(&mut self, reg: Reg, value: u64) {
        if !reg.is_zero() {
            self.regs[reg.index()] = value;
        }
    }

    pub fn regs(&self) -> &[u64] {
        &self.regs
    }
}

impl fmt::Display for ConcreteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.regs.iter().enumerate() {
            if *value != 0 {
                writeln!(f, "x{i} = {value:#x}")?;
            }
        }
        for (addr, byte) in self.mem.bytes() {
            writeln!(f, "mem[{addr:#x}] = {byte:#04x}")?;
        }
        Ok(())
    }
}

/// Which parts of the final state the correctness constraint observes.
/// Registers outside the set and, when `mem` is false, all of memory are
/// scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveOut {
    pub regs: Vec<Reg>,
    pub mem: bool,
}

impl LiveOut {
    pub fn regs<I: IntoIterator<Item = Reg>>(regs: I) -> Self {
        LiveOut {
            regs: regs.into_iter().collect(),
            mem: false,
        }
    }

    pub fn with_memory(mut self) -> Self {
        self.mem = true;
        self
    }

    pub fn observes(&self, reg: Reg) -> bool {
        self.regs.contains(&reg)
    }

    /// Two states agree when every live register matches and, if memory is
    /// live, the memory contents match byte for byte.
    pub fn states_agree(&self, a: &ConcreteState, b: &ConcreteState) -> bool {
        if self.regs.iter().any(|r| a.get_reg(*r) != b.get_reg(*r)) {
            return false;
        }
        !self.mem || a.mem.content_eq(&b.mem)
    }
}
