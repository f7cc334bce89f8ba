//! Random and edge-case test input generation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::machine::MachineConfig;
use crate::semantics::ConcreteState;
use crate::ir::Reg;

/// Values that most often distinguish near-equivalent programs: boundary
/// values of the word width and alternating bit patterns.
pub fn edge_values(config: &MachineConfig) -> Vec<u64> {
    let mask = config.mask();
    let mut values = vec![
        0,
        1 & mask,
        2 & mask,
        mask,                  // -1
        config.sign_bit(),     // MIN
        config.sign_bit() - 1, // MAX
        0x5555_5555_5555_5555 & mask,
        0xaaaa_aaaa_aaaa_aaaa & mask,
    ];
    values.sort_unstable();
    values.dedup();
    values
}

/// Generate `count` deterministic concrete input states: first a handful of
/// uniform edge-value states, then states with registers drawn independently
/// from the edge catalogue and the full word range.
pub fn generate_input_states(config: &MachineConfig, count: usize, seed: u64) -> Vec<ConcreteState> {
    let edges = edge_values(config);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut states = Vec::with_capacity(count);

    for value in edges.iter().take(count) {
        let mut state = ConcreteState::new(config);
        for i in 1..config.nregs {
            state.set_reg(Reg(i as u8), *value);
        }
        states.push(state);
    }

    while states.len() < count {
        let mut state = ConcreteState::new(config);
        for i in 1..config.nregs {
            let value = if rng.random_bool(0.3) {
                edges[rng.random_range(0..edges.len())]
            } else {
                rng.random::<u64>() & config.mask()
            };
            state.set_reg(Reg(i as u8), value);
        }
        states.push(state);
    }

    states
}
