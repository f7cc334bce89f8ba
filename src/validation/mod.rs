//! Test input generation for the strategies' fast concrete test loops

pub mod random;

pub use random::{edge_values, generate_input_states};
