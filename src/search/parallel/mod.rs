//! Parallel driver running several strategies at once
//!
//! One coordinator thread and N workers. Each worker runs one strategy
//! (assigned round-robin from [`ParallelConfig::strategies`]) with its own
//! seed, reporting improvements over a channel. A lock-free [`SharedBest`]
//! cell carries the best verified cost so every worker prunes against the
//! global frontier without channel traffic.
//!
//! [`SharedBest`]: channel::SharedBest

pub mod channel;
pub mod config;
pub mod coordinator;

pub use config::ParallelConfig;
pub use coordinator::{run_parallel_search, HybridSearch};
