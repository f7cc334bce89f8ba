//! Stochastic (MCMC) search strategy

pub mod acceptance;
pub mod mcmc;
pub mod mutation;

pub use acceptance::AcceptanceCriterion;
pub use mcmc::StochasticSearch;
pub use mutation::{MutationKind, Mutator};
