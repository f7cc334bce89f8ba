//! MCMC superoptimization loop
//!
//! One mutable current program walks the space under Metropolis-Hastings
//! acceptance. Cost is the correctness distance over the cached tests; once a
//! program passes every test its cost becomes the performance cost, and when
//! it also beats the best known cost the oracle is consulted. Counterexamples
//! feed back into the test cache; an `Equivalent` verdict ends the walk.

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::error::{SearchError, SimError};
use crate::ir::Instruction;
use crate::machine::{MachineConfig, MachineModel};
use crate::semantics::{concrete, Verdict};
use crate::validation::generate_input_states;

use crate::search::candidate::InstructionSpace;
use crate::search::config::{SearchConfig, Strategy};
use crate::search::result::{Confidence, Improvement, SearchOutcome, SearchStatistics};
use crate::search::{verify_candidate, SearchTask, Superoptimize, TestCache};

use super::acceptance::AcceptanceCriterion;
use super::mutation::Mutator;

#[derive(Debug, Default)]
pub struct StochasticSearch;

impl StochasticSearch {
    pub fn new() -> Self {
        Self
    }
}

/// Bitwise distance between candidate and reference outputs over the cached
/// tests. Zero iff the candidate passes every test.
fn correctness_cost(
    config: &MachineConfig,
    task: &SearchTask,
    cache: &TestCache,
    candidate: &[Instruction],
) -> Result<u64, SimError> {
    let wrapped = task.wrap(candidate);
    let mut cost = 0u64;
    for case in cache.cases() {
        let out = concrete::interpret(config, &case.input, &wrapped)?;
        for reg in &task.live_out.regs {
            cost += (out.get_reg(*reg) ^ case.expected.get_reg(*reg)).count_ones() as u64;
        }
        if task.live_out.mem {
            let mut addrs: Vec<u64> = out.mem.bytes().map(|(a, _)| a).collect();
            addrs.extend(case.expected.mem.bytes().map(|(a, _)| a));
            addrs.sort_unstable();
            addrs.dedup();
            for addr in addrs {
                cost += (out.mem.load_byte(addr) ^ case.expected.mem.load_byte(addr)).count_ones()
                    as u64;
            }
        }
    }
    Ok(cost)
}

impl Superoptimize for StochasticSearch {
    fn superoptimize(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        let mut stats = SearchStatistics::new(Strategy::Stochastic);
        let cfg = &config.stochastic;

        let space = InstructionSpace::new(model);
        if space.is_empty() {
            stats.elapsed_time = start.elapsed();
            return Ok(SearchOutcome::no_improvement(stats));
        }
        let mutator = Mutator::new(space, cfg.mutation_weights);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let inputs = generate_input_states(&model.config, cfg.test_count, config.seed);
        let mut cache = TestCache::new(&model.config, task, inputs)?;

        let original_cost = model.costs.program_cost(&task.spec);
        stats.original_cost = original_cost;
        stats.best_cost_found = original_cost;

        let mut current = match (&task.start_program, task.fixed_length) {
            (Some(program), _) => program.clone(),
            (None, Some(length)) => mutator.random_program(&mut rng, length),
            (None, None) => task.spec.clone(),
        };
        // Performance only matters once the candidate is behaviorally right;
        // until then the walk follows the correctness gradient alone.
        let scalar_cost = |corr: u64, perf: u64| if corr == 0 { perf } else { corr };

        let mut current_corr = correctness_cost(&model.config, task, &cache, &current)?;
        let mut current_cost =
            scalar_cost(current_corr, model.costs.program_cost(&current));

        let criterion = AcceptanceCriterion::new(cfg.beta);
        // Cost any candidate has to beat before the oracle is worth asking.
        // When synthesizing from a random program there is nothing to beat
        // yet; the first candidate that passes every test goes straight to
        // the oracle even if it costs more than the reference.
        let synthesizing = task.start_program.is_none() && task.fixed_length.is_some();
        let mut cost_to_beat = if synthesizing { u64::MAX } else { original_cost };
        let mut best_tested: Option<Improvement> = None;

        info!(task = %task.name, original_cost, tests = cache.len(), "starting MCMC walk");

        for _ in 0..cfg.iterations {
            if start.elapsed() >= task.time_limit || config.should_stop(cost_to_beat) {
                break;
            }
            stats.iterations += 1;

            let proposal = mutator.mutate(&mut rng, &current);
            stats.candidates_evaluated += 1;
            let corr = correctness_cost(&model.config, task, &cache, &proposal)?;
            let perf = model.costs.program_cost(&proposal);
            let mut proposal_cost = scalar_cost(corr, perf);

            if corr == 0 {
                stats.candidates_passed_fast += 1;
                if perf < cost_to_beat {
                    stats.solver_queries += 1;
                    match verify_candidate(&model.config, task, &proposal, &config.solver)? {
                        Verdict::Equivalent => {
                            stats.solver_equivalent += 1;
                            stats.improvements_found += 1;
                            stats.best_cost_found = perf;
                            stats.elapsed_time = start.elapsed();
                            if let Some(shared) = &config.shared_best {
                                shared.try_update(perf);
                            }
                            info!(task = %task.name, cost = perf, "verified improvement");
                            return Ok(SearchOutcome::with_improvement(
                                Improvement {
                                    program: proposal,
                                    cost: perf,
                                    strategy: Strategy::Stochastic,
                                    confidence: Confidence::Verified,
                                },
                                stats,
                            ));
                        }
                        Verdict::Counterexample(witness) => {
                            debug!(task = %task.name, "counterexample added to test cache");
                            cache.add_counterexample(&model.config, task, witness)?;
                            // Both costs are stale against the grown cache.
                            current_corr =
                                correctness_cost(&model.config, task, &cache, &current)?;
                            current_cost = scalar_cost(
                                current_corr,
                                model.costs.program_cost(&current),
                            );
                            let corr =
                                correctness_cost(&model.config, task, &cache, &proposal)?;
                            proposal_cost = scalar_cost(corr, perf);
                        }
                        Verdict::Unknown(reason) => {
                            debug!(task = %task.name, %reason, "oracle undecided, keeping as tested-only");
                            if perf < cost_to_beat {
                                stats.best_cost_found = stats.best_cost_found.min(perf);
                                stats.improvements_found += 1;
                                cost_to_beat = perf;
                                best_tested = Some(Improvement {
                                    program: proposal.clone(),
                                    cost: perf,
                                    strategy: Strategy::Stochastic,
                                    confidence: Confidence::TestedOnly { tests: cache.len() },
                                });
                            }
                        }
                    }
                }
            }

            if criterion.accept(&mut rng, current_cost, proposal_cost) {
                stats.accepted_proposals += 1;
                current = proposal;
                current_cost = proposal_cost;
            }
        }

        stats.elapsed_time = start.elapsed();
        info!(
            task = %task.name,
            iterations = stats.iterations,
            acceptance_rate = stats.acceptance_rate(),
            "MCMC walk exhausted"
        );
        match best_tested {
            Some(improvement) => Ok(SearchOutcome::with_improvement(improvement, stats)),
            None => Ok(SearchOutcome::no_improvement(stats)),
        }
    }
}
