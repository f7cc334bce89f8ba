//! Counterexample-guided symbolic synthesis
//!
//! The sketch (see [`sketch`]) turns "there exists a program of length L that
//! agrees with the reference on these test inputs and costs less than B" into
//! one solver query. The CEGIS loop alternates that query with the oracle:
//! models that fail verification contribute a counterexample to the test set
//! and the query is re-posed. Linear mode walks lengths upward tightening the
//! bound; Binary mode bisects the bound; Partial mode synthesizes windows of
//! the reference in context.

pub mod sketch;

use std::time::Instant;

use tracing::{debug, info};
use z3::SatResult;

use crate::error::SearchError;
use crate::ir::Program;
use crate::machine::MachineModel;
use crate::semantics::oracle::create_solver;
use crate::semantics::smt::{self, SymbolicState};
use crate::semantics::{concrete, Verdict};
use crate::validation::generate_input_states;
use z3::ast::BV;

use super::config::{SearchConfig, SearchMode, Strategy};
use super::result::{Confidence, Improvement, SearchOutcome, SearchStatistics};
use super::{verify_candidate, SearchTask, Superoptimize, TestCache};

use sketch::Sketch;

#[derive(Debug, Default)]
pub struct CegisSearch {
    /// Monotone counter namespacing sketch variables across queries.
    queries: u64,
}

impl CegisSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// One CEGIS run at a fixed length under a cost bound. `None` means the
    /// space is exhausted at this length, a normal negative.
    #[allow(clippy::too_many_arguments)]
    fn synthesize_at_length(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        cache: &mut TestCache,
        length: usize,
        cost_bound: u64,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<(Program, u64, Confidence)>, SearchError> {
        self.queries += 1;
        let tag = format!("sk{}_{length}", self.queries);
        let sketch = Sketch::new(&model.config, model.pool().opcodes(), length, &tag);
        if sketch.is_empty() {
            return Ok(None);
        }

        loop {
            if Instant::now() >= deadline || config.should_stop(cost_bound) {
                return Ok(None);
            }

            let solver = create_solver(&config.solver);
            for constraint in sketch.well_formed() {
                solver.assert(&constraint);
            }
            solver.assert(
                &sketch
                    .cost(&model.costs)
                    .bvult(&BV::from_u64(cost_bound.min(u32::MAX as u64), 32)),
            );
            for case in cache.cases() {
                let entry = concrete::interpret(&model.config, &case.input, &task.prefix)?;
                let entry_regs: Vec<BV> = entry
                    .regs()
                    .iter()
                    .map(|v| BV::from_u64(*v, model.config.bits))
                    .collect();
                let out_regs = sketch.execute(&entry_regs);
                let mut state = SymbolicState::from_regs(&model.config, out_regs);
                for (index, instr) in task.postfix.iter().enumerate() {
                    smt::step(&model.config, &mut state, instr, index)?;
                }
                for reg in &task.live_out.regs {
                    let expected =
                        BV::from_u64(case.expected.get_reg(*reg), model.config.bits);
                    solver.assert(&state.get_reg(*reg).eq(&expected));
                }
            }

            stats.solver_queries += 1;
            match solver.check() {
                SatResult::Unsat => return Ok(None),
                SatResult::Unknown => {
                    debug!(length, "synthesis query undecided, abandoning this length");
                    return Ok(None);
                }
                SatResult::Sat => {
                    let Some(model_obj) = solver.get_model() else {
                        return Ok(None);
                    };
                    let Some(candidate) = sketch.decode(&model_obj) else {
                        return Ok(None);
                    };
                    stats.candidates_evaluated += 1;
                    let cost = model.costs.program_cost(&candidate);

                    stats.solver_queries += 1;
                    match verify_candidate(&model.config, task, &candidate, &config.solver)? {
                        Verdict::Equivalent => {
                            stats.solver_equivalent += 1;
                            return Ok(Some((candidate, cost, Confidence::Verified)));
                        }
                        Verdict::Counterexample(witness) => {
                            debug!(length, "candidate refuted, adding counterexample");
                            cache.add_counterexample(&model.config, task, witness)?;
                        }
                        Verdict::Unknown(reason) => {
                            debug!(length, %reason, "verification undecided, tested-only");
                            return Ok(Some((
                                candidate,
                                cost,
                                Confidence::TestedOnly { tests: cache.len() },
                            )));
                        }
                    }
                }
            }
        }
    }

    fn candidate_lengths(&self, task: &SearchTask, config: &SearchConfig) -> Vec<usize> {
        match task.fixed_length {
            Some(length) => vec![length],
            None => {
                let max = task.target_size.max(1).min(config.cegis.max_length.max(1));
                (1..=max).collect()
            }
        }
    }

    fn run_linear(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        cache: &mut TestCache,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<Improvement>, SearchError> {
        let mut bound = stats.original_cost;
        let mut best = None;
        let min_cost = model.costs.min_instruction_cost();
        for length in self.candidate_lengths(task, config) {
            if length as u64 * min_cost >= bound {
                continue;
            }
            if let Some((program, cost, confidence)) = self.synthesize_at_length(
                task, model, config, cache, length, bound, deadline, stats,
            )? {
                info!(task = %task.name, length, cost, "synthesis found a candidate");
                stats.improvements_found += 1;
                stats.best_cost_found = cost;
                bound = cost;
                if confidence == Confidence::Verified {
                    if let Some(shared) = &config.shared_best {
                        shared.try_update(cost);
                    }
                }
                best = Some(Improvement {
                    program,
                    cost,
                    strategy: Strategy::Cegis,
                    confidence,
                });
            }
        }
        Ok(best)
    }

    fn run_binary(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        cache: &mut TestCache,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<Improvement>, SearchError> {
        let mut best: Option<Improvement> = None;
        let mut bound = stats.original_cost;
        let min_cost = model.costs.min_instruction_cost();
        for length in self.candidate_lengths(task, config) {
            let mut lo = (length as u64) * min_cost;
            let mut hi = bound.saturating_sub(1);
            while lo <= hi {
                if Instant::now() >= deadline || config.should_stop(bound) {
                    return Ok(best);
                }
                let mid = lo + (hi - lo) / 2;
                match self.synthesize_at_length(
                    task,
                    model,
                    config,
                    cache,
                    length,
                    mid + 1,
                    deadline,
                    stats,
                )? {
                    Some((program, cost, confidence)) => {
                        stats.improvements_found += 1;
                        stats.best_cost_found = cost;
                        bound = cost;
                        if confidence == Confidence::Verified {
                            if let Some(shared) = &config.shared_best {
                                shared.try_update(cost);
                            }
                        }
                        best = Some(Improvement {
                            program,
                            cost,
                            strategy: Strategy::Cegis,
                            confidence,
                        });
                        hi = cost.saturating_sub(1);
                    }
                    None => {
                        lo = mid + 1;
                    }
                }
            }
        }
        Ok(best)
    }

    fn run_partial(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<Improvement>, SearchError> {
        let n = task.spec.len();
        if n == 0 {
            return Ok(None);
        }
        let base = n.min(config.cegis.window_size).max(1);
        let mut sizes = vec![(base / 2).max(1), base, (2 * base).min(n), (4 * base).min(n)];
        sizes.retain(|w| *w <= config.cegis.window_size);
        sizes.sort_unstable();
        sizes.dedup();

        let inputs =
            generate_input_states(&model.config, config.cegis.test_count, config.seed);
        for w in sizes {
            let mut start = 0;
            while start + w <= n {
                if Instant::now() >= deadline || config.should_stop(stats.original_cost) {
                    return Ok(None);
                }
                let end = start + w;
                let window: Program = task.spec[start..end].to_vec();
                let mut prefix = task.prefix.clone();
                prefix.extend_from_slice(&task.spec[..start]);
                let mut postfix: Program = task.spec[end..].to_vec();
                postfix.extend_from_slice(&task.postfix);
                let window_cost = model.costs.program_cost(&window);

                let sub_task = SearchTask::new(window, task.live_out.clone())
                    .with_name(format!("{}[{start}..{end}]", task.name))
                    .with_prefix(prefix)
                    .with_postfix(postfix)
                    .with_time_limit(task.time_limit);
                if sub_task
                    .postfix
                    .iter()
                    .any(|i| i.opcode.accesses_memory())
                {
                    start += w;
                    continue;
                }
                let mut cache = TestCache::new(&model.config, &sub_task, inputs.clone())?;

                for length in 1..=w {
                    if length as u64 * model.costs.min_instruction_cost() >= window_cost {
                        continue;
                    }
                    if let Some((replacement, _, confidence)) = self.synthesize_at_length(
                        &sub_task,
                        model,
                        config,
                        &mut cache,
                        length,
                        window_cost,
                        deadline,
                        stats,
                    )? {
                        let mut whole: Program = task.spec[..start].to_vec();
                        whole.extend_from_slice(&replacement);
                        whole.extend_from_slice(&task.spec[end..]);
                        let cost = model.costs.program_cost(&whole);
                        if cost < stats.original_cost {
                            info!(task = %task.name, start, end, cost, "window improvement");
                            stats.improvements_found += 1;
                            stats.best_cost_found = cost;
                            if confidence == Confidence::Verified {
                                if let Some(shared) = &config.shared_best {
                                    shared.try_update(cost);
                                }
                            }
                            return Ok(Some(Improvement {
                                program: whole,
                                cost,
                                strategy: Strategy::Cegis,
                                confidence,
                            }));
                        }
                    }
                }
                start += w;
            }
        }
        Ok(None)
    }
}

impl Superoptimize for CegisSearch {
    fn superoptimize(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        let deadline = start + task.time_limit.min(config.time_limit);
        let mut stats = SearchStatistics::new(Strategy::Cegis);
        stats.original_cost = model.costs.program_cost(&task.spec);
        stats.best_cost_found = stats.original_cost;

        // Sketches are register dataflow only; a live memory constraint or
        // memory traffic after the hole cannot be expressed.
        if task.live_out.mem || task.postfix.iter().any(|i| i.opcode.accesses_memory()) {
            debug!(task = %task.name, "memory-observing task, symbolic synthesis skipped");
            stats.elapsed_time = start.elapsed();
            return Ok(SearchOutcome::no_improvement(stats));
        }

        info!(task = %task.name, mode = ?config.cegis.mode, original_cost = stats.original_cost, "starting CEGIS");

        let best = match config.cegis.mode {
            SearchMode::Linear | SearchMode::Binary => {
                let inputs =
                    generate_input_states(&model.config, config.cegis.test_count, config.seed);
                let mut cache = TestCache::new(&model.config, task, inputs)?;
                if config.cegis.mode == SearchMode::Linear {
                    self.run_linear(task, model, config, &mut cache, deadline, &mut stats)?
                } else {
                    self.run_binary(task, model, config, &mut cache, deadline, &mut stats)?
                }
            }
            SearchMode::Partial => self.run_partial(task, model, config, deadline, &mut stats)?,
        };

        stats.elapsed_time = start.elapsed();
        match best {
            Some(improvement) => Ok(SearchOutcome::with_improvement(improvement, stats)),
            None => Ok(SearchOutcome::no_improvement(stats)),
        }
    }
}
