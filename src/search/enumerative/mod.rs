//! Bidirectional enumerative search
//!
//! Meet-in-the-middle enumeration at a reduced bit width. The forward pass
//! grows programs from the entry states and indexes them by behavioral
//! signature (the register file over the test set); the backward pass grows
//! instruction suffixes from the required outputs, running instructions in
//! reverse over partially-known states (see [`inverse`]). A program of
//! length L exists exactly when a forward state of depth ⌈L/2⌉ satisfies a
//! backward partial state of depth L − ⌈L/2⌉. Matches are re-checked at the
//! reduced width on every test, then at full width, then sent to the oracle.

pub mod inverse;

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::SearchError;
use crate::ir::{Instruction, Operands, Program, Reg};
use crate::isa::{Isa, Rv32};
use crate::machine::{MachineConfig, MachineModel};
use crate::semantics::{concrete, ConcreteState, Verdict};
use crate::validation::generate_input_states;

use super::config::{SearchConfig, SearchMode, Strategy};
use super::result::{Confidence, Improvement, SearchOutcome, SearchStatistics};
use super::{verify_candidate, InstructionSpace, SearchTask, Superoptimize, TestCache};

use inverse::{step_backward, step_backward_context, value_domain, PartialState};

/// Entry ceiling per table level; past it the level is truncated and the
/// search stays sound but incomplete at that depth.
const FORWARD_CAP: usize = 200_000;
const BACKWARD_CAP: usize = 20_000;

pub struct EnumerativeSearch {
    isa: Box<dyn Isa>,
}

impl Default for EnumerativeSearch {
    fn default() -> Self {
        EnumerativeSearch {
            isa: Box::new(Rv32),
        }
    }
}

/// A forward-table entry: the cheapest known program reaching one behavioral
/// signature, together with the concrete states it produces on each test.
struct ForwardEntry {
    states: Vec<ConcreteState>,
    program: Program,
    cost: u64,
}

/// A backward-table level: suffixes of one length, grouped by which
/// registers their pre-state pins so a forward state is probed with one
/// hash lookup per mask.
#[derive(Default)]
struct BackwardLevel {
    entries: Vec<(PartialState, Program, u64)>,
    groups: HashMap<u64, HashMap<Vec<u64>, (Program, u64)>>,
}

impl BackwardLevel {
    fn from_entries(raw: Vec<(PartialState, Program, u64)>) -> Self {
        // Branching multiplies raw entries; collapsing to the cheapest suffix
        // per distinct partial state keeps every level bounded by the number
        // of expressible partial states.
        let mut unique: HashMap<(u64, Vec<u64>), (PartialState, Program, u64)> = HashMap::new();
        for (partial, suffix, cost) in raw {
            let key = (partial.known_mask(), partial.known_values());
            match unique.get(&key) {
                Some((_, _, existing)) if *existing <= cost => {}
                _ => {
                    unique.insert(key, (partial, suffix, cost));
                }
            }
        }
        let entries: Vec<(PartialState, Program, u64)> = unique.into_values().collect();
        let mut groups: HashMap<u64, HashMap<Vec<u64>, (Program, u64)>> = HashMap::new();
        for (partial, suffix, cost) in &entries {
            groups
                .entry(partial.known_mask())
                .or_default()
                .insert(partial.known_values(), (suffix.clone(), *cost));
        }
        BackwardLevel { entries, groups }
    }
}

/// The per-task enumeration state: reduced-width tests, the instruction
/// list, and the lazily grown forward/backward tables.
struct Tables {
    reduced: MachineConfig,
    instructions: Vec<Instruction>,
    domain: Vec<u64>,
    reduced_cache: TestCache,
    forward: Vec<HashMap<Vec<u64>, ForwardEntry>>,
    backward: Vec<BackwardLevel>,
    /// Cost of the reference program; nothing above it is ever tabled.
    ceiling: u64,
}

fn signature(states: &[ConcreteState]) -> Vec<u64> {
    states.iter().flat_map(|s| s.regs().iter().copied()).collect()
}

fn project(state: &ConcreteState, mask: u64) -> Vec<u64> {
    (0..state.nregs())
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| state.get_reg(Reg(i as u8)))
        .collect()
}

/// Registers the task mentions anywhere; the enumeration works over these
/// alone to keep the tables small.
fn task_registers(task: &SearchTask) -> (Vec<Reg>, Vec<Reg>) {
    let mut regs: BTreeSet<Reg> = BTreeSet::new();
    regs.insert(Reg::ZERO);
    for instr in task
        .spec
        .iter()
        .chain(task.prefix.iter())
        .chain(task.postfix.iter())
    {
        regs.extend(instr.destination());
        regs.extend(instr.sources());
    }
    regs.extend(task.live_out.regs.iter().copied());
    let readable: Vec<Reg> = regs.iter().copied().collect();
    let writable: Vec<Reg> = regs.iter().copied().filter(|r| !r.is_zero()).collect();
    (readable, writable)
}

fn touches_memory(task: &SearchTask) -> bool {
    task.live_out.mem
        || task
            .spec
            .iter()
            .chain(task.prefix.iter())
            .chain(task.postfix.iter())
            .any(|i| i.opcode.accesses_memory())
}

impl Tables {
    /// `None` when the task cannot be enumerated: memory is observed or in
    /// play (a reduced-width machine has no faithful byte-addressed memory),
    /// or the pool is empty.
    fn build(
        isa: &dyn Isa,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
    ) -> Result<Option<Tables>, SearchError> {
        if touches_memory(task) {
            return Ok(None);
        }
        let reduced = model.config.reduced(config.enumerative.reduced_bits)?;
        let space = InstructionSpace::new(model);
        if space.is_empty() {
            return Ok(None);
        }
        let (readable, writable) = task_registers(task);
        let mut instructions = space.instructions_over(&readable, &writable);
        // Shift amounts beyond the reduced width alias ones below it and
        // would table duplicate behaviors.
        instructions.retain(|i| match i.operands {
            Operands::RrShamt { shamt, .. } => shamt < reduced.bits,
            _ => true,
        });
        if instructions.is_empty() {
            return Ok(None);
        }

        let inputs =
            generate_input_states(&reduced, config.enumerative.test_count.max(1), config.seed);
        let reduced_cache = TestCache::new(&reduced, task, inputs)?;
        let domain = value_domain(&reduced);

        // Forward seeds: each test input after the prefix.
        let mut entry_states = Vec::with_capacity(reduced_cache.len());
        for case in reduced_cache.cases() {
            entry_states.push(concrete::interpret(&reduced, &case.input, &task.prefix)?);
        }
        let mut level0 = HashMap::new();
        level0.insert(
            signature(&entry_states),
            ForwardEntry {
                states: entry_states,
                program: Vec::new(),
                cost: 0,
            },
        );

        // Backward seeds: the live registers of the first test's expected
        // output, pulled back through the postfix.
        let expected = &reduced_cache.cases()[0].expected;
        let mut seeds = vec![PartialState::from_live(expected, &task.live_out.regs)];
        for instr in task.postfix.iter().rev() {
            let mut next = Vec::new();
            for partial in &seeds {
                next.extend(step_backward_context(isa, &reduced, &domain, instr, partial));
                if next.len() >= BACKWARD_CAP {
                    break;
                }
            }
            seeds = next;
            if seeds.is_empty() {
                // The reference itself reaches the goal, so an empty
                // pull-back means a truncation artifact; give up cleanly.
                return Ok(None);
            }
        }
        let level0_backward =
            BackwardLevel::from_entries(seeds.into_iter().map(|p| (p, Vec::new(), 0)).collect());

        Ok(Some(Tables {
            reduced,
            instructions,
            domain,
            reduced_cache,
            forward: vec![level0],
            backward: vec![level0_backward],
            ceiling: model.costs.program_cost(&task.spec),
        }))
    }

    fn ensure_forward(
        &mut self,
        isa: &dyn Isa,
        model: &MachineModel,
        depth: usize,
        deadline: Instant,
    ) -> Result<(), SearchError> {
        while self.forward.len() <= depth {
            let prev = &self.forward[self.forward.len() - 1];
            let mut next: HashMap<Vec<u64>, ForwardEntry> = HashMap::new();
            'grow: for entry in prev.values() {
                if Instant::now() >= deadline {
                    break;
                }
                for instr in &self.instructions {
                    let cost = entry.cost + model.costs.cost(instr.opcode);
                    if cost >= self.ceiling {
                        continue;
                    }
                    if let Some(last) = entry.program.last() {
                        if isa.prune_pair(last.opcode, instr.opcode) {
                            continue;
                        }
                    }
                    let mut states = entry.states.clone();
                    for state in &mut states {
                        concrete::step(&self.reduced, state, instr, 0)?;
                    }
                    let key = signature(&states);
                    match next.get_mut(&key) {
                        Some(existing) if existing.cost <= cost => {}
                        _ => {
                            let mut program = entry.program.clone();
                            program.push(instr.clone());
                            next.insert(
                                key,
                                ForwardEntry {
                                    states,
                                    program,
                                    cost,
                                },
                            );
                        }
                    }
                    if next.len() >= FORWARD_CAP {
                        break 'grow;
                    }
                }
            }
            debug!(depth = self.forward.len(), entries = next.len(), "forward level built");
            self.forward.push(next);
        }
        Ok(())
    }

    fn ensure_backward(&mut self, isa: &dyn Isa, model: &MachineModel, depth: usize, deadline: Instant) {
        while self.backward.len() <= depth {
            let prev = &self.backward[self.backward.len() - 1];
            let mut next = Vec::new();
            'grow: for (partial, suffix, cost) in &prev.entries {
                if Instant::now() >= deadline {
                    break;
                }
                for instr in &self.instructions {
                    let new_cost = cost + model.costs.cost(instr.opcode);
                    if new_cost >= self.ceiling {
                        continue;
                    }
                    for pre in step_backward(isa, &self.reduced, &self.domain, instr, partial) {
                        let mut new_suffix = Vec::with_capacity(suffix.len() + 1);
                        new_suffix.push(instr.clone());
                        new_suffix.extend_from_slice(suffix);
                        next.push((pre, new_suffix, new_cost));
                        if next.len() >= BACKWARD_CAP {
                            break 'grow;
                        }
                    }
                }
            }
            debug!(depth = self.backward.len(), entries = next.len(), "backward level built");
            self.backward.push(BackwardLevel::from_entries(next));
        }
    }
}

impl EnumerativeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isa(isa: Box<dyn Isa>) -> Self {
        EnumerativeSearch { isa }
    }

    /// Probe the tables for a program of exactly `length` costing less than
    /// `bound`. Matches survive the reduced-width tests, the full-width
    /// tests, and finally the oracle.
    #[allow(clippy::too_many_arguments)]
    fn search_at_length(
        &self,
        tables: &mut Tables,
        full_cache: &mut TestCache,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        length: usize,
        bound: u64,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<(Program, u64, Confidence)>, SearchError> {
        let forward_depth = length.div_ceil(2);
        let backward_depth = length - forward_depth;
        tables.ensure_forward(self.isa.as_ref(), model, forward_depth, deadline)?;
        tables.ensure_backward(self.isa.as_ref(), model, backward_depth, deadline);
        let (Some(level), Some(back)) = (
            tables.forward.get(forward_depth),
            tables.backward.get(backward_depth),
        ) else {
            return Ok(None);
        };

        let min_cost = model.costs.min_instruction_cost();
        let mut best_tested: Option<(Program, u64)> = None;
        let mut counterexamples: Vec<ConcreteState> = Vec::new();
        for entry in level.values() {
            if Instant::now() >= deadline || config.should_stop(bound) {
                break;
            }
            if entry.cost + backward_depth as u64 * min_cost >= bound {
                continue;
            }
            for (mask, group) in &back.groups {
                let key = project(&entry.states[0], *mask);
                let Some((suffix, suffix_cost)) = group.get(&key) else {
                    continue;
                };
                let cost = entry.cost + suffix_cost;
                if cost >= bound {
                    continue;
                }
                let mut candidate = entry.program.clone();
                candidate.extend_from_slice(suffix);
                stats.candidates_evaluated += 1;
                if !tables.reduced_cache.passes(&tables.reduced, task, &candidate)? {
                    continue;
                }
                if !full_cache.passes(&model.config, task, &candidate)? {
                    continue;
                }
                stats.candidates_passed_fast += 1;

                stats.solver_queries += 1;
                match verify_candidate(&model.config, task, &candidate, &config.solver)? {
                    Verdict::Equivalent => {
                        stats.solver_equivalent += 1;
                        return Ok(Some((candidate, cost, Confidence::Verified)));
                    }
                    Verdict::Counterexample(witness) => {
                        debug!(length, "enumerated match refuted at full width");
                        counterexamples.push(witness);
                    }
                    Verdict::Unknown(reason) => {
                        debug!(length, %reason, "verification undecided, tested-only");
                        match &best_tested {
                            Some((_, best)) if *best <= cost => {}
                            _ => best_tested = Some((candidate, cost)),
                        }
                    }
                }
            }
        }
        for witness in counterexamples {
            full_cache.add_counterexample(&model.config, task, witness)?;
        }
        let tests = full_cache.len();
        Ok(best_tested.map(|(program, cost)| (program, cost, Confidence::TestedOnly { tests })))
    }

    fn candidate_lengths(&self, task: &SearchTask, config: &SearchConfig) -> Vec<usize> {
        match task.fixed_length {
            Some(length) => vec![length],
            None => {
                let max = task
                    .target_size
                    .max(1)
                    .min(config.enumerative.len_limit.max(1));
                (1..=max).collect()
            }
        }
    }

    fn run_linear(
        &self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<Improvement>, SearchError> {
        let Some(mut tables) = Tables::build(self.isa.as_ref(), task, model, config)? else {
            debug!(task = %task.name, "task not enumerable, skipped");
            return Ok(None);
        };
        let inputs = generate_input_states(
            &model.config,
            config.enumerative.test_count.max(1),
            config.seed,
        );
        let mut full_cache = TestCache::new(&model.config, task, inputs)?;

        let mut bound = stats.original_cost;
        let mut best = None;
        let min_cost = model.costs.min_instruction_cost();
        for length in self.candidate_lengths(task, config) {
            if length as u64 * min_cost >= bound {
                continue;
            }
            if Instant::now() >= deadline || config.should_stop(bound) {
                break;
            }
            if let Some((program, cost, confidence)) = self.search_at_length(
                &mut tables,
                &mut full_cache,
                task,
                model,
                config,
                length,
                bound,
                deadline,
                stats,
            )? {
                info!(task = %task.name, length, cost, "enumeration found a candidate");
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
                    strategy: Strategy::Enumerative,
                    confidence,
                });
            }
        }
        Ok(best)
    }

    fn run_binary(
        &self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
        deadline: Instant,
        stats: &mut SearchStatistics,
    ) -> Result<Option<Improvement>, SearchError> {
        let Some(mut tables) = Tables::build(self.isa.as_ref(), task, model, config)? else {
            return Ok(None);
        };
        let inputs = generate_input_states(
            &model.config,
            config.enumerative.test_count.max(1),
            config.seed,
        );
        let mut full_cache = TestCache::new(&model.config, task, inputs)?;

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
                match self.search_at_length(
                    &mut tables,
                    &mut full_cache,
                    task,
                    model,
                    config,
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
                            strategy: Strategy::Enumerative,
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
        &self,
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
        let base = n.min(config.enumerative.window_size).max(1);
        let mut sizes = vec![(base / 2).max(1), base, (2 * base).min(n), (4 * base).min(n)];
        sizes.retain(|w| *w <= config.enumerative.window_size);
        sizes.sort_unstable();
        sizes.dedup();

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
                let mut sub_stats = SearchStatistics::new(Strategy::Enumerative);
                sub_stats.original_cost = window_cost;
                let found =
                    self.run_linear(&sub_task, model, config, deadline, &mut sub_stats)?;
                stats.merge(&sub_stats);

                if let Some(window_improvement) = found {
                    let mut whole: Program = task.spec[..start].to_vec();
                    whole.extend_from_slice(&window_improvement.program);
                    whole.extend_from_slice(&task.spec[end..]);
                    let cost = model.costs.program_cost(&whole);
                    if cost < stats.original_cost {
                        info!(task = %task.name, start, end, cost, "window improvement");
                        stats.improvements_found += 1;
                        stats.best_cost_found = cost;
                        if window_improvement.is_verified() {
                            if let Some(shared) = &config.shared_best {
                                shared.try_update(cost);
                            }
                        }
                        return Ok(Some(Improvement {
                            program: whole,
                            cost,
                            strategy: Strategy::Enumerative,
                            confidence: window_improvement.confidence,
                        }));
                    }
                }
                start += w;
            }
        }
        Ok(None)
    }
}

impl Superoptimize for EnumerativeSearch {
    fn superoptimize(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        let deadline = start + task.time_limit.min(config.time_limit);
        let mut stats = SearchStatistics::new(Strategy::Enumerative);
        stats.original_cost = model.costs.program_cost(&task.spec);
        stats.best_cost_found = stats.original_cost;

        info!(task = %task.name, mode = ?config.enumerative.mode, original_cost = stats.original_cost, "starting enumeration");

        let best = match config.enumerative.mode {
            SearchMode::Linear => self.run_linear(task, model, config, deadline, &mut stats)?,
            SearchMode::Binary => self.run_binary(task, model, config, deadline, &mut stats)?,
            SearchMode::Partial => self.run_partial(task, model, config, deadline, &mut stats)?,
        };

        stats.elapsed_time = start.elapsed();
        match best {
            Some(improvement) => Ok(SearchOutcome::with_improvement(improvement, stats)),
            None => Ok(SearchOutcome::no_improvement(stats)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{encode, Opcode};
    use crate::machine::{CostModel, PoolConstraints};
    use crate::semantics::LiveOut;
    use std::time::Duration;

    fn small_model(groups: &[&str]) -> MachineModel {
        let mut model = MachineModel::new(MachineConfig::new(32, 6).unwrap());
        if !groups.is_empty() {
            model
                .apply_constraints(PoolConstraints::new().with_groups(groups.iter().copied()))
                .unwrap();
        }
        model
    }

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn test_shrinks_redundant_negations() {
        // not-not is the identity; a single mv wins.
        let model = small_model(&["or-synthesis"]);
        let spec = encode("not x1, x2\nnot x1, x1\nadd x1, x1, x3").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_time_limit(Duration::from_secs(120));
        let outcome = EnumerativeSearch::new()
            .superoptimize(&task, &model, &config())
            .unwrap();
        let improvement = outcome.improvement.expect("an improvement exists");
        assert!(improvement.cost < outcome.statistics.original_cost);
        assert_eq!(improvement.confidence, Confidence::Verified);
        // full-width equivalence was actually proved, not just tested
        assert!(outcome.statistics.solver_equivalent >= 1);
    }

    #[test]
    fn test_no_improvement_is_clean() {
        let model = small_model(&["and-synthesis"]);
        let spec = encode("add x1, x2, x3").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_time_limit(Duration::from_secs(120));
        let outcome = EnumerativeSearch::new()
            .superoptimize(&task, &model, &config())
            .unwrap();
        assert!(!outcome.found_improvement());
    }

    #[test]
    fn test_memory_task_is_skipped() {
        let model = small_model(&[]);
        let spec = encode("lw x1, 0(x2)\nlw x1, 0(x2)").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
        let outcome = EnumerativeSearch::new()
            .superoptimize(&task, &model, &config())
            .unwrap();
        assert!(!outcome.found_improvement());
        assert_eq!(outcome.statistics.solver_queries, 0);
    }

    #[test]
    fn test_reduced_width_match_is_verified_at_full_width() {
        // x + x == 2x holds at every width; the verified flag must come from
        // the oracle, not the 4-bit tables.
        let model = small_model(&["mul-synthesis"]);
        let spec = encode("slli x1, x2, 1\nadd x1, x1, x2\nsub x1, x1, x2").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_time_limit(Duration::from_secs(120));
        let outcome = EnumerativeSearch::new()
            .superoptimize(&task, &model, &config())
            .unwrap();
        let improvement = outcome.improvement.expect("an improvement exists");
        assert!(improvement.program.len() <= 2);
        assert_eq!(improvement.confidence, Confidence::Verified);
    }

    #[test]
    fn test_priced_out_and_is_rewritten() {
        // With and priced out of reach the pool still expresses it two ways:
        // not(not a | not b) at cost 4, and a + b - (a | b) at cost 3. Either
        // requires composing a forward prefix with a backward suffix.
        let model = small_model(&["and-synthesis"])
            .with_costs(CostModel::new().with_cost(Opcode::And, 1000))
            .unwrap();
        let spec = encode("and x1, x2, x3").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_target_size(4)
            .with_time_limit(Duration::from_secs(120));
        let outcome = EnumerativeSearch::new()
            .superoptimize(&task, &model, &config())
            .unwrap();
        let improvement = outcome.improvement.expect("an improvement exists");
        assert!(improvement.cost <= 4, "got cost {}", improvement.cost);
        assert_eq!(improvement.confidence, Confidence::Verified);
        assert!(improvement.program.iter().all(|i| i.opcode != Opcode::And));
    }

    #[test]
    fn test_cancellation_stops_early() {
        let model = small_model(&["mulh-synthesis"]);
        let spec = encode("mul x1, x2, x3\nadd x1, x1, x2\nsub x1, x1, x2").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
        let cfg = SearchConfig::default();
        cfg.cancel.cancel();
        let outcome = EnumerativeSearch::new()
            .superoptimize(&task, &model, &cfg)
            .unwrap();
        assert!(!outcome.found_improvement());
    }
}
