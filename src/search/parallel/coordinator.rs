//! Parallel coordinator: spawns one strategy per worker and takes the best
//! verified result

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::machine::MachineModel;
use crate::search::cegis::CegisSearch;
use crate::search::config::{SearchConfig, Strategy};
use crate::search::enumerative::EnumerativeSearch;
use crate::search::result::{Confidence, Improvement, SearchOutcome, SearchStatistics};
use crate::search::stochastic::StochasticSearch;
use crate::search::{SearchTask, Superoptimize};

use super::channel::{create_channels, CoordinatorChannels, WorkerChannels, WorkerMessage};
use super::config::ParallelConfig;

/// The hybrid driver behind [`Strategy::Hybrid`]: a [`Superoptimize`] facade
/// over [`run_parallel_search`].
#[derive(Debug, Clone, Default)]
pub struct HybridSearch {
    pub parallel: ParallelConfig,
}

impl HybridSearch {
    pub fn new(parallel: ParallelConfig) -> Self {
        HybridSearch { parallel }
    }
}

impl Superoptimize for HybridSearch {
    fn superoptimize(
        &mut self,
        task: &SearchTask,
        model: &MachineModel,
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError> {
        run_parallel_search(task, model, config, &self.parallel)
    }
}

/// Run every configured strategy in parallel on `task` and keep the best
/// result, preferring verified improvements over tested-only ones.
pub fn run_parallel_search(
    task: &SearchTask,
    model: &MachineModel,
    search_config: &SearchConfig,
    parallel_config: &ParallelConfig,
) -> Result<SearchOutcome, SearchError> {
    let start = Instant::now();
    let num_workers = parallel_config.num_workers.max(1);
    let (coordinator_channels, worker_channels) = create_channels(num_workers);

    let task = Arc::new(task.clone());
    let model = Arc::new(model.clone());
    let search_config = Arc::new(search_config.clone());
    let parallel_config_arc = Arc::new(parallel_config.clone());

    info!(
        task = %task.name,
        workers = num_workers,
        strategies = ?parallel_config.strategies,
        "starting parallel search"
    );

    let handles: Vec<_> = worker_channels
        .into_iter()
        .enumerate()
        .map(|(worker_id, channels)| {
            let task = Arc::clone(&task);
            let model = Arc::clone(&model);
            let search_config = Arc::clone(&search_config);
            let parallel_config = Arc::clone(&parallel_config_arc);
            std::thread::spawn(move || {
                run_worker(worker_id, &task, &model, &search_config, &parallel_config, channels)
            })
        })
        .collect();

    let outcome = run_coordinator(
        &task,
        &model,
        coordinator_channels,
        parallel_config,
        num_workers,
        start,
    );

    let mut panicked = false;
    for handle in handles {
        panicked |= handle.join().is_err();
    }
    if panicked {
        return Err(SearchError::WorkerPanic);
    }
    outcome
}

fn run_coordinator(
    task: &SearchTask,
    model: &MachineModel,
    channels: CoordinatorChannels,
    config: &ParallelConfig,
    num_workers: usize,
    start: Instant,
) -> Result<SearchOutcome, SearchError> {
    let mut stats = SearchStatistics::new(Strategy::Hybrid);
    stats.original_cost = model.costs.program_cost(&task.spec);
    stats.best_cost_found = stats.original_cost;

    let deadline = start + config.timeout.unwrap_or(task.time_limit);
    let mut best: Option<Improvement> = None;
    let mut finished = 0usize;

    loop {
        if Instant::now() >= deadline {
            channels.shared.signal_stop();
        }

        match channels.from_workers.recv_timeout(Duration::from_millis(100)) {
            Ok(WorkerMessage::Improvement {
                worker_id,
                program,
                cost,
                strategy,
                confidence,
            }) => {
                debug!(worker_id, cost, %strategy, "worker reported an improvement");
                // The first verified result wins; arrival order breaks ties
                // and later arrivals are ignored.
                if best.as_ref().is_some_and(Improvement::is_verified) {
                    continue;
                }
                let candidate = Improvement {
                    program,
                    cost,
                    strategy,
                    confidence,
                };
                if prefer(&candidate, best.as_ref()) {
                    if candidate.is_verified() {
                        stats.best_cost_found = stats.best_cost_found.min(cost);
                        // Remaining workers see the stop flag and the
                        // tightened bound at their next step poll.
                        channels.shared.try_update(cost);
                        channels.shared.signal_stop();
                    }
                    best = Some(candidate);
                }
            }
            Ok(WorkerMessage::Finished {
                worker_id,
                statistics,
            }) => {
                debug!(worker_id, "worker finished");
                stats.merge(&statistics);
                finished += 1;
                if finished >= num_workers {
                    break;
                }
            }
            Ok(WorkerMessage::Error { worker_id, message }) => {
                warn!(worker_id, %message, "worker failed");
                finished += 1;
                if finished >= num_workers {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    stats.elapsed_time = start.elapsed();
    if let Some(improvement) = &best {
        stats.improvements_found += 1;
        info!(
            task = %task.name,
            cost = improvement.cost,
            strategy = %improvement.strategy,
            verified = improvement.is_verified(),
            "parallel search finished with an improvement"
        );
    }
    Ok(match best {
        Some(improvement) => SearchOutcome::with_improvement(improvement, stats),
        None => SearchOutcome::no_improvement(stats),
    })
}

/// Whether `candidate` should replace the incumbent: verified beats
/// tested-only, then lower cost wins.
fn prefer(candidate: &Improvement, incumbent: Option<&Improvement>) -> bool {
    match incumbent {
        None => true,
        Some(best) => match (candidate.is_verified(), best.is_verified()) {
            (true, false) => true,
            (false, true) => false,
            _ => candidate.cost < best.cost,
        },
    }
}

fn run_worker(
    worker_id: usize,
    task: &SearchTask,
    model: &MachineModel,
    search_config: &SearchConfig,
    parallel_config: &ParallelConfig,
    channels: WorkerChannels,
) {
    let strategy = parallel_config.strategy_for(worker_id);
    let mut config = search_config.clone();
    config.seed = parallel_config
        .base_seed
        .unwrap_or(search_config.seed)
        .wrapping_add(worker_id as u64);
    config.shared_best = Some(Arc::clone(&channels.shared));

    let outcome = match strategy {
        Strategy::Cegis => CegisSearch::new().superoptimize(task, model, &config),
        Strategy::Stochastic => StochasticSearch::new().superoptimize(task, model, &config),
        Strategy::Enumerative => EnumerativeSearch::new().superoptimize(task, model, &config),
        Strategy::Hybrid => unreachable!("the driver never assigns itself"),
    };

    match outcome {
        Ok(outcome) => {
            if let Some(improvement) = outcome.improvement {
                let _ = channels.to_coordinator.send(WorkerMessage::Improvement {
                    worker_id,
                    program: improvement.program,
                    cost: improvement.cost,
                    strategy,
                    confidence: improvement.confidence,
                });
            }
            let _ = channels.to_coordinator.send(WorkerMessage::Finished {
                worker_id,
                statistics: outcome.statistics,
            });
        }
        Err(error) => {
            let _ = channels.to_coordinator.send(WorkerMessage::Error {
                worker_id,
                message: error.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{encode, Reg};
    use crate::machine::{MachineConfig, PoolConstraints};
    use crate::semantics::LiveOut;

    fn small_model(groups: &[&str]) -> MachineModel {
        let mut model = MachineModel::new(MachineConfig::new(32, 6).unwrap());
        if !groups.is_empty() {
            model
                .apply_constraints(PoolConstraints::new().with_groups(groups.iter().copied()))
                .unwrap();
        }
        model
    }

    #[test]
    fn test_single_worker_finds_improvement() {
        let model = small_model(&["and-synthesis"]);
        let spec = encode("add x1, x2, x2\nadd x1, x1, x2\nadd x1, x1, x2").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_time_limit(Duration::from_secs(120));
        let parallel = ParallelConfig::default()
            .with_workers(1)
            .with_strategies([Strategy::Cegis]);
        let outcome =
            run_parallel_search(&task, &model, &SearchConfig::default(), &parallel).unwrap();
        let improvement = outcome.improvement.expect("an improvement exists");
        assert!(improvement.is_verified());
        assert!(improvement.cost < outcome.statistics.original_cost);
    }

    #[test]
    fn test_multiple_workers_aggregate_statistics() {
        let model = small_model(&["and-synthesis"]);
        let spec = encode("add x1, x2, x3").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
            .with_time_limit(Duration::from_secs(30));
        let mut config = SearchConfig::default();
        config.stochastic.iterations = 2_000;
        let parallel = ParallelConfig::default()
            .with_workers(2)
            .with_strategies([Strategy::Stochastic])
            .with_seed(42);
        let outcome = run_parallel_search(&task, &model, &config, &parallel).unwrap();
        // Both workers ran a walk; with no improvement possible the iteration
        // counters are still folded in.
        assert!(outcome.statistics.iterations > 0);
    }

    #[test]
    fn test_prefer_verified_over_cheaper_tested() {
        let verified = Improvement {
            program: vec![],
            cost: 5,
            strategy: Strategy::Cegis,
            confidence: Confidence::Verified,
        };
        let tested = Improvement {
            program: vec![],
            cost: 2,
            strategy: Strategy::Stochastic,
            confidence: Confidence::TestedOnly { tests: 64 },
        };
        assert!(prefer(&verified, Some(&tested)));
        assert!(!prefer(&tested, Some(&verified)));
        assert!(prefer(&tested, None));
    }

    #[test]
    fn test_verified_winner_outlasts_later_arrivals() {
        // Script the worker side of the channels: worker 1 reports a verified
        // improvement, then worker 0 reports a cheaper tested-only one.
        let model = MachineModel::default();
        let spec = encode("add x1, x2, x2\nadd x1, x1, x2\nadd x1, x1, x2").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
        let (coordinator, workers) = create_channels(3);

        let winner = encode("slli x1, x2, 2").unwrap();
        workers[1]
            .to_coordinator
            .send(WorkerMessage::Improvement {
                worker_id: 1,
                program: winner.clone(),
                cost: 2,
                strategy: Strategy::Cegis,
                confidence: Confidence::Verified,
            })
            .unwrap();
        workers[0]
            .to_coordinator
            .send(WorkerMessage::Improvement {
                worker_id: 0,
                program: encode("add x1, x2, x3").unwrap(),
                cost: 1,
                strategy: Strategy::Stochastic,
                confidence: Confidence::TestedOnly { tests: 32 },
            })
            .unwrap();
        for worker_id in 0..3 {
            workers[worker_id]
                .to_coordinator
                .send(WorkerMessage::Finished {
                    worker_id,
                    statistics: SearchStatistics::new(Strategy::Stochastic),
                })
                .unwrap();
        }
        let shared = Arc::clone(&coordinator.shared);
        drop(workers);

        let outcome = run_coordinator(
            &task,
            &model,
            coordinator,
            &ParallelConfig::default().with_workers(3),
            3,
            Instant::now(),
        )
        .unwrap();

        let improvement = outcome.improvement.expect("the verified result is kept");
        assert!(improvement.is_verified());
        assert_eq!(improvement.cost, 2);
        assert_eq!(improvement.program, winner);
        // The verified arrival signalled every remaining worker to stop.
        assert!(shared.should_stop());
        assert_eq!(shared.current_best(), 2);
    }

    #[test]
    fn test_cancelled_search_terminates() {
        let model = small_model(&["mulh-synthesis"]);
        let spec = encode("mul x1, x2, x3\nadd x1, x1, x2").unwrap();
        let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]));
        let config = SearchConfig::default();
        config.cancel.cancel();
        let parallel = ParallelConfig::default()
            .with_workers(2)
            .with_strategies([Strategy::Stochastic, Strategy::Enumerative]);
        let outcome = run_parallel_search(&task, &model, &config, &parallel).unwrap();
        assert!(!outcome.found_improvement());
    }
}
