//! End-to-end optimization scenarios exercising each strategy through the
//! public API: build a model, pose a task, run a search, check the result
//! against the oracle's verdict.

use std::time::Duration;

use riscv_superoptimizer::{
    encode, run_parallel_search, CancelToken, CostModel, EnumerativeSearch, LiveOut, MachineConfig,
    MachineModel, Opcode, ParallelConfig, PoolConstraints, Reg, SearchConfig, SearchTask,
    StochasticSearch, Strategy, Superoptimize,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// `and` rewritten with only `not` and `or`: the enumerative tables have to
/// meet in the middle on the De Morgan form `~(~a | ~b)`.
#[test]
fn test_de_morgan_rewrite_with_not_and_or() {
    init_tracing();
    let costs = CostModel::new().with_cost(Opcode::And, 1000);
    let mut model = MachineModel::default().with_costs(costs).unwrap();
    model
        .apply_constraints(PoolConstraints::new().with_whitelist(vec![Opcode::Not, Opcode::Or]))
        .unwrap();

    let task = SearchTask::new(encode("and x1, x2, x3").unwrap(), LiveOut::regs([Reg(1)]))
        .with_name("de-morgan")
        .with_target_size(4)
        .with_time_limit(Duration::from_secs(120));
    let config = SearchConfig::default().with_seed(7);

    let outcome = EnumerativeSearch::new()
        .superoptimize(&task, &model, &config)
        .unwrap();

    let improvement = outcome.improvement.expect("De Morgan form exists at cost 4");
    assert!(improvement.is_verified());
    assert_eq!(improvement.cost, 4);
    assert!(improvement
        .program
        .iter()
        .all(|i| matches!(i.opcode, Opcode::Not | Opcode::Or | Opcode::Nop)));
}

/// The pool cost threshold removes opcodes the model prices out, so search
/// never proposes them even when they would be the obvious rewrite.
#[test]
fn test_priced_out_opcode_never_appears_in_result() {
    init_tracing();
    let costs = CostModel::new().with_cost(Opcode::Slli, 1000);
    let model = MachineModel::default().with_costs(costs).unwrap();
    assert!(model.pool().opcodes().iter().all(|op| *op != Opcode::Slli));

    // x1 = 4 * x2; the cheap rewrite slli x1, x2, 2 is off the table.
    let spec = encode("add x1, x2, x2\nadd x1, x1, x2\nadd x1, x1, x2").unwrap();
    let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
        .with_name("no-slli")
        .with_time_limit(Duration::from_secs(30));
    let mut config = SearchConfig::default().with_seed(3);
    config.stochastic.iterations = 20_000;

    let outcome = StochasticSearch::new()
        .superoptimize(&task, &model, &config)
        .unwrap();
    if let Some(improvement) = outcome.improvement {
        assert!(improvement.program.iter().all(|i| i.opcode != Opcode::Slli));
    }
}

/// Signed-less-than computed the long way, with a dead xor against x0 at the
/// end. The MCMC walk over the slt-synthesis group degrades the dead
/// instruction to a free nop and the oracle confirms the shorter form.
#[test]
fn test_stochastic_trims_redundant_slt_computation() {
    init_tracing();
    let mut model = MachineModel::default();
    model
        .apply_constraints(PoolConstraints::new().with_groups(["slt-synthesis"]))
        .unwrap();

    // slt(a, b) == sltu(a, b) ^ sign(a) ^ sign(b)
    let spec = encode(
        "xor x4, x2, x3\n\
         srli x4, x4, 31\n\
         sltu x1, x2, x3\n\
         xor x1, x1, x4\n\
         xor x1, x1, x0",
    )
    .unwrap();
    let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
        .with_name("slt-long-form")
        .with_time_limit(Duration::from_secs(120));
    let mut config = SearchConfig::default().with_seed(11);
    config.stochastic.iterations = 500_000;

    let outcome = StochasticSearch::new()
        .superoptimize(&task, &model, &config)
        .unwrap();

    let improvement = outcome
        .improvement
        .expect("dropping the xor against x0 is one mutation away");
    assert!(improvement.is_verified());
    assert!(improvement.cost <= 4, "got cost {}", improvement.cost);
    assert_eq!(outcome.statistics.original_cost, 5);
}

/// Synthesize mode: a single `slt` whose opcode is absent from the pool. The
/// walk starts from a random length-4 program over the slt-synthesis group
/// and has to land on `sltu(a, b) ^ sign(a ^ b)` (or an equivalent), with the
/// oracle confirming the find.
#[test]
fn test_stochastic_synthesizes_slt_from_random_start() {
    init_tracing();
    // Three usable registers keep the operand space small enough for the
    // walk to converge dependably.
    let mut model = MachineModel::new(MachineConfig::new(32, 4).unwrap());
    model
        .apply_constraints(PoolConstraints::new().with_groups(["slt-synthesis"]))
        .unwrap();
    assert!(model.pool().opcodes().iter().all(|op| *op != Opcode::Slt));

    let task = SearchTask::new(encode("slt x1, x2, x3").unwrap(), LiveOut::regs([Reg(1)]))
        .with_name("slt-synthesis")
        .with_fixed_length(4)
        .with_time_limit(Duration::from_secs(300));
    let mut config = SearchConfig::default().with_seed(13);
    config.stochastic.iterations = 3_000_000;
    config.stochastic.test_count = 8;

    let outcome = StochasticSearch::new()
        .superoptimize(&task, &model, &config)
        .unwrap();

    let improvement = outcome
        .improvement
        .expect("a four-instruction slt form exists over the group");
    assert!(improvement.is_verified());
    assert!(improvement.cost <= 4, "got cost {}", improvement.cost);
    assert!(improvement.program.iter().all(|i| i.opcode != Opcode::Slt));
}

/// The parallel driver returns the first oracle-verified improvement and
/// reports aggregate statistics under the hybrid strategy label.
#[test]
fn test_parallel_driver_returns_verified_winner() {
    init_tracing();
    let model = MachineModel::default();
    // x1 = 4 * x2, one slli away.
    let spec = encode("add x1, x2, x2\nadd x1, x1, x2\nadd x1, x1, x2").unwrap();
    let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
        .with_name("times-four")
        .with_time_limit(Duration::from_secs(120));
    let config = SearchConfig::default().with_seed(1);
    let parallel = ParallelConfig::default()
        .with_workers(2)
        .with_strategies(vec![Strategy::Cegis, Strategy::Enumerative])
        .with_seed(1);

    let outcome = run_parallel_search(&task, &model, &config, &parallel).unwrap();

    let improvement = outcome.improvement.expect("a one-instruction form exists");
    assert!(improvement.is_verified());
    assert!(improvement.cost < 3);
    assert_eq!(outcome.statistics.strategy, Strategy::Hybrid);
    assert_eq!(outcome.statistics.original_cost, 3);
}

/// Three workers race on the same task; a verified result stops the others
/// and whatever they report afterwards cannot displace it.
#[test]
fn test_three_worker_race_keeps_the_verified_winner() {
    init_tracing();
    let model = MachineModel::default();
    let spec = encode("add x1, x2, x2\nadd x1, x1, x2\nadd x1, x1, x2").unwrap();
    let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
        .with_name("three-way-race")
        .with_time_limit(Duration::from_secs(120));
    let mut config = SearchConfig::default().with_seed(2);
    // A walk long enough that the stochastic worker is still running when a
    // deterministic strategy verifies; it must halt on the shared stop flag.
    config.stochastic.iterations = 50_000_000;
    let parallel = ParallelConfig::default()
        .with_workers(3)
        .with_strategies(vec![
            Strategy::Cegis,
            Strategy::Enumerative,
            Strategy::Stochastic,
        ])
        .with_seed(2);

    let outcome = run_parallel_search(&task, &model, &config, &parallel).unwrap();

    let improvement = outcome.improvement.expect("a one-instruction form exists");
    assert!(improvement.is_verified());
    assert!(improvement.cost < 3);
    assert_eq!(outcome.statistics.original_cost, 3);
}

/// Cancelling before the search starts makes every strategy and the driver
/// return promptly without an improvement.
#[test]
fn test_cancelled_driver_returns_promptly() {
    init_tracing();
    let model = MachineModel::default();
    let spec = encode("add x1, x2, x2\nadd x1, x1, x2").unwrap();
    let task = SearchTask::new(spec, LiveOut::regs([Reg(1)]))
        .with_name("cancelled")
        .with_time_limit(Duration::from_secs(120));

    let cancel = CancelToken::new();
    cancel.cancel();
    let config = SearchConfig::default().with_cancel(cancel);
    let parallel = ParallelConfig::default()
        .with_workers(2)
        .with_strategies(vec![Strategy::Stochastic, Strategy::Enumerative]);

    let outcome = run_parallel_search(&task, &model, &config, &parallel).unwrap();
    assert!(outcome.improvement.is_none());
}
