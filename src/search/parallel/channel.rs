//! Worker/coordinator channels and the shared best-cost cell

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::ir::Program;
use crate::search::config::Strategy;
use crate::search::result::{Confidence, SearchStatistics};

/// Message sent from a worker to the coordinator.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Worker found a cheaper program.
    Improvement {
        worker_id: usize,
        program: Program,
        cost: u64,
        strategy: Strategy,
        confidence: Confidence,
    },
    /// Worker has exhausted its search.
    Finished {
        worker_id: usize,
        statistics: SearchStatistics,
    },
    /// Worker failed.
    Error { worker_id: usize, message: String },
}

/// Best verified cost across all workers, polled lock-free by strategies at
/// step granularity. This cell is the whole coordinator-to-worker surface:
/// cancellation and cross-worker cost tightening both travel through it.
#[derive(Debug)]
pub struct SharedBest {
    /// Current best cost (`u64::MAX` means no solution yet).
    pub best_cost: AtomicU64,
    /// Flag to signal all workers to stop.
    pub should_stop: AtomicBool,
}

impl Default for SharedBest {
    fn default() -> Self {
        Self {
            best_cost: AtomicU64::new(u64::MAX),
            should_stop: AtomicBool::new(false),
        }
    }
}

impl SharedBest {
    /// Try to lower the best cost. Returns true if this is a new best.
    pub fn try_update(&self, new_cost: u64) -> bool {
        let mut current = self.best_cost.load(Ordering::SeqCst);
        loop {
            if new_cost >= current {
                return false;
            }
            match self.best_cost.compare_exchange_weak(
                current,
                new_cost,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(c) => current = c,
            }
        }
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    pub fn signal_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    /// Current best cost (`u64::MAX` if none found).
    pub fn current_best(&self) -> u64 {
        self.best_cost.load(Ordering::SeqCst)
    }
}

/// Channel endpoints handed to one worker.
pub struct WorkerChannels {
    pub to_coordinator: Sender<WorkerMessage>,
    pub shared: Arc<SharedBest>,
}

/// Channel endpoints kept by the coordinator.
pub struct CoordinatorChannels {
    pub from_workers: Receiver<WorkerMessage>,
    pub shared: Arc<SharedBest>,
}

/// Create the channel fabric for `num_workers` workers.
pub fn create_channels(num_workers: usize) -> (CoordinatorChannels, Vec<WorkerChannels>) {
    let shared = Arc::new(SharedBest::default());

    // Workers must never block on reporting.
    let (worker_tx, coordinator_rx) = unbounded();

    let worker_channels = (0..num_workers)
        .map(|_| WorkerChannels {
            to_coordinator: worker_tx.clone(),
            shared: Arc::clone(&shared),
        })
        .collect();

    let coordinator = CoordinatorChannels {
        from_workers: coordinator_rx,
        shared,
    };
    (coordinator, worker_channels)
}
