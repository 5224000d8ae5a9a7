//! Periodic execution of reconcilers
//!
//! Each reconciler gets its own task and its own interval. The first cycle runs
//! immediately; missed ticks are delayed rather than bursted, so cycles of one
//! reconciler never overlap. A failed cycle is logged and the task waits for its
//! next tick. Shutdown is observed between cycles only: an in-flight cycle
//! always finishes (commit or rollback) before its task exits.

use crate::error::ReconcileError;
use crate::reconciler::{CycleReport, Reconciler};
use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Per-reconciler counters returned on shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub name: String,
    pub cycles: u64,
    pub failed: u64,
    pub last_error: Option<String>,
}

impl CycleStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn observe(&mut self, result: &Result<CycleReport, ReconcileError>) {
        self.cycles += 1;
        if let Err(e) = result {
            self.failed += 1;
            self.last_error = Some(e.to_string());
        }
    }
}

/// Result of a single cycle, as reported by [`Scheduler::run_once`]
#[derive(Debug)]
pub struct CycleOutcome {
    pub name: String,
    pub elapsed: Duration,
    pub result: Result<CycleReport, ReconcileError>,
}

struct Entry {
    reconciler: Box<dyn Reconciler>,
    interval: Duration,
}

#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reconciler. A zero interval is clamped to one millisecond.
    pub fn add(&mut self, reconciler: Box<dyn Reconciler>, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        self.entries.push(Entry {
            reconciler,
            interval,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.reconciler.name().to_string())
            .collect()
    }

    /// Run exactly one cycle of every reconciler, concurrently.
    pub async fn run_once(self) -> Vec<CycleOutcome> {
        let cycles = self.entries.into_iter().map(|mut entry| async move {
            let name = entry.reconciler.name().to_string();
            let started = Instant::now();
            let result = run_logged(entry.reconciler.as_mut()).await;
            CycleOutcome {
                name,
                elapsed: started.elapsed(),
                result,
            }
        });
        join_all(cycles).await
    }

    /// Start one task per reconciler
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, _) = watch::channel(false);
        let tasks = self
            .entries
            .into_iter()
            .map(|entry| {
                let name = entry.reconciler.name().to_string();
                info!(
                    reconciler = %name,
                    interval_ms = entry.interval.as_millis() as u64,
                    "Starting reconciler"
                );
                let handle = tokio::spawn(drive(entry.reconciler, entry.interval, shutdown.subscribe()));
                (name, handle)
            })
            .collect();
        SchedulerHandle { shutdown, tasks }
    }
}

/// Running reconciler tasks
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<CycleStats>)>,
}

impl SchedulerHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every task, wait for in-flight cycles, and collect statistics.
    pub async fn shutdown(self) -> Vec<CycleStats> {
        info!(tasks = self.tasks.len(), "Stopping reconcilers");
        // No live receivers means every task already exited.
        let _ = self.shutdown.send(true);

        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| match joined {
                Ok(stats) => stats,
                Err(e) => {
                    error!(reconciler = %name, error = %e, "Reconciler task panicked");
                    CycleStats {
                        last_error: Some(e.to_string()),
                        ..CycleStats::new(&name)
                    }
                }
            })
            .collect()
    }
}

async fn drive(
    mut reconciler: Box<dyn Reconciler>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> CycleStats {
    let mut stats = CycleStats::new(reconciler.name());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        let result = run_logged(reconciler.as_mut()).await;
        stats.observe(&result);
    }

    info!(
        reconciler = %stats.name,
        cycles = stats.cycles,
        failed = stats.failed,
        "Reconciler stopped"
    );
    stats
}

async fn run_logged(reconciler: &mut dyn Reconciler) -> Result<CycleReport, ReconcileError> {
    let started = Instant::now();
    let result = reconciler.run_cycle().await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(report) if report.corrected() => {
            info!(reconciler = %reconciler.name(), elapsed_ms, summary = %report, "Cycle corrected drift");
        }
        Ok(report) => {
            debug!(reconciler = %reconciler.name(), elapsed_ms, summary = %report, "Cycle clean");
        }
        Err(e) if e.is_fatal() => {
            error!(reconciler = %reconciler.name(), error = %e, "Fatal error during cycle");
        }
        Err(e) => {
            warn!(reconciler = %reconciler.name(), elapsed_ms, error = %e, "Cycle failed, retrying next tick");
        }
    }
    result
}
