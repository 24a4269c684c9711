use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use speed_api::{AccessMode, BenchRecord, BenchStore, Destination, StoreError, StoreFactory};

use crate::error::EngineError;
use crate::rate::{OpKind, RateCounters, RateSnapshot};
use crate::report::Reporter;
use crate::worker::{WorkerSettings, spawn_worker};

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct BenchSettings {
    /// Records inserted before the workers start (writable mode only).
    pub seed_count: usize,
    /// Operations per batch; the shutdown flag is checked between batches.
    pub batch_size: usize,
    /// Minimum rate window.
    pub window: Duration,
    /// Reporter polling period.
    pub poll: Duration,
    /// Minimum gap between two report lines.
    pub report_every: Duration,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            seed_count: 1000,
            batch_size: 10,
            window: Duration::from_millis(1800),
            poll: Duration::from_secs(1),
            report_every: Duration::from_secs(2),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Phase / summary
// ═══════════════════════════════════════════════════════════════

/// `Idle → Seeding → Running → Stopping → CleaningUp → Terminated`.
/// Seeding and CleaningUp are skipped in read-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Seeding,
    Running,
    Stopping,
    CleaningUp,
    Terminated,
}

#[derive(Debug)]
pub struct WorkerOutcome {
    pub op: OpKind,
    /// Completed operations, or why the worker ended early.
    pub result: Result<u64, String>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub phases: Vec<Phase>,
    pub seeded: usize,
    pub workers: Vec<WorkerOutcome>,
    pub report_lines: u64,
    pub last_rates: RateSnapshot,
    /// `None` when cleanup was skipped or failed.
    pub cleaned: Option<u64>,
    /// Marker records still present after cleanup, `None` when not counted.
    pub remaining: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

pub struct Coordinator {
    factory: Arc<dyn StoreFactory>,
    destination: Destination,
    mode: AccessMode,
    settings: BenchSettings,
    counters: Arc<RateCounters>,
    token: CancellationToken,
    phases: Vec<Phase>,
}

impl Coordinator {
    pub fn new(
        factory: Arc<dyn StoreFactory>,
        destination: Destination,
        mode: AccessMode,
        settings: BenchSettings,
    ) -> Self {
        Self {
            factory,
            destination,
            mode,
            settings,
            counters: Arc::new(RateCounters::default()),
            token: CancellationToken::new(),
            phases: vec![Phase::Idle],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Idle)
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!(from = ?self.phase(), to = ?phase, "phase");
        self.phases.push(phase);
    }

    /// Operation kinds that get a worker in this mode.
    pub fn worker_ops(mode: AccessMode) -> &'static [OpKind] {
        match mode {
            AccessMode::ReadOnly => &[OpKind::Read],
            AccessMode::ReadWrite => &[OpKind::Read, OpKind::Write, OpKind::Remove],
        }
    }

    /// Full run. `shutdown` resolving is the stop signal (Ctrl+C in the binary);
    /// status and report lines go to `out`.
    pub async fn run<W, F>(mut self, shutdown: F, out: &mut W) -> Result<RunSummary, EngineError>
    where
        W: Write + ?Sized,
        F: Future<Output = ()>,
    {
        tracing::info!(destination = %self.destination, mode = ?self.mode, "mongo-speed starting");

        // Own handle for seeding and cleanup; workers get theirs below.
        let admin = self
            .factory
            .open(&self.destination, self.mode)
            .await
            .map_err(EngineError::store("open"))?;

        // --- Seeding ---
        let mut seeded = 0;
        if self.mode.is_writable() {
            self.enter(Phase::Seeding);
            writeln!(out, "Seeding collection with some records.")?;
            seeded = seed(&*admin, self.settings.seed_count)
                .await
                .map_err(EngineError::store("seed"))?;
            tracing::info!(seeded, "seeded collection");
        }

        // --- Running ---
        let ops = Self::worker_ops(self.mode);
        let mut stores = Vec::with_capacity(ops.len());
        for op in ops {
            let store = self
                .factory
                .open(&self.destination, self.mode)
                .await
                .map_err(EngineError::store("open"))?;
            stores.push((*op, store));
        }

        self.enter(Phase::Running);
        let started = writeln!(out, "Doing things and counting them.").and_then(|()| out.flush());

        let worker_settings = WorkerSettings {
            batch_size: self.settings.batch_size,
            window: self.settings.window,
        };
        let handles: Vec<(OpKind, JoinHandle<Result<u64, StoreError>>)> = stores
            .into_iter()
            .map(|(op, store)| {
                tracing::info!(worker = %op, "spawned worker");
                (op, spawn_worker(op, store, self.counters.clone(), worker_settings, self.token.clone()))
            })
            .collect();

        let reporter = Reporter {
            mode: self.mode,
            poll: self.settings.poll,
            every: self.settings.report_every,
        };
        let reported = match started {
            Ok(()) => reporter.run_until(&self.counters, &mut *out, shutdown).await,
            Err(e) => Err(e),
        };

        // --- Stopping ---
        // A broken output stops the run like the stop signal does; the
        // error is returned after workers are joined and cleanup is done.
        self.enter(Phase::Stopping);
        self.token.cancel();
        let (report_lines, output_err) = match reported {
            Ok(n) => {
                writeln!(out).ok();
                writeln!(out, "Stopping things.").ok();
                (n, None)
            }
            Err(e) => {
                tracing::error!(error = %e, "report output failed");
                (0, Some(e))
            }
        };

        let mut workers = Vec::with_capacity(handles.len());
        for (op, handle) in handles {
            let result = match handle.await {
                Ok(Ok(total)) => Ok(total),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => {
                    tracing::error!(worker = %op, error = %e, "worker task failed");
                    Err(e.to_string())
                }
            };
            tracing::info!(worker = %op, result = ?result, "worker joined");
            workers.push(WorkerOutcome { op, result });
        }

        // --- CleaningUp ---
        let mut cleaned = None;
        let mut remaining = None;
        if self.mode.is_writable() {
            self.enter(Phase::CleaningUp);
            writeln!(out, "Cleaning up.").ok();
            match admin.remove_marked().await {
                Ok(n) => {
                    tracing::info!(removed = n, "cleanup complete");
                    cleaned = Some(n);
                }
                Err(e) => tracing::warn!(error = ?e, "cleanup failed"),
            }
            match admin.count_marked().await {
                Ok(0) => remaining = Some(0),
                Ok(n) => {
                    tracing::warn!(remaining = n, "marker records left after cleanup");
                    remaining = Some(n);
                }
                Err(e) => tracing::warn!(error = ?e, "counting marker records failed"),
            }
        }
        out.flush().ok();

        self.enter(Phase::Terminated);
        if let Some(e) = output_err {
            return Err(EngineError::Output(e));
        }
        Ok(RunSummary {
            phases: self.phases,
            seeded,
            workers,
            report_lines,
            last_rates: self.counters.snapshot(),
            cleaned,
            remaining,
        })
    }
}

/// Insert `count` records with fresh synthetic ids. Duplicate-key
/// rejections are skipped; returns how many were inserted.
async fn seed(store: &dyn BenchStore, count: usize) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for seq in (0u64..).take(count) {
        match store.insert(&BenchRecord::new(seq)).await {
            Ok(()) => inserted += 1,
            Err(e) if e.is_duplicate() => tracing::debug!(seq, "duplicate id ignored while seeding"),
            Err(e) => return Err(e),
        }
    }
    Ok(inserted)
}
