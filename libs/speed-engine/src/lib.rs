pub mod coordinator;
pub mod error;
pub mod rate;
pub mod report;
mod worker;

pub use coordinator::{BenchSettings, Coordinator, Phase, RunSummary, WorkerOutcome};
pub use error::EngineError;
pub use rate::{OpKind, RateCounter, RateCounters, RateSnapshot, RateWindow};
pub use report::{Reporter, format_line};
pub use worker::{WorkerSettings, spawn_worker};
