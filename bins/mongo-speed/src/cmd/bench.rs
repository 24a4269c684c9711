use std::sync::Arc;

use speed_api::StoreFactory;
use speed_engine::{Coordinator, RunSummary};
use storage_memory::MemoryStoreFactory;
use storage_mongodb::MongoStoreFactory;

use super::config::{Effective, StoreKind};
use super::error::SpeedError;

pub fn factory(eff: &Effective) -> Arc<dyn StoreFactory> {
    match eff.store {
        StoreKind::Mongodb => Arc::new(MongoStoreFactory::new(Some(eff.app_name.clone()))),
        StoreKind::Memory => Arc::new(MemoryStoreFactory::new()),
    }
}

/// Runs until Ctrl+C, then drains workers and cleans up.
pub async fn run(eff: Effective) -> Result<RunSummary, SpeedError> {
    tracing::info!(
        destination = %eff.destination,
        mode = ?eff.mode,
        store = ?eff.store,
        batch_size = eff.settings.batch_size,
        window_ms = eff.settings.window.as_millis() as u64,
        "starting"
    );

    let coordinator = Coordinator::new(factory(&eff), eff.destination, eff.mode, eff.settings);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C, stopping");
        }
    };

    let mut out = std::io::stdout();
    let summary = coordinator.run(shutdown, &mut out).await?;

    for w in &summary.workers {
        if let Err(e) = &w.result {
            tracing::warn!(worker = %w.op, error = %e, "worker ended early");
        }
    }
    tracing::info!(
        report_lines = summary.report_lines,
        seeded = summary.seeded,
        cleaned = ?summary.cleaned,
        remaining = ?summary.remaining,
        "shutdown complete"
    );
    Ok(summary)
}
