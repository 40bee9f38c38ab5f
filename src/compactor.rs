use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{Engine, EngineError};

/// How often the compactor looks at the WAL.
pub const COMPACT_INTERVAL: Duration = Duration::from_secs(60);

/// Rewrite the WAL if at least `threshold` events were appended since the
/// last compaction. Returns whether it ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    info!("compacting WAL after {appends} appends");
    engine.compact_wal().await?;
    Ok(true)
}

/// Background task that keeps the WAL from growing without bound.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&engine, threshold).await {
            warn!("WAL compaction failed: {e}");
        }
    }
}
