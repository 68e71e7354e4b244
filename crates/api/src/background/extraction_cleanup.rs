//! Periodic removal of old template extractions.
//!
//! Extractions are a cache of the archives stored in the database; removing
//! them only costs a re-extraction on the next access.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::services::template_storage::TemplateStorage;

/// Run the extraction cleanup loop.
///
/// Every `interval`, removes extractions older than `retention_days` days.
/// The first run happens immediately. Runs until `cancel` is triggered.
pub async fn run(
    storage: Arc<TemplateStorage>,
    retention_days: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_days,
        interval_secs = interval.as_secs(),
        "Extraction cleanup job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Extraction cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match storage.cleanup_old_extractions(retention_days).await {
                    Ok(cleaned) => {
                        if cleaned > 0 {
                            tracing::info!(cleaned, "Extraction cleanup: removed old extractions");
                        } else {
                            tracing::debug!("Extraction cleanup: nothing to remove");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Extraction cleanup: run failed");
                    }
                }
            }
        }
    }
}
