use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use super::repository::PriceRepository;
use crate::config::models::DatabaseCleanupConfig;

/// Deletes scrape logs past the retention window
pub async fn run_cleanup(
    config: &DatabaseCleanupConfig,
    repository: &dyn PriceRepository,
) -> Result<u64> {
    let start_time = Utc::now();

    let deleted = repository
        .delete_scrape_logs_older_than(config.retention_days)
        .await?;

    let duration = Utc::now() - start_time;

    if deleted > 0 {
        info!(
            "Database cleanup completed: deleted {} scrape logs (retention: {} days) in {:.2}s",
            deleted,
            config.retention_days,
            duration.num_milliseconds() as f64 / 1000.0
        );
    } else {
        debug!(
            "Database cleanup completed: no old scrape logs to delete ({:.2}s)",
            duration.num_milliseconds() as f64 / 1000.0
        );
    }

    Ok(deleted)
}
