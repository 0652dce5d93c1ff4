use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use url::Url;

use super::models::{CycleSummary, ScrapeTask};
use super::worker::TaskRunner;
use crate::database::PriceRepository;
use crate::events::{EventSink, EventType};

/// Enumerates active competitor links and runs one task per link on a
/// bounded pool of workers
pub struct ScrapeScheduler {
    repository: Arc<dyn PriceRepository>,
    runner: Arc<TaskRunner>,
    events: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
}

impl ScrapeScheduler {
    pub fn new(
        repository: Arc<dyn PriceRepository>,
        runner: Arc<TaskRunner>,
        events: Arc<dyn EventSink>,
        worker_pool_size: usize,
    ) -> Self {
        Self {
            repository,
            runner,
            events,
            permits: Arc::new(Semaphore::new(worker_pool_size.max(1))),
        }
    }

    /// Builds the tasks of every active competitor.
    ///
    /// A competitor whose links cannot be loaded is skipped; links with an
    /// unusable URL are counted in `skipped`.
    pub async fn collect_tasks(&self, summary: &mut CycleSummary) -> Result<Vec<ScrapeTask>> {
        let competitors = self
            .repository
            .get_active_competitors()
            .await
            .context("Failed to load active competitors")?;
        summary.competitors = competitors.len();

        self.events.emit(
            EventType::ScrapingStatus,
            json!({"status": "scheduling", "competitors": competitors.len()}),
        );

        let mut tasks = Vec::new();
        for competitor in &competitors {
            let links = match self.repository.get_links_for_competitor(competitor.id).await {
                Ok(links) => links,
                Err(e) => {
                    error!(
                        "Failed to load links for competitor {} ({}): {:#}",
                        competitor.id, competitor.name, e
                    );
                    continue;
                }
            };

            for link in &links {
                if let Err(e) = Url::parse(&link.url) {
                    warn!("Skipping link {} with invalid URL '{}': {}", link.id, link.url, e);
                    summary.skipped += 1;
                    continue;
                }
                tasks.push(ScrapeTask::for_link(competitor, link));
            }
        }

        Ok(tasks)
    }

    /// One scheduling pass. Task failures are counted, never propagated.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();
        let tasks = self.collect_tasks(&mut summary).await?;
        summary.scheduled = tasks.len();

        info!(
            "Scheduled {} scrape tasks across {} competitors",
            summary.scheduled, summary.competitors
        );
        self.events.emit(
            EventType::ScrapingStatus,
            json!({"status": "scheduled", "tasks": summary.scheduled}),
        );

        let mut workers = JoinSet::new();
        for task in tasks {
            let runner = Arc::clone(&self.runner);
            let permits = Arc::clone(&self.permits);
            workers.spawn(async move {
                let _permit = permits.acquire_owned().await?;
                let link_id = task.link_id;
                runner
                    .run(task)
                    .await
                    .with_context(|| format!("Scrape task for link {link_id} failed"))
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(outcome)) if outcome.success => summary.succeeded += 1,
                Ok(Ok(_)) => summary.failed += 1,
                Ok(Err(e)) => {
                    summary.failed += 1;
                    error!("{:#}", e);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Scrape worker panicked: {}", e);
                }
            }
        }

        info!(
            "Scrape cycle completed: {} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
        self.events.emit(
            EventType::ScrapingStatus,
            json!({
                "status": "completed",
                "succeeded": summary.succeeded,
                "failed": summary.failed,
                "skipped": summary.skipped,
            }),
        );

        Ok(summary)
    }
}
