use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::config::models::DatabaseCleanupConfig;
use crate::config::MarketGuardConfig;
use crate::database::{run_cleanup, PriceRepository};
use crate::pricing::PriceDecisionEngine;
use crate::scraping::ScrapeScheduler;

/// The periodic jobs the daemon runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    ScrapeCycle,
    PriceEvaluation,
    Cleanup,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::ScrapeCycle => "scrape-cycle",
            JobKind::PriceEvaluation => "price-evaluation",
            JobKind::Cleanup => "scrape-log-cleanup",
        }
    }
}

/// Owns the cron scheduler and the jobs registered on it
pub struct JobManager {
    scheduler: JobScheduler,
    scrape: Arc<ScrapeScheduler>,
    engine: Arc<PriceDecisionEngine>,
    repository: Arc<dyn PriceRepository>,
    scheduled: Vec<(JobKind, String)>,
}

impl JobManager {
    pub async fn new(
        scrape: Arc<ScrapeScheduler>,
        engine: Arc<PriceDecisionEngine>,
        repository: Arc<dyn PriceRepository>,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;

        Ok(Self {
            scheduler,
            scrape,
            engine,
            repository,
            scheduled: Vec::new(),
        })
    }

    /// Registers every job enabled in `config` and starts the scheduler
    pub async fn start(&mut self, config: &MarketGuardConfig) -> Result<()> {
        self.schedule_scrape_cycle(&config.scraping.schedule).await?;
        self.schedule_price_evaluation(&config.pricing.schedule)
            .await?;

        if config.database_cleanup.enabled {
            self.schedule_cleanup(&config.database_cleanup).await?;
        } else {
            info!("Database cleanup is disabled in configuration");
        }

        self.scheduler
            .start()
            .await
            .context("Failed to start scheduler")?;

        info!("Job manager started with {} jobs", self.scheduled.len());
        Ok(())
    }

    /// Jobs registered so far with their cron expressions
    pub fn scheduled_jobs(&self) -> &[(JobKind, String)] {
        &self.scheduled
    }

    async fn schedule_scrape_cycle(&mut self, schedule: &str) -> Result<()> {
        let scrape = Arc::clone(&self.scrape);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let scrape = Arc::clone(&scrape);

            Box::pin(async move {
                debug!("Running scheduled scrape cycle");
                if let Err(e) = scrape.run_cycle().await {
                    error!("Scheduled scrape cycle failed: {:#}", e);
                }
            })
        })
        .context("Failed to create scrape cycle job")?;

        self.add(JobKind::ScrapeCycle, schedule, job).await
    }

    async fn schedule_price_evaluation(&mut self, schedule: &str) -> Result<()> {
        let engine = Arc::clone(&self.engine);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let engine = Arc::clone(&engine);

            Box::pin(async move {
                debug!("Running scheduled price evaluation");
                if let Err(e) = engine.evaluate_all().await {
                    error!("Scheduled price evaluation failed: {}", e);
                }
            })
        })
        .context("Failed to create price evaluation job")?;

        self.add(JobKind::PriceEvaluation, schedule, job).await
    }

    async fn schedule_cleanup(&mut self, config: &DatabaseCleanupConfig) -> Result<()> {
        let repository = Arc::clone(&self.repository);
        let cleanup = config.clone();

        let job = Job::new_async(config.schedule.as_str(), move |_uuid, _l| {
            let repository = Arc::clone(&repository);
            let cleanup = cleanup.clone();

            Box::pin(async move {
                info!("Running scheduled database cleanup");
                if let Err(e) = run_cleanup(&cleanup, repository.as_ref()).await {
                    error!("Database cleanup failed: {:#}", e);
                }
            })
        })
        .context("Failed to create cleanup job")?;

        self.add(JobKind::Cleanup, &config.schedule, job).await
    }

    async fn add(&mut self, kind: JobKind, schedule: &str, job: Job) -> Result<()> {
        self.scheduler
            .add(job)
            .await
            .with_context(|| format!("Failed to add {} job to scheduler", kind.name()))?;

        info!(
            "Scheduled job '{}' with cron expression '{}'",
            kind.name(),
            schedule
        );
        self.scheduled.push((kind, schedule.to_string()));
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping job manager");
        self.scheduler
            .shutdown()
            .await
            .context("Failed to shutdown scheduler")?;
        Ok(())
    }
}
