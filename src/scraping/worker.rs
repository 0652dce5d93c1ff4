use anyhow::{Context, Result};
use backoff::backoff::Backoff;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::models::{ScrapeTask, TaskOutcome};
use super::retry::RetryPolicy;
use crate::database::models::{LinkPriceChange, NewScrapeLog, ScrapeLogUpdate};
use crate::database::PriceRepository;
use crate::events::{EventSink, EventType, Notification};
use crate::extraction::{ExtractorSet, Observation};
use crate::metrics::ScrapeMetrics;
use crate::pricing::PriceDecisionEngine;

/// Runs one task to a terminal outcome: attempts with backoff, the scrape
/// log lifecycle, the link update and the follow-up price evaluation.
pub struct TaskRunner {
    repository: Arc<dyn PriceRepository>,
    extractors: ExtractorSet,
    events: Arc<dyn EventSink>,
    policy: RetryPolicy,
    engine: Option<Arc<PriceDecisionEngine>>,
}

impl TaskRunner {
    pub fn new(
        repository: Arc<dyn PriceRepository>,
        extractors: ExtractorSet,
        events: Arc<dyn EventSink>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            extractors,
            events,
            policy,
            engine: None,
        }
    }

    /// Re-evaluate the product whenever one of its links is observed
    pub fn with_engine(mut self, engine: Arc<PriceDecisionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub async fn run(&self, mut task: ScrapeTask) -> Result<TaskOutcome> {
        let log = self
            .repository
            .create_scrape_log(NewScrapeLog {
                competitor_id: task.competitor_id,
                url: task.url.clone(),
            })
            .await
            .with_context(|| format!("Failed to create scrape log for link {}", task.link_id))?;

        if let Err(e) = self
            .repository
            .update_scrape_log(log.id, ScrapeLogUpdate::started())
            .await
        {
            warn!("Failed to mark scrape log {} in progress: {:#}", log.id, e);
        }

        let started = Instant::now();
        let observation = self.extract_with_retry(&mut task).await;

        let mut success = observation.success;
        let mut error_message = observation.error.clone();
        let mut price_change = None;

        if success {
            match self
                .repository
                .save_observation(task.link_id, &observation)
                .await
            {
                Ok(change) => price_change = change,
                Err(e) => {
                    error!(
                        "Failed to save observation for link {}: {:#}",
                        task.link_id, e
                    );
                    success = false;
                    error_message = Some(format!("Failed to save observation: {e:#}"));
                }
            }
        }

        let metadata = log_metadata(&task, &observation, started.elapsed().as_millis() as u64);
        if let Err(e) = self
            .repository
            .update_scrape_log(
                log.id,
                ScrapeLogUpdate::finished(success, error_message.clone(), metadata),
            )
            .await
        {
            warn!("Failed to finalize scrape log {}: {:#}", log.id, e);
        }

        ScrapeMetrics::record_task(task.competitor_id, success);

        if success {
            if let Some(change) = &price_change {
                self.publish_price_change(change).await;
            }
            self.evaluate(task.product_id).await;
        } else {
            warn!(
                "Scrape task for link {} ({}) failed after {} attempt(s): {}",
                task.link_id,
                task.url,
                task.attempt,
                error_message.as_deref().unwrap_or("unknown error")
            );
        }

        Ok(TaskOutcome {
            log_id: log.id,
            link_id: task.link_id,
            success,
            attempts: task.attempt,
            observation,
            price_change,
        })
    }

    async fn extract_with_retry(&self, task: &mut ScrapeTask) -> Observation {
        let extractor = self.extractors.for_strategy(task.fetch_strategy);
        let mut backoff = self.policy.backoff();

        loop {
            task.attempt += 1;
            debug!(
                "Scraping link {} (attempt {}/{}): {}",
                task.link_id, task.attempt, self.policy.max_attempts, task.url
            );

            let observation = extractor.extract(&task.url, &task.rules).await;
            let outcome = if observation.success { "success" } else { "failure" };
            ScrapeMetrics::record_attempt(task.competitor_id, outcome);

            if !self.policy.should_retry(&observation, task.attempt) {
                return observation;
            }

            let delay = backoff.next_backoff().unwrap_or(self.policy.backoff_base);
            info!(
                "Scrape of link {} failed (attempt {}/{}): {}. Retrying in {}ms...",
                task.link_id,
                task.attempt,
                self.policy.max_attempts,
                observation.error.as_deref().unwrap_or("unknown error"),
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn publish_price_change(&self, change: &LinkPriceChange) {
        ScrapeMetrics::set_competitor_price(change.product_id, change.competitor_id, change.new_price);

        self.events.emit(
            EventType::PriceUpdate,
            json!({
                "kind": "competitor",
                "linkId": change.link_id,
                "productId": change.product_id,
                "competitorId": change.competitor_id,
                "oldPrice": change.old_price,
                "newPrice": change.new_price,
            }),
        );

        let notification = Notification::price_change(
            change.product_id,
            change.competitor_id,
            change.link_id,
            change.old_price,
            change.new_price,
        );
        if let Err(e) = self.repository.save_notification(&notification).await {
            warn!("Failed to persist notification: {:#}", e);
        }
        self.events
            .emit(EventType::Notification, notification.to_payload());
    }

    async fn evaluate(&self, product_id: i64) {
        let Some(engine) = &self.engine else {
            return;
        };
        if let Err(e) = engine.evaluate_product(product_id).await {
            error!(
                "Price evaluation after observation failed for product {}: {}",
                product_id, e
            );
        }
    }
}

fn log_metadata(task: &ScrapeTask, observation: &Observation, execution_time_ms: u64) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("execution_time_ms".to_string(), json!(execution_time_ms));
    metadata.insert("attempts".to_string(), json!(task.attempt));
    metadata.insert("strategy".to_string(), json!(task.fetch_strategy.as_str()));
    metadata.insert("link_id".to_string(), json!(task.link_id));
    metadata.insert("product_id".to_string(), json!(task.product_id));
    if let Some(price) = observation.valid_price() {
        metadata.insert("price".to_string(), json!(price));
    }
    if observation.metadata.get("proxy_used") == Some(&Value::Bool(true)) {
        metadata.insert("proxy_used".to_string(), Value::Bool(true));
    }
    metadata
}
