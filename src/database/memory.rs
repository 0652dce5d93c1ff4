//! In-process repository for tests and embedding.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Map;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::models::{
    Competitor, CompetitorLink, LinkPriceChange, NewPriceHistory, NewScrapeLog, PriceHistoryEntry,
    Product, ScrapeLog, ScrapeLogUpdate, ScrapeStatus,
};
use super::repository::PriceRepository;
use crate::events::Notification;
use crate::extraction::Observation;

#[derive(Default)]
struct MemoryState {
    competitors: BTreeMap<i64, Competitor>,
    products: BTreeMap<i64, Product>,
    links: BTreeMap<i64, CompetitorLink>,
    price_history: Vec<PriceHistoryEntry>,
    scrape_logs: BTreeMap<i64, ScrapeLog>,
    notifications: Vec<(i64, Notification)>,
    next_id: i64,
    failing_products: HashSet<i64>,
    failing_links: HashSet<i64>,
    failing_competitors: HashSet<i64>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Repository backed by ordered maps behind a mutex.
///
/// The `fail_*` methods make the matching calls return errors, which lets
/// tests exercise per-item fault isolation.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory repository lock poisoned"))
    }

    pub fn insert_competitor(&self, mut competitor: Competitor) -> Result<i64> {
        let mut state = self.state()?;
        if competitor.id == 0 {
            competitor.id = state.next_id();
        }
        let id = competitor.id;
        state.competitors.insert(id, competitor);
        Ok(id)
    }

    pub fn insert_product(&self, mut product: Product) -> Result<i64> {
        let mut state = self.state()?;
        if product.id == 0 {
            product.id = state.next_id();
        }
        let id = product.id;
        state.products.insert(id, product);
        Ok(id)
    }

    pub fn insert_link(&self, mut link: CompetitorLink) -> Result<i64> {
        let mut state = self.state()?;
        if link.id == 0 {
            link.id = state.next_id();
        }
        let id = link.id;
        state.links.insert(id, link);
        Ok(id)
    }

    /// Reads of this product fail from now on
    pub fn fail_product(&self, product_id: i64) -> Result<()> {
        self.state()?.failing_products.insert(product_id);
        Ok(())
    }

    /// `save_observation` for this link fails from now on
    pub fn fail_link(&self, link_id: i64) -> Result<()> {
        self.state()?.failing_links.insert(link_id);
        Ok(())
    }

    /// Link enumeration for this competitor fails from now on
    pub fn fail_competitor(&self, competitor_id: i64) -> Result<()> {
        self.state()?.failing_competitors.insert(competitor_id);
        Ok(())
    }

    pub fn link(&self, link_id: i64) -> Option<CompetitorLink> {
        self.state().ok()?.links.get(&link_id).cloned()
    }

    pub fn product(&self, product_id: i64) -> Option<Product> {
        self.state().ok()?.products.get(&product_id).cloned()
    }

    pub fn price_history(&self, product_id: i64) -> Vec<PriceHistoryEntry> {
        self.state()
            .map(|state| {
                state
                    .price_history
                    .iter()
                    .filter(|e| e.product_id == product_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn scrape_logs(&self) -> Vec<ScrapeLog> {
        self.state()
            .map(|state| state.scrape_logs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state()
            .map(|state| state.notifications.iter().map(|(_, n)| n.clone()).collect())
            .unwrap_or_default()
    }

    /// Backdates a scrape log, for retention tests
    pub fn backdate_scrape_log(&self, id: i64, days: i64) -> Result<()> {
        let mut state = self.state()?;
        let log = state
            .scrape_logs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("scrape log {id} not found"))?;
        log.created_at = log.created_at - Duration::days(days);
        Ok(())
    }
}

#[async_trait]
impl PriceRepository for MemoryRepository {
    async fn get_active_competitors(&self) -> Result<Vec<Competitor>> {
        Ok(self
            .state()?
            .competitors
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>> {
        Ok(self.state()?.competitors.get(&id).cloned())
    }

    async fn get_links_for_competitor(&self, competitor_id: i64) -> Result<Vec<CompetitorLink>> {
        let state = self.state()?;
        if state.failing_competitors.contains(&competitor_id) {
            bail!("Failed to load links for competitor {competitor_id}");
        }
        Ok(state
            .links
            .values()
            .filter(|l| l.competitor_id == competitor_id)
            .cloned()
            .collect())
    }

    async fn get_links_for_product(&self, product_id: i64) -> Result<Vec<CompetitorLink>> {
        Ok(self
            .state()?
            .links
            .values()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let state = self.state()?;
        if state.failing_products.contains(&id) {
            bail!("Failed to load product {id}");
        }
        Ok(state.products.get(&id).cloned())
    }

    async fn get_active_products(&self) -> Result<Vec<Product>> {
        Ok(self
            .state()?
            .products
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn save_observation(
        &self,
        link_id: i64,
        observation: &Observation,
    ) -> Result<Option<LinkPriceChange>> {
        let mut state = self.state()?;
        if state.failing_links.contains(&link_id) {
            bail!("Failed to save observation for link {link_id}");
        }
        let link = state
            .links
            .get_mut(&link_id)
            .ok_or_else(|| anyhow!("competitor link {link_id} not found"))?;
        Ok(link.apply_observation(observation, Utc::now()))
    }

    async fn latest_price_history(&self, product_id: i64) -> Result<Option<PriceHistoryEntry>> {
        Ok(self
            .state()?
            .price_history
            .iter()
            .rev()
            .find(|e| e.product_id == product_id)
            .cloned())
    }

    async fn append_price_history(&self, entry: NewPriceHistory) -> Result<PriceHistoryEntry> {
        let mut state = self.state()?;
        let id = state.next_id();
        let entry = entry.into_entry(id, Utc::now());
        state.price_history.push(entry.clone());
        Ok(entry)
    }

    async fn apply_price_adjustment(
        &self,
        product_id: i64,
        new_price: f64,
        entry: NewPriceHistory,
    ) -> Result<PriceHistoryEntry> {
        let mut state = self.state()?;
        if state.failing_products.contains(&product_id) {
            bail!("Failed to update price of product {product_id}");
        }
        let current_price = state
            .products
            .get(&product_id)
            .map(|product| product.current_price)
            .ok_or_else(|| anyhow!("product {product_id} not found"))?;
        let previous_price = state
            .price_history
            .iter()
            .rev()
            .find(|recorded| recorded.product_id == product_id)
            .map(|recorded| recorded.price)
            .unwrap_or(current_price);

        let id = state.next_id();
        if let Some(product) = state.products.get_mut(&product_id) {
            product.current_price = new_price;
        }

        let entry = NewPriceHistory {
            previous_price,
            ..entry
        }
        .into_entry(id, Utc::now());
        state.price_history.push(entry.clone());
        Ok(entry)
    }

    async fn create_scrape_log(&self, log: NewScrapeLog) -> Result<ScrapeLog> {
        let mut state = self.state()?;
        let id = state.next_id();
        let log = ScrapeLog {
            id,
            competitor_id: log.competitor_id,
            status: ScrapeStatus::Pending,
            url: log.url,
            error_message: None,
            started_at: None,
            completed_at: None,
            metadata: Map::new(),
            created_at: Utc::now(),
        };
        state.scrape_logs.insert(id, log.clone());
        Ok(log)
    }

    async fn update_scrape_log(&self, id: i64, update: ScrapeLogUpdate) -> Result<ScrapeLog> {
        let mut state = self.state()?;
        let log = state
            .scrape_logs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("scrape log {id} not found"))?;

        if let Some(next) = update.status {
            if !log.status.can_transition_to(next) {
                bail!(
                    "Invalid scrape log transition for log {}: {} -> {}",
                    id,
                    log.status,
                    next
                );
            }
            log.status = next;
        } else if log.status.is_terminal() {
            bail!("Scrape log {} is already {}", id, log.status);
        }

        if update.error_message.is_some() {
            log.error_message = update.error_message;
        }
        if update.started_at.is_some() {
            log.started_at = update.started_at;
        }
        if update.completed_at.is_some() {
            log.completed_at = update.completed_at;
        }
        if let Some(metadata) = update.metadata {
            log.metadata = metadata;
        }

        Ok(log.clone())
    }

    async fn save_notification(&self, notification: &Notification) -> Result<i64> {
        let mut state = self.state()?;
        let id = state.next_id();
        state.notifications.push((id, notification.clone()));
        Ok(id)
    }

    async fn delete_scrape_logs_older_than(&self, retention_days: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut state = self.state()?;
        let before = state.scrape_logs.len();
        state.scrape_logs.retain(|_, log| log.created_at >= cutoff);
        Ok((before - state.scrape_logs.len()) as u64)
    }
}
