use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    Competitor, CompetitorLink, LinkPriceChange, NewPriceHistory, NewScrapeLog, PriceHistoryEntry,
    Product, ScrapeLog, ScrapeLogUpdate,
};
use crate::events::Notification;
use crate::extraction::Observation;

/// Storage collaborator for the scrape pipeline and the decision engine.
///
/// Errors are per call: callers log them against the item being processed
/// and carry on with the rest.
#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn get_active_competitors(&self) -> Result<Vec<Competitor>>;

    async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>>;

    async fn get_links_for_competitor(&self, competitor_id: i64) -> Result<Vec<CompetitorLink>>;

    async fn get_links_for_product(&self, product_id: i64) -> Result<Vec<CompetitorLink>>;

    async fn get_product(&self, id: i64) -> Result<Option<Product>>;

    async fn get_active_products(&self) -> Result<Vec<Product>>;

    /// Applies a successful observation to its link.
    ///
    /// Returns the price movement when the observed price differs from the
    /// stored one. Unsuccessful observations leave the link untouched.
    async fn save_observation(
        &self,
        link_id: i64,
        observation: &Observation,
    ) -> Result<Option<LinkPriceChange>>;

    async fn latest_price_history(&self, product_id: i64) -> Result<Option<PriceHistoryEntry>>;

    async fn append_price_history(&self, entry: NewPriceHistory) -> Result<PriceHistoryEntry>;

    /// Sets the product price and appends its ledger entry as one unit.
    ///
    /// The entry's `previous_price` is re-read while the product is locked,
    /// so a writer in another process cannot make it stale.
    async fn apply_price_adjustment(
        &self,
        product_id: i64,
        new_price: f64,
        entry: NewPriceHistory,
    ) -> Result<PriceHistoryEntry>;

    async fn create_scrape_log(&self, log: NewScrapeLog) -> Result<ScrapeLog>;

    /// Fails when the stored log is already terminal or the move goes backwards
    async fn update_scrape_log(&self, id: i64, update: ScrapeLogUpdate) -> Result<ScrapeLog>;

    async fn save_notification(&self, notification: &Notification) -> Result<i64>;

    async fn delete_scrape_logs_older_than(&self, retention_days: i64) -> Result<u64>;
}
