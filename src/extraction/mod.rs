//! Turns a competitor URL plus its ruleset into a canonical [`Observation`].
//!
//! Two interchangeable strategies implement [`Extractor`]: [`StaticExtractor`]
//! issues a single HTTP GET, [`RenderedExtractor`] drives a headless browser
//! page obtained from a [`Renderer`]. Both apply the same rule-driven lookups
//! from [`document`].

pub mod document;
pub mod error;
pub mod models;
pub mod normalize;
pub mod rendered;
pub mod renderer;
pub mod static_fetch;
#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use error::ExtractionError;
pub use models::{ExtractionRules, FailureKind, FetchStrategy, Observation};
pub use rendered::RenderedExtractor;
pub use renderer::{ChromiumRenderer, RenderedPage, Renderer, RendererSettings};
pub use static_fetch::StaticExtractor;

use crate::config::models::ScrapingConfig;

/// One extraction capability: URL + rules in, observation out.
///
/// Implementations never return an error; failures are reported through
/// `Observation::error` with `success = false`.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn strategy(&self) -> FetchStrategy;

    async fn extract(&self, url: &str, rules: &ExtractionRules) -> Observation;
}

/// Request settings shared by both strategies
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub politeness_delay: Duration,
    pub user_agent: String,
}

impl FetchSettings {
    pub fn from_config(config: &ScrapingConfig) -> Self {
        Self {
            timeout: config.timeout(),
            politeness_delay: config.politeness_delay(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Source-specific delay, else the global default
    pub fn delay_for(&self, rules: &ExtractionRules) -> Duration {
        rules
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or(self.politeness_delay)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Sleeps for the politeness delay before a source is fetched
pub(crate) async fn politeness_pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Both strategies, selected per source by its fetch strategy flag
#[derive(Clone)]
pub struct ExtractorSet {
    static_fetch: Arc<dyn Extractor>,
    rendered: Arc<dyn Extractor>,
}

impl ExtractorSet {
    pub fn new(static_fetch: Arc<dyn Extractor>, rendered: Arc<dyn Extractor>) -> Self {
        Self {
            static_fetch,
            rendered,
        }
    }

    pub fn for_strategy(&self, strategy: FetchStrategy) -> Arc<dyn Extractor> {
        match strategy {
            FetchStrategy::Static => Arc::clone(&self.static_fetch),
            FetchStrategy::Rendered => Arc::clone(&self.rendered),
        }
    }
}
