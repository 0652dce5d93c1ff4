use serde::Serialize;

use crate::database::models::{Competitor, CompetitorLink, LinkPriceChange};
use crate::extraction::{ExtractionRules, FetchStrategy, Observation};

/// One extraction job for one competitor link
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeTask {
    pub competitor_id: i64,
    pub link_id: i64,
    pub product_id: i64,
    pub url: String,
    /// Attempts made so far; incremented as each one starts
    pub attempt: u32,
    pub fetch_strategy: FetchStrategy,
    pub rules: ExtractionRules,
}

impl ScrapeTask {
    pub fn for_link(competitor: &Competitor, link: &CompetitorLink) -> Self {
        Self {
            competitor_id: competitor.id,
            link_id: link.id,
            product_id: link.product_id,
            url: link.url.clone(),
            attempt: 0,
            fetch_strategy: competitor.fetch_strategy,
            rules: competitor.extraction_rules(),
        }
    }
}

/// Terminal result of a task after all of its attempts
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub log_id: i64,
    pub link_id: i64,
    pub success: bool,
    pub attempts: u32,
    pub observation: Observation,
    pub price_change: Option<LinkPriceChange>,
}

/// Counts from one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub competitors: usize,
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Links that could not be turned into a task
    pub skipped: usize,
}
