use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::extraction::{ExtractionRules, FetchStrategy, Observation};

/// A competitor site whose product pages are monitored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub id: i64,
    pub name: String,
    pub platform: String,
    pub base_url: String,
    pub is_active: bool,

    /// Every page of this competitor goes through the proxy pool
    pub requires_proxy: bool,

    /// Selects the extraction implementation for this source
    pub fetch_strategy: FetchStrategy,

    /// Selectors, headers and delay for this source
    pub scraping_config: ExtractionRules,

    /// Politeness delay used when the ruleset has none; 0 means "global default"
    pub scraping_delay_ms: i64,
}

impl Competitor {
    /// Effective ruleset: the stored rules plus the record-level proxy and delay settings
    pub fn extraction_rules(&self) -> ExtractionRules {
        let mut rules = self.scraping_config.clone();
        rules.requires_proxy |= self.requires_proxy;
        if rules.delay_ms.is_none() && self.scraping_delay_ms > 0 {
            rules.delay_ms = Some(self.scraping_delay_ms as u64);
        }
        rules
    }
}

/// A monitored product on a competitor's site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorLink {
    pub id: i64,
    pub product_id: i64,
    pub competitor_id: i64,
    pub url: String,
    pub current_price: Option<f64>,
    pub previous_price: Option<f64>,
    pub is_available: bool,
    pub competitor_product_name: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_price_change_at: Option<DateTime<Utc>>,
}

impl CompetitorLink {
    /// Price usable for a decision: in stock and positive
    pub fn comparable_price(&self) -> Option<f64> {
        match self.current_price {
            Some(price) if self.is_available && price > 0.0 => Some(price),
            _ => None,
        }
    }

    /// Folds a successful observation into the link.
    ///
    /// The previous price only moves when the observed price differs.
    /// Availability, check time and the competitor's name are always refreshed.
    pub fn apply_observation(
        &mut self,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Option<LinkPriceChange> {
        let price = observation.valid_price()?;

        let change = if self.current_price != Some(price) {
            let old_price = self.current_price;
            self.previous_price = old_price;
            self.current_price = Some(price);
            self.last_price_change_at = Some(now);
            Some(LinkPriceChange {
                link_id: self.id,
                product_id: self.product_id,
                competitor_id: self.competitor_id,
                old_price,
                new_price: price,
            })
        } else {
            None
        };

        self.is_available = observation.is_available.unwrap_or(true);
        self.last_checked_at = Some(now);
        if let Some(name) = &observation.name {
            self.competitor_product_name = Some(name.clone());
        }

        change
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub current_price: f64,
    pub min_price: f64,
    pub cost_price: f64,
    pub auto_price_adjustment: bool,

    /// Undercut margin; `None` uses the configured default
    pub auto_adjustment_margin: Option<f64>,

    pub is_active: bool,
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Increase,
    Decrease,
    Stable,
}

impl ChangeType {
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            ChangeType::Increase
        } else if delta < 0.0 {
            ChangeType::Decrease
        } else {
            ChangeType::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Increase => "increase",
            ChangeType::Decrease => "decrease",
            ChangeType::Stable => "stable",
        }
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increase" => Ok(ChangeType::Increase),
            "decrease" => Ok(ChangeType::Decrease),
            "stable" => Ok(ChangeType::Stable),
            other => Err(format!("unknown change type '{other}'")),
        }
    }
}

/// One ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub previous_price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub change_type: ChangeType,
    pub is_auto_adjusted: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row to append; change fields are derived from the two prices
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceHistory {
    pub product_id: i64,
    pub price: f64,
    pub previous_price: f64,
    pub is_auto_adjusted: bool,
    pub reason: Option<String>,
}

impl NewPriceHistory {
    pub fn change_amount(&self) -> f64 {
        self.price - self.previous_price
    }

    pub fn change_percent(&self) -> f64 {
        if self.previous_price > 0.0 {
            self.change_amount() / self.previous_price * 100.0
        } else {
            0.0
        }
    }

    pub fn change_type(&self) -> ChangeType {
        ChangeType::from_delta(self.change_amount())
    }

    pub fn into_entry(self, id: i64, created_at: DateTime<Utc>) -> PriceHistoryEntry {
        PriceHistoryEntry {
            id,
            product_id: self.product_id,
            price: self.price,
            previous_price: self.previous_price,
            change_amount: self.change_amount(),
            change_percent: self.change_percent(),
            change_type: self.change_type(),
            is_auto_adjusted: self.is_auto_adjusted,
            reason: self.reason,
            created_at,
        }
    }
}

/// Scrape log lifecycle. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl ScrapeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeStatus::Success | ScrapeStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            ScrapeStatus::Pending => 0,
            ScrapeStatus::InProgress => 1,
            ScrapeStatus::Success | ScrapeStatus::Failed => 2,
        }
    }

    /// Forward-only: pending -> in_progress -> success|failed
    pub fn can_transition_to(&self, next: ScrapeStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Pending => "pending",
            ScrapeStatus::InProgress => "in_progress",
            ScrapeStatus::Success => "success",
            ScrapeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScrapeStatus::Pending),
            "in_progress" => Ok(ScrapeStatus::InProgress),
            "success" => Ok(ScrapeStatus::Success),
            "failed" => Ok(ScrapeStatus::Failed),
            other => Err(format!("unknown scrape status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeLog {
    pub id: i64,
    pub competitor_id: i64,
    pub status: ScrapeStatus,
    pub url: String,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScrapeLog {
    pub competitor_id: i64,
    pub url: String,
}

/// Fields written by `update_scrape_log`; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct ScrapeLogUpdate {
    pub status: Option<ScrapeStatus>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<Map<String, Value>>,
}

impl ScrapeLogUpdate {
    pub fn started() -> Self {
        Self {
            status: Some(ScrapeStatus::InProgress),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn finished(
        success: bool,
        error_message: Option<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            status: Some(if success {
                ScrapeStatus::Success
            } else {
                ScrapeStatus::Failed
            }),
            error_message,
            completed_at: Some(Utc::now()),
            metadata: Some(metadata),
            ..Default::default()
        }
    }
}

/// Competitor price movement recorded by `save_observation`
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPriceChange {
    pub link_id: i64,
    pub product_id: i64,
    pub competitor_id: i64,
    pub old_price: Option<f64>,
    pub new_price: f64,
}
