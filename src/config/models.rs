use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

use super::metrics_config::MetricsConfig;
use crate::constants;

/// The main configuration structure for MarketGuard
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MarketGuardConfig {
    /// Scrape scheduling, retry and politeness settings
    #[serde(default)]
    #[validate]
    pub scraping: ScrapingConfig,

    /// Headless browser used by the rendered extraction strategy
    #[serde(default)]
    #[validate]
    pub browser: BrowserConfig,

    /// Price decision settings
    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    /// Egress proxies for outbound fetches
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Scrape log retention cleanup
    #[serde(default)]
    #[validate]
    pub database_cleanup: DatabaseCleanupConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Scrape cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScrapingConfig {
    /// Cron schedule for the scrape cycle (default: every 15 minutes)
    #[serde(default = "default_scrape_schedule")]
    #[validate(custom = "validate_cron_schedule")]
    pub schedule: String,

    /// Attempts per task before the task is abandoned
    #[serde(default = "default_retry_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub retry_attempts: u32,

    /// First retry delay; doubled on every further retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Timeout for a single extraction request
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Pause before each fetch when the source does not define its own delay
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Number of tasks executed concurrently
    #[serde(default = "default_worker_pool_size")]
    #[validate(range(min = 1, max = 256))]
    pub worker_pool_size: usize,

    /// User agent presented to competitor sites
    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,

    /// Re-evaluate the product right after one of its links is observed
    #[serde(default = "default_true")]
    pub evaluate_on_observation: bool,

    /// Retry selector/price parse failures like network failures
    #[serde(default = "default_true")]
    pub retry_parse_failures: bool,
}

impl ScrapingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            schedule: default_scrape_schedule(),
            retry_attempts: default_retry_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_ms: default_timeout_ms(),
            politeness_delay_ms: default_politeness_delay_ms(),
            worker_pool_size: default_worker_pool_size(),
            user_agent: default_user_agent(),
            evaluate_on_observation: true,
            retry_parse_failures: true,
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrowserConfig {
    /// Chromium binary (falls back to MARKETGUARD_CHROMIUM_PATH, then auto-detection)
    pub executable: Option<PathBuf>,

    /// Pause after navigation so late requests can settle
    #[serde(default = "default_idle_settle_ms")]
    #[validate(range(max = 60000))]
    pub idle_settle_ms: u64,

    /// Run without a visible window
    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            idle_settle_ms: default_idle_settle_ms(),
            headless: true,
        }
    }
}

/// Price decision configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PricingConfig {
    /// Cron schedule for the evaluation pass (default: every 20 minutes)
    #[serde(default = "default_evaluation_schedule")]
    #[validate(custom = "validate_cron_schedule")]
    pub schedule: String,

    /// Undercut margin used when a product has no override
    #[serde(default = "default_min_price_margin")]
    #[validate(range(min = 0.0))]
    pub min_price_margin_default: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            schedule: default_evaluation_schedule(),
            min_price_margin_default: default_min_price_margin(),
        }
    }
}

/// Proxy pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Route proxied sources through the pool
    #[serde(default)]
    pub enabled: bool,

    /// Endpoints as `host:port` or full proxy URLs
    #[serde(default)]
    pub list: Vec<String>,
}

impl ProxyConfig {
    /// Endpoints the pool should rotate through; empty when disabled
    pub fn active_endpoints(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        self.list
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Configuration for database cleanup task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseCleanupConfig {
    /// Cron schedule for cleanup task (default: "0 0 3 * * *" - daily at 03:00)
    #[serde(default = "default_cleanup_schedule")]
    #[validate(custom = "validate_cron_schedule")]
    pub schedule: String,

    /// Whether cleanup is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scrape logs older than this are deleted
    #[serde(default = "default_retention_days")]
    #[validate(range(min = 1, max = 3650))]
    pub retention_days: i64,
}

impl Default for DatabaseCleanupConfig {
    fn default() -> Self {
        Self {
            schedule: default_cleanup_schedule(),
            enabled: true,
            retention_days: default_retention_days(),
        }
    }
}

fn default_scrape_schedule() -> String {
    constants::scraping::DEFAULT_SCRAPE_SCHEDULE.to_string()
}

fn default_retry_attempts() -> u32 {
    constants::scraping::DEFAULT_RETRY_ATTEMPTS
}

fn default_backoff_base_ms() -> u64 {
    constants::scraping::DEFAULT_BACKOFF_BASE_MS
}

fn default_timeout_ms() -> u64 {
    constants::scraping::DEFAULT_TIMEOUT_MS
}

fn default_politeness_delay_ms() -> u64 {
    constants::scraping::DEFAULT_POLITENESS_DELAY_MS
}

fn default_worker_pool_size() -> usize {
    constants::scraping::DEFAULT_WORKER_POOL_SIZE
}

fn default_user_agent() -> String {
    constants::scraping::DEFAULT_USER_AGENT.to_string()
}

fn default_idle_settle_ms() -> u64 {
    constants::browser::DEFAULT_IDLE_SETTLE_MS
}

fn default_evaluation_schedule() -> String {
    constants::pricing::DEFAULT_EVALUATION_SCHEDULE.to_string()
}

fn default_min_price_margin() -> f64 {
    constants::pricing::DEFAULT_MIN_PRICE_MARGIN
}

fn default_cleanup_schedule() -> String {
    constants::database::DEFAULT_CLEANUP_SCHEDULE.to_string()
}

fn default_retention_days() -> i64 {
    constants::database::DEFAULT_RETENTION_DAYS
}

fn default_true() -> bool {
    true
}

/// Validates a six-field cron expression (seconds first)
fn validate_cron_schedule(schedule: &str) -> Result<(), ValidationError> {
    cron::Schedule::from_str(schedule)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_cron_schedule"))
}
