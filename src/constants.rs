//! Application-wide constants
//!
//! This module contains all the magic numbers and default values used throughout
//! the application, making them easy to find and modify.

/// Scraping-related constants
pub mod scraping {
    /// Maximum attempts per scrape task before it is abandoned
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

    /// Base delay of the exponential retry backoff (in milliseconds)
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 5_000;

    /// Upper bound for a single backoff interval (in milliseconds)
    pub const MAX_BACKOFF_INTERVAL_MS: u64 = 300_000;

    /// Timeout for a single extraction request (in milliseconds)
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    /// Pause before fetching a source when the source does not define one (in milliseconds)
    pub const DEFAULT_POLITENESS_DELAY_MS: u64 = 5_000;

    /// Number of scrape tasks executed concurrently
    pub const DEFAULT_WORKER_POOL_SIZE: usize = 4;

    /// Cron schedule for the scrape cycle (every 15 minutes)
    pub const DEFAULT_SCRAPE_SCHEDULE: &str = "0 */15 * * * *";

    /// User agent presented to competitor sites
    pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
}

/// Fallback selectors used when a source leaves a rule unset
pub mod selectors {
    pub const PRICE: &str = "[data-price], .price, .product-price";
    pub const NAME: &str = "h1, .product-title, .product-name";
    pub const IMAGE: &str = ".product-image img, .product-img";
    pub const UNAVAILABLE: &str = ".out-of-stock, .unavailable";
}

/// Browser-related constants
pub mod browser {
    /// Pause after navigation so late network requests can settle (in milliseconds)
    pub const DEFAULT_IDLE_SETTLE_MS: u64 = 500;

    /// Environment variable pointing at a Chromium binary
    pub const CHROMIUM_PATH_ENV: &str = "MARKETGUARD_CHROMIUM_PATH";
}

/// Pricing-related constants
pub mod pricing {
    /// Amount undercut below the cheapest competitor, in currency units
    pub const DEFAULT_MIN_PRICE_MARGIN: f64 = 100.0;

    /// Cron schedule for the price evaluation pass (every 20 minutes)
    pub const DEFAULT_EVALUATION_SCHEDULE: &str = "0 */20 * * * *";

    pub const REASON_AUTOMATIC: &str = "automatic optimization";
    pub const REASON_MANUAL: &str = "manual adjustment";
    pub const REASON_EVALUATION: &str = "periodic evaluation";
}

/// Metrics-related constants
pub mod metrics {
    /// Port for Prometheus metrics server
    pub const METRICS_SERVER_PORT: u16 = 9090;
}

/// Database-related constants
pub mod database {
    /// Default scrape log retention period (in days)
    pub const DEFAULT_RETENTION_DAYS: i64 = 30;

    /// Cron schedule for the retention cleanup (daily at 03:00)
    pub const DEFAULT_CLEANUP_SCHEDULE: &str = "0 0 3 * * *";

    /// Connection pool maximum size
    pub const MAX_POOL_SIZE: u32 = 10;

    /// Connection pool minimum size
    pub const MIN_POOL_SIZE: u32 = 2;
}

/// Event-related constants
pub mod events {
    /// Buffered events per subscriber before the slowest one starts lagging
    pub const CHANNEL_CAPACITY: usize = 256;
}
