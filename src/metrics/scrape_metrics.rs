use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec,
    HistogramVec,
};
use tracing::debug;

lazy_static! {
    /// Terminal scrape task outcomes
    static ref SCRAPE_TASKS_TOTAL: CounterVec = register_counter_vec!(
        "marketguard_scrape_tasks_total",
        "Scrape tasks by terminal status",
        &["competitor", "status"]
    ).expect("Failed to create scrape_tasks_total metric");

    /// Individual extraction attempts, including retries
    static ref SCRAPE_ATTEMPTS_TOTAL: CounterVec = register_counter_vec!(
        "marketguard_scrape_attempts_total",
        "Extraction attempts by outcome",
        &["competitor", "outcome"]
    ).expect("Failed to create scrape_attempts_total metric");

    /// Time spent fetching and parsing a page
    static ref FETCH_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "marketguard_fetch_duration_seconds",
        "Extraction duration per strategy",
        &["strategy", "success"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("Failed to create fetch_duration_seconds metric");

    /// Latest observed competitor price
    static ref COMPETITOR_PRICE: GaugeVec = register_gauge_vec!(
        "marketguard_competitor_price",
        "Latest observed competitor price per link",
        &["product", "competitor"]
    ).expect("Failed to create competitor_price metric");
}

/// Scrape pipeline metrics collector
pub struct ScrapeMetrics;

impl ScrapeMetrics {
    pub fn record_task(competitor_id: i64, success: bool) {
        let status = if success { "success" } else { "failed" };
        SCRAPE_TASKS_TOTAL
            .with_label_values(&[&competitor_id.to_string(), status])
            .inc();
    }

    pub fn record_attempt(competitor_id: i64, outcome: &str) {
        SCRAPE_ATTEMPTS_TOTAL
            .with_label_values(&[&competitor_id.to_string(), outcome])
            .inc();
    }

    pub fn observe_fetch(strategy: &str, seconds: f64, success: bool) {
        FETCH_DURATION_SECONDS
            .with_label_values(&[strategy, if success { "true" } else { "false" }])
            .observe(seconds);
    }

    pub fn set_competitor_price(product_id: i64, competitor_id: i64, price: f64) {
        COMPETITOR_PRICE
            .with_label_values(&[&product_id.to_string(), &competitor_id.to_string()])
            .set(price);

        debug!(
            "Updated competitor price for product {} / competitor {}: {}",
            product_id, competitor_id, price
        );
    }
}
