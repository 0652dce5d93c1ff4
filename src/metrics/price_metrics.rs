use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};

lazy_static! {
    /// Current price of each monitored product
    static ref PRODUCT_PRICE: GaugeVec = register_gauge_vec!(
        "marketguard_product_price",
        "Current product price",
        &["product"]
    ).expect("Failed to create product_price metric");

    /// Gap between our price and the cheapest competitor
    static ref PRICE_GAP: GaugeVec = register_gauge_vec!(
        "marketguard_price_gap",
        "Current price minus cheapest available competitor price",
        &["product"]
    ).expect("Failed to create price_gap metric");

    /// Applied price mutations
    static ref PRICE_ADJUSTMENTS_TOTAL: CounterVec = register_counter_vec!(
        "marketguard_price_adjustments_total",
        "Applied price adjustments by kind",
        &["kind"]
    ).expect("Failed to create price_adjustments_total metric");

    /// Recommendations or manual requests blocked by a guard
    static ref GUARD_VIOLATIONS_TOTAL: CounterVec = register_counter_vec!(
        "marketguard_guard_violations_total",
        "Price changes rejected by a guard",
        &["guard"]
    ).expect("Failed to create guard_violations_total metric");
}

/// Price decision metrics collector
pub struct PriceMetrics;

impl PriceMetrics {
    pub fn set_product_price(product_id: i64, price: f64) {
        PRODUCT_PRICE
            .with_label_values(&[&product_id.to_string()])
            .set(price);
    }

    pub fn set_price_gap(product_id: i64, gap: f64) {
        PRICE_GAP.with_label_values(&[&product_id.to_string()]).set(gap);
    }

    pub fn record_adjustment(auto: bool) {
        PRICE_ADJUSTMENTS_TOTAL
            .with_label_values(&[if auto { "auto" } else { "manual" }])
            .inc();
    }

    pub fn record_guard_violation(guard: &str) {
        GUARD_VIOLATIONS_TOTAL.with_label_values(&[guard]).inc();
    }
}
