pub mod price_metrics;
pub mod scrape_metrics;
pub mod server;

pub use price_metrics::PriceMetrics;
pub use scrape_metrics::ScrapeMetrics;
pub use server::start_metrics_server;
