//! Scrape scheduling: tasks per competitor link, a bounded worker pool,
//! retry with exponential backoff and the scrape log lifecycle.

pub mod models;
pub mod retry;
pub mod scheduler;
pub mod worker;

pub use crate::database::models::ScrapeStatus;
pub use models::{CycleSummary, ScrapeTask, TaskOutcome};
pub use retry::RetryPolicy;
pub use scheduler::ScrapeScheduler;
pub use worker::TaskRunner;
