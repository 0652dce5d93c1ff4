pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod database;
pub mod events;
pub mod extraction;
pub mod metrics;
pub mod pricing;
pub mod proxy;
pub mod scheduled_jobs;
pub mod scraping;
