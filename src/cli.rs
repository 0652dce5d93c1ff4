use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::events::BroadcastEventSink;
use crate::metrics::start_metrics_server;
use crate::pricing::{Decision, PricingError};
use crate::scheduled_jobs::JobManager;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "MarketGuard - competitive price monitoring with guarded price adjustment",
    long_about = "MarketGuard scrapes competitor product pages on a schedule, keeps the \
                  observed prices up to date and adjusts product prices automatically \
                  without ever going below the configured minimum or cost price."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the daemon with its scheduled jobs (default behavior)
    Run,
    /// Run a single scrape cycle and exit
    ScrapeOnce,
    /// Run a price evaluation pass and exit
    Evaluate {
        /// Evaluate only this product
        #[arg(short, long)]
        product: Option<i64>,
    },
    /// Set a product price manually; the price guards still apply
    SetPrice {
        #[arg(short, long)]
        product: i64,

        #[arg(long)]
        price: f64,
    },
}

pub async fn run_daemon(app: &App, events: &BroadcastEventSink) -> Result<()> {
    if app.config.metrics.enabled {
        start_metrics_server(app.config.metrics.port).await?;
    }

    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            debug!(event = %event.event_type, "{}", event.payload);
        }
    });

    let mut jobs = JobManager::new(
        app.scheduler.clone(),
        app.engine.clone(),
        app.repository.clone(),
    )
    .await?;
    jobs.start(&app.config).await?;

    info!("MarketGuard running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = jobs.stop().await {
        warn!("Failed to stop job manager: {:#}", e);
    }
    Ok(())
}

pub async fn scrape_once(app: &App) -> Result<()> {
    let summary = app.scheduler.run_cycle().await?;
    println!(
        "Scrape cycle: {} competitors, {} tasks, {} succeeded, {} failed, {} skipped",
        summary.competitors, summary.scheduled, summary.succeeded, summary.failed, summary.skipped
    );
    Ok(())
}

pub async fn evaluate(app: &App, product: Option<i64>) -> Result<()> {
    let Some(product_id) = product else {
        let summary = app.engine.evaluate_all().await?;
        println!(
            "Evaluation: {} products, {} adjusted, {} alerts, {} failed",
            summary.evaluated, summary.adjusted, summary.alerts, summary.failed
        );
        return Ok(());
    };

    match app.engine.evaluate_product(product_id).await? {
        Decision::NoCompetitorData => {
            println!("Product {product_id}: no comparable competitor prices")
        }
        Decision::Competitive {
            min_competitor_price,
        } => println!(
            "Product {product_id}: competitive (cheapest competitor {min_competitor_price:.2})"
        ),
        Decision::Adjusted {
            old_price, entry, ..
        } => println!(
            "Product {product_id}: price adjusted {old_price:.2} -> {:.2}",
            entry.price
        ),
        Decision::AlertOnly {
            recommendation,
            reason,
        } => println!(
            "Product {product_id}: alert only, recommended {:.2} ({reason:?})",
            recommendation.recommended_price
        ),
    }
    Ok(())
}

pub async fn set_price(app: &App, product: i64, price: f64) -> Result<()> {
    match app.engine.set_manual_price(product, price).await {
        Ok(entry) => {
            println!(
                "Product {product}: price set to {:.2} (change {:+.2})",
                entry.price, entry.change_amount
            );
            Ok(())
        }
        Err(PricingError::Guard(violation)) => {
            error!("Manual price rejected: {}", violation);
            bail!("Price change rejected by the {} guard: {}", violation.guard(), violation)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["marketguard"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_set_price_arguments() {
        let cli = Cli::parse_from([
            "marketguard",
            "set-price",
            "--product",
            "7",
            "--price",
            "690",
            "--config",
            "/etc/marketguard.yaml",
        ]);
        assert_eq!(
            cli.command,
            Some(Commands::SetPrice {
                product: 7,
                price: 690.0
            })
        );
        assert_eq!(cli.config, Some(PathBuf::from("/etc/marketguard.yaml")));
    }

    #[test]
    fn test_evaluate_optional_product() {
        let cli = Cli::parse_from(["marketguard", "evaluate"]);
        assert_eq!(cli.command, Some(Commands::Evaluate { product: None }));

        let cli = Cli::parse_from(["marketguard", "evaluate", "-p", "3"]);
        assert_eq!(cli.command, Some(Commands::Evaluate { product: Some(3) }));
    }
}
