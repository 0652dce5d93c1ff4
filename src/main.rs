use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use marketguard::app::App;
use marketguard::cli::{self, Cli, Commands};
use marketguard::config::{self, MarketGuardConfig};
use marketguard::database::{establish_connection, run_migrations, PgRepository, PriceRepository};
use marketguard::events::{BroadcastEventSink, EventSink, TracingEventSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    info!("Using configuration file: {:?}", config_path);

    let config = match load_configuration(&cli, &config_path) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    let pool = establish_connection().await?;
    run_migrations(&pool).await?;
    let repository: Arc<dyn PriceRepository> = Arc::new(PgRepository::new(pool));

    let command = cli.command.unwrap_or(Commands::Run);

    let broadcast = Arc::new(BroadcastEventSink::new(
        marketguard::constants::events::CHANNEL_CAPACITY,
    ));
    let events: Arc<dyn EventSink> = match command {
        Commands::Run => broadcast.clone(),
        _ => Arc::new(TracingEventSink),
    };

    let app = App::build(config, repository, events)?;
    info!("MarketGuard starting up...");

    let result = match command {
        Commands::Run => cli::run_daemon(&app, &broadcast).await,
        Commands::ScrapeOnce => cli::scrape_once(&app).await,
        Commands::Evaluate { product } => cli::evaluate(&app, product).await,
        Commands::SetPrice { product, price } => cli::set_price(&app, product, price).await,
    };

    if let Err(e) = app.shutdown().await {
        warn!("Failed to close browser: {:#}", e);
    }
    info!("MarketGuard stopped");

    result
}

/// An explicit config path must exist; a missing default file means defaults
fn load_configuration(
    cli: &Cli,
    config_path: &std::path::Path,
) -> Result<MarketGuardConfig, config::ConfigError> {
    if cli.config.is_none() && !config_path.exists() {
        warn!("No configuration file found, using defaults");
        let mut config = MarketGuardConfig::default();
        config::apply_proxy_overrides(
            &mut config,
            std::env::var("PROXY_ENABLED").ok().as_deref(),
            std::env::var("PROXY_LIST").ok().as_deref(),
        );
        config::validate_config(&config)?;
        return Ok(config);
    }
    config::load_config(config_path)
}
