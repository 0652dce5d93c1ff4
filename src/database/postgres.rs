use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use super::models::{
    ChangeType, Competitor, CompetitorLink, LinkPriceChange, NewPriceHistory, NewScrapeLog,
    PriceHistoryEntry, Product, ScrapeLog, ScrapeLogUpdate, ScrapeStatus,
};
use super::repository::PriceRepository;
use crate::events::Notification;
use crate::extraction::{ExtractionRules, Observation};

/// PostgreSQL-backed repository
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CompetitorRow {
    id: i64,
    name: String,
    platform: String,
    base_url: String,
    is_active: bool,
    requires_proxy: bool,
    fetch_strategy: String,
    scraping_config: Option<Json<ExtractionRules>>,
    scraping_delay_ms: i64,
}

impl TryFrom<CompetitorRow> for Competitor {
    type Error = anyhow::Error;

    fn try_from(row: CompetitorRow) -> Result<Self> {
        Ok(Competitor {
            id: row.id,
            name: row.name,
            platform: row.platform,
            base_url: row.base_url,
            is_active: row.is_active,
            requires_proxy: row.requires_proxy,
            fetch_strategy: row.fetch_strategy.parse().map_err(|e: String| anyhow!(e))?,
            scraping_config: row.scraping_config.map(|c| c.0).unwrap_or_default(),
            scraping_delay_ms: row.scraping_delay_ms,
        })
    }
}

#[derive(FromRow)]
struct LinkRow {
    id: i64,
    product_id: i64,
    competitor_id: i64,
    url: String,
    current_price: Option<f64>,
    previous_price: Option<f64>,
    is_available: bool,
    competitor_product_name: Option<String>,
    last_checked_at: Option<DateTime<Utc>>,
    last_price_change_at: Option<DateTime<Utc>>,
}

impl From<LinkRow> for CompetitorLink {
    fn from(row: LinkRow) -> Self {
        CompetitorLink {
            id: row.id,
            product_id: row.product_id,
            competitor_id: row.competitor_id,
            url: row.url,
            current_price: row.current_price,
            previous_price: row.previous_price,
            is_available: row.is_available,
            competitor_product_name: row.competitor_product_name,
            last_checked_at: row.last_checked_at,
            last_price_change_at: row.last_price_change_at,
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    current_price: f64,
    min_price: f64,
    cost_price: f64,
    auto_price_adjustment: bool,
    auto_adjustment_margin: Option<f64>,
    is_active: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            current_price: row.current_price,
            min_price: row.min_price,
            cost_price: row.cost_price,
            auto_price_adjustment: row.auto_price_adjustment,
            auto_adjustment_margin: row.auto_adjustment_margin,
            is_active: row.is_active,
        }
    }
}

#[derive(FromRow)]
struct PriceHistoryRow {
    id: i64,
    product_id: i64,
    price: f64,
    previous_price: f64,
    change_amount: f64,
    change_percent: f64,
    change_type: String,
    is_auto_adjusted: bool,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PriceHistoryRow> for PriceHistoryEntry {
    type Error = anyhow::Error;

    fn try_from(row: PriceHistoryRow) -> Result<Self> {
        Ok(PriceHistoryEntry {
            id: row.id,
            product_id: row.product_id,
            price: row.price,
            previous_price: row.previous_price,
            change_amount: row.change_amount,
            change_percent: row.change_percent,
            change_type: row
                .change_type
                .parse::<ChangeType>()
                .map_err(|e| anyhow!(e))?,
            is_auto_adjusted: row.is_auto_adjusted,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ScrapeLogRow {
    id: i64,
    competitor_id: i64,
    status: String,
    url: String,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    metadata: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ScrapeLogRow> for ScrapeLog {
    type Error = anyhow::Error;

    fn try_from(row: ScrapeLogRow) -> Result<Self> {
        Ok(ScrapeLog {
            id: row.id,
            competitor_id: row.competitor_id,
            status: row.status.parse::<ScrapeStatus>().map_err(|e| anyhow!(e))?,
            url: row.url,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            metadata: row.metadata.0,
            created_at: row.created_at,
        })
    }
}

const COMPETITOR_COLUMNS: &str = "id, name, platform, base_url, is_active, requires_proxy, \
     fetch_strategy, scraping_config, scraping_delay_ms";

const LINK_COLUMNS: &str = "id, product_id, competitor_id, url, current_price, previous_price, \
     is_available, competitor_product_name, last_checked_at, last_price_change_at";

const PRODUCT_COLUMNS: &str = "id, name, current_price, min_price, cost_price, \
     auto_price_adjustment, auto_adjustment_margin, is_active";

const HISTORY_COLUMNS: &str = "id, product_id, price, previous_price, change_amount, \
     change_percent, change_type, is_auto_adjusted, reason, created_at";

const SCRAPE_LOG_COLUMNS: &str = "id, competitor_id, status, url, error_message, started_at, \
     completed_at, metadata, created_at";

const INSERT_HISTORY: &str = r#"
    INSERT INTO price_history (
        product_id, price, previous_price, change_amount, change_percent,
        change_type, is_auto_adjusted, reason
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING id, product_id, price, previous_price, change_amount,
              change_percent, change_type, is_auto_adjusted, reason, created_at
"#;

fn bind_history<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, PriceHistoryRow, sqlx::postgres::PgArguments>,
    entry: &'q NewPriceHistory,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, PriceHistoryRow, sqlx::postgres::PgArguments> {
    query
        .bind(entry.product_id)
        .bind(entry.price)
        .bind(entry.previous_price)
        .bind(entry.change_amount())
        .bind(entry.change_percent())
        .bind(entry.change_type().as_str())
        .bind(entry.is_auto_adjusted)
        .bind(entry.reason.as_deref())
}

#[async_trait]
impl PriceRepository for PgRepository {
    async fn get_active_competitors(&self) -> Result<Vec<Competitor>> {
        let rows = sqlx::query_as::<_, CompetitorRow>(&format!(
            "SELECT {COMPETITOR_COLUMNS} FROM competitors WHERE is_active = TRUE ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to load active competitors")?;

        rows.into_iter().map(Competitor::try_from).collect()
    }

    async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>> {
        let row = sqlx::query_as::<_, CompetitorRow>(&format!(
            "SELECT {COMPETITOR_COLUMNS} FROM competitors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load competitor {id}"))?;

        row.map(Competitor::try_from).transpose()
    }

    async fn get_links_for_competitor(&self, competitor_id: i64) -> Result<Vec<CompetitorLink>> {
        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM competitor_links WHERE competitor_id = $1 ORDER BY id"
        ))
        .bind(competitor_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load links for competitor {competitor_id}"))?;

        Ok(rows.into_iter().map(CompetitorLink::from).collect())
    }

    async fn get_links_for_product(&self, product_id: i64) -> Result<Vec<CompetitorLink>> {
        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM competitor_links WHERE product_id = $1 ORDER BY id"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load links for product {product_id}"))?;

        Ok(rows.into_iter().map(CompetitorLink::from).collect())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load product {id}"))?;

        Ok(row.map(Product::from))
    }

    async fn get_active_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = TRUE ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to load active products")?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn save_observation(
        &self,
        link_id: i64,
        observation: &Observation,
    ) -> Result<Option<LinkPriceChange>> {
        if observation.valid_price().is_none() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM competitor_links WHERE id = $1 FOR UPDATE"
        ))
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to load competitor link {link_id}"))?
        .ok_or_else(|| anyhow!("competitor link {link_id} not found"))?;

        let mut link = CompetitorLink::from(row);
        let change = link.apply_observation(observation, Utc::now());

        sqlx::query(
            r#"
            UPDATE competitor_links
            SET current_price = $2,
                previous_price = $3,
                is_available = $4,
                competitor_product_name = $5,
                last_checked_at = $6,
                last_price_change_at = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(link.id)
        .bind(link.current_price)
        .bind(link.previous_price)
        .bind(link.is_available)
        .bind(link.competitor_product_name.as_deref())
        .bind(link.last_checked_at)
        .bind(link.last_price_change_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update competitor link {link_id}"))?;

        tx.commit().await.context("Failed to commit observation")?;

        debug!(
            "Saved observation for link {}: price={:?}, changed={}",
            link_id,
            link.current_price,
            change.is_some()
        );

        Ok(change)
    }

    async fn latest_price_history(&self, product_id: i64) -> Result<Option<PriceHistoryEntry>> {
        let row = sqlx::query_as::<_, PriceHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM price_history WHERE product_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load latest price history for product {product_id}"))?;

        row.map(PriceHistoryEntry::try_from).transpose()
    }

    async fn append_price_history(&self, entry: NewPriceHistory) -> Result<PriceHistoryEntry> {
        let row = bind_history(sqlx::query_as::<_, PriceHistoryRow>(INSERT_HISTORY), &entry)
            .fetch_one(&self.pool)
            .await
            .with_context(|| {
                format!("Failed to append price history for product {}", entry.product_id)
            })?;

        PriceHistoryEntry::try_from(row)
    }

    async fn apply_price_adjustment(
        &self,
        product_id: i64,
        new_price: f64,
        entry: NewPriceHistory,
    ) -> Result<PriceHistoryEntry> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // row lock: the daemon and the CLI may adjust the same product
        let current_price: f64 =
            sqlx::query_scalar("SELECT current_price FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("Failed to lock product {product_id}"))?
                .ok_or_else(|| anyhow!("product {product_id} not found"))?;

        let last_recorded: Option<f64> = sqlx::query_scalar(
            "SELECT price FROM price_history WHERE product_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to load latest price history for product {product_id}"))?;

        let entry = NewPriceHistory {
            previous_price: last_recorded.unwrap_or(current_price),
            ..entry
        };

        sqlx::query("UPDATE products SET current_price = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(new_price)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to update price of product {product_id}"))?;

        let row = bind_history(sqlx::query_as::<_, PriceHistoryRow>(INSERT_HISTORY), &entry)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("Failed to append price history for product {product_id}"))?;

        tx.commit()
            .await
            .context("Failed to commit price adjustment")?;

        info!("Product {} price set to {:.2}", product_id, new_price);

        PriceHistoryEntry::try_from(row)
    }

    async fn create_scrape_log(&self, log: NewScrapeLog) -> Result<ScrapeLog> {
        let row = sqlx::query_as::<_, ScrapeLogRow>(&format!(
            "INSERT INTO scrape_logs (competitor_id, status, url, metadata) \
             VALUES ($1, $2, $3, '{{}}'::jsonb) RETURNING {SCRAPE_LOG_COLUMNS}"
        ))
        .bind(log.competitor_id)
        .bind(ScrapeStatus::Pending.as_str())
        .bind(&log.url)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to create scrape log for {}", log.url))?;

        ScrapeLog::try_from(row)
    }

    async fn update_scrape_log(&self, id: i64, update: ScrapeLogUpdate) -> Result<ScrapeLog> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let current: String =
            sqlx::query_scalar("SELECT status FROM scrape_logs WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("Failed to load scrape log {id}"))?
                .ok_or_else(|| anyhow!("scrape log {id} not found"))?;
        let current = current.parse::<ScrapeStatus>().map_err(|e| anyhow!(e))?;

        match update.status {
            Some(next) if !current.can_transition_to(next) => bail!(
                "Invalid scrape log transition for log {}: {} -> {}",
                id,
                current,
                next
            ),
            None if current.is_terminal() => bail!("Scrape log {} is already {}", id, current),
            _ => {}
        }

        let row = sqlx::query_as::<_, ScrapeLogRow>(&format!(
            r#"
            UPDATE scrape_logs
            SET status = COALESCE($2, status),
                error_message = COALESCE($3, error_message),
                started_at = COALESCE($4, started_at),
                completed_at = COALESCE($5, completed_at),
                metadata = COALESCE($6, metadata)
            WHERE id = $1
            RETURNING {SCRAPE_LOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.error_message)
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.metadata.map(Json))
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to update scrape log {id}"))?;

        tx.commit().await.context("Failed to commit scrape log")?;

        ScrapeLog::try_from(row)
    }

    async fn save_notification(&self, notification: &Notification) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (product_id, competitor_id, type, title, message, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(notification.product_id)
        .bind(notification.competitor_id)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(Json(&notification.metadata))
        .fetch_one(&self.pool)
        .await
        .context("Failed to save notification")?;

        Ok(id)
    }

    async fn delete_scrape_logs_older_than(&self, retention_days: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM scrape_logs WHERE created_at < NOW() - make_interval(days => $1::int)",
        )
        .bind(retention_days as i32)
        .execute(&self.pool)
        .await
        .context("Failed to delete old scrape logs")?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(
                "Deleted {} scrape logs older than {} days",
                deleted, retention_days
            );
        }
        Ok(deleted)
    }
}
