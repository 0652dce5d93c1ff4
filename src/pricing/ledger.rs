//! Append-only price history helpers.

use anyhow::Result;

use crate::database::models::{NewPriceHistory, PriceHistoryEntry, Product};
use crate::database::PriceRepository;

/// Reference price for the next ledger entry: the last recorded price,
/// or the product's current price when the ledger is empty
pub async fn last_recorded_price(repository: &dyn PriceRepository, product: &Product) -> Result<f64> {
    Ok(repository
        .latest_price_history(product.id)
        .await?
        .map(|entry| entry.price)
        .unwrap_or(product.current_price))
}

pub fn new_entry(
    product_id: i64,
    price: f64,
    previous_price: f64,
    is_auto_adjusted: bool,
    reason: &str,
) -> NewPriceHistory {
    NewPriceHistory {
        product_id,
        price,
        previous_price,
        is_auto_adjusted,
        reason: Some(reason.to_string()),
    }
}

/// Records the product's current price against the last recorded one
pub async fn record_current_price(
    repository: &dyn PriceRepository,
    product: &Product,
    reason: &str,
) -> Result<PriceHistoryEntry> {
    let previous = last_recorded_price(repository, product).await?;
    repository
        .append_price_history(new_entry(
            product.id,
            product.current_price,
            previous,
            false,
            reason,
        ))
        .await
}
