use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::error::{GuardViolation, PricingError};
use super::guard::check_guards;
use super::ledger;
use super::locks::ProductLocks;
use crate::constants::pricing::{REASON_AUTOMATIC, REASON_EVALUATION, REASON_MANUAL};
use crate::database::models::{CompetitorLink, PriceHistoryEntry, Product};
use crate::database::PriceRepository;
use crate::events::{EventSink, EventType, Notification};
use crate::metrics::PriceMetrics;

/// Cheapest comparable competitor offer and the price that would undercut it
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub competitor_id: i64,
    pub link_id: i64,
    pub competitor_price: f64,
    pub price_gap: f64,
    pub recommended_price: f64,
}

/// Why an undercutting competitor only produced an alert
#[derive(Debug, Clone, PartialEq)]
pub enum AlertReason {
    Guard(GuardViolation),
    AutoAdjustmentDisabled,
}

/// Outcome of evaluating one product
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No available competitor with a positive price
    NoCompetitorData,
    /// Our price is already at or below the cheapest competitor
    Competitive { min_competitor_price: f64 },
    /// The price was lowered automatically
    Adjusted {
        recommendation: Recommendation,
        old_price: f64,
        entry: PriceHistoryEntry,
    },
    /// A competitor is cheaper but the price was left alone
    AlertOnly {
        recommendation: Recommendation,
        reason: AlertReason,
    },
}

impl Decision {
    pub fn is_adjusted(&self) -> bool {
        matches!(self, Decision::Adjusted { .. })
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Decision::AlertOnly { .. })
    }
}

/// Counts from one evaluation pass over all active products
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub adjusted: usize,
    pub alerts: usize,
    pub failed: usize,
}

/// Finds the cheapest comparable link and, when it undercuts `product`,
/// the price that would undercut it by `margin`
pub fn recommend(product: &Product, links: &[CompetitorLink], margin: f64) -> Option<Recommendation> {
    let (link, competitor_price) = links
        .iter()
        .filter_map(|link| link.comparable_price().map(|price| (link, price)))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    if product.current_price <= competitor_price {
        return None;
    }

    Some(Recommendation {
        competitor_id: link.competitor_id,
        link_id: link.id,
        competitor_price,
        price_gap: product.current_price - competitor_price,
        recommended_price: competitor_price - margin,
    })
}

/// Turns competitor observations into guarded price changes or alerts.
///
/// Every mutation of a product's price goes through the product's lock, so
/// concurrent evaluations of the same product are applied one after another.
pub struct PriceDecisionEngine {
    repository: Arc<dyn PriceRepository>,
    events: Arc<dyn EventSink>,
    locks: ProductLocks,
    default_margin: f64,
}

impl PriceDecisionEngine {
    pub fn new(
        repository: Arc<dyn PriceRepository>,
        events: Arc<dyn EventSink>,
        default_margin: f64,
    ) -> Self {
        Self {
            repository,
            events,
            locks: ProductLocks::new(),
            default_margin,
        }
    }

    pub fn margin_for(&self, product: &Product) -> f64 {
        product.auto_adjustment_margin.unwrap_or(self.default_margin)
    }

    async fn load_product(&self, product_id: i64) -> Result<Product, PricingError> {
        self.repository
            .get_product(product_id)
            .await?
            .ok_or(PricingError::ProductNotFound(product_id))
    }

    /// Evaluates one product against its competitors and appends a ledger entry
    pub async fn evaluate_product(&self, product_id: i64) -> Result<Decision, PricingError> {
        let _guard = self.locks.acquire(product_id).await;

        let product = self.load_product(product_id).await?;
        let links = self.repository.get_links_for_product(product_id).await?;
        PriceMetrics::set_product_price(product.id, product.current_price);

        let margin = self.margin_for(&product);
        let min_competitor_price = links
            .iter()
            .filter_map(CompetitorLink::comparable_price)
            .min_by(f64::total_cmp);

        let Some(min_competitor_price) = min_competitor_price else {
            debug!("Product {} has no comparable competitor prices", product.id);
            ledger::record_current_price(self.repository.as_ref(), &product, REASON_EVALUATION)
                .await?;
            return Ok(Decision::NoCompetitorData);
        };
        PriceMetrics::set_price_gap(product.id, product.current_price - min_competitor_price);

        let Some(recommendation) = recommend(&product, &links, margin) else {
            ledger::record_current_price(self.repository.as_ref(), &product, REASON_EVALUATION)
                .await?;
            return Ok(Decision::Competitive {
                min_competitor_price,
            });
        };

        info!(
            "Product {} undercut by competitor {}: ours {:.2}, theirs {:.2}, recommended {:.2}",
            product.id,
            recommendation.competitor_id,
            product.current_price,
            recommendation.competitor_price,
            recommendation.recommended_price
        );

        if let Err(violation) = check_guards(&product, recommendation.recommended_price) {
            warn!(
                "Recommended price for product {} rejected: {}",
                product.id, violation
            );
            PriceMetrics::record_guard_violation(violation.guard());
            self.notify(Notification::competitor_price_drop(
                product.id,
                &product.name,
                recommendation.competitor_id,
                recommendation.competitor_price,
                product.current_price,
                recommendation.recommended_price,
                Some(violation.to_string()),
            ))
            .await;
            ledger::record_current_price(self.repository.as_ref(), &product, REASON_EVALUATION)
                .await?;
            return Ok(Decision::AlertOnly {
                recommendation,
                reason: AlertReason::Guard(violation),
            });
        }

        if !product.auto_price_adjustment {
            self.notify(Notification::competitor_price_drop(
                product.id,
                &product.name,
                recommendation.competitor_id,
                recommendation.competitor_price,
                product.current_price,
                recommendation.recommended_price,
                None,
            ))
            .await;
            ledger::record_current_price(self.repository.as_ref(), &product, REASON_EVALUATION)
                .await?;
            return Ok(Decision::AlertOnly {
                recommendation,
                reason: AlertReason::AutoAdjustmentDisabled,
            });
        }

        // the adjustment entry doubles as this cycle's ledger entry
        let old_price = product.current_price;
        let entry = self
            .apply_price(&product, recommendation.recommended_price, true, REASON_AUTOMATIC)
            .await?;

        self.notify(Notification::auto_price_adjusted(
            product.id,
            &product.name,
            recommendation.competitor_id,
            old_price,
            recommendation.recommended_price,
        ))
        .await;

        Ok(Decision::Adjusted {
            recommendation,
            old_price,
            entry,
        })
    }

    /// Evaluates every active product; one failure never stops the pass
    pub async fn evaluate_all(&self) -> Result<EvaluationSummary, PricingError> {
        let products = self.repository.get_active_products().await?;
        let mut summary = EvaluationSummary::default();

        for product in products {
            match self.evaluate_product(product.id).await {
                Ok(decision) => {
                    summary.evaluated += 1;
                    if decision.is_adjusted() {
                        summary.adjusted += 1;
                    }
                    if decision.is_alert() {
                        summary.alerts += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Failed to evaluate product {}: {}", product.id, e);
                }
            }
        }

        info!(
            "Price evaluation completed: {} evaluated, {} adjusted, {} alerts, {} failed",
            summary.evaluated, summary.adjusted, summary.alerts, summary.failed
        );

        self.events.emit(
            EventType::ScrapingStatus,
            json!({
                "status": "price-check-completed",
                "evaluated": summary.evaluated,
                "adjusted": summary.adjusted,
                "alerts": summary.alerts,
                "failed": summary.failed,
            }),
        );

        Ok(summary)
    }

    /// Sets a price on explicit request. No competitor comparison; guards still apply.
    pub async fn set_manual_price(
        &self,
        product_id: i64,
        target_price: f64,
    ) -> Result<PriceHistoryEntry, PricingError> {
        let _guard = self.locks.acquire(product_id).await;

        let product = self.load_product(product_id).await?;

        if let Err(violation) = check_guards(&product, target_price) {
            warn!(
                "Manual price {:.2} for product {} rejected: {}",
                target_price, product_id, violation
            );
            PriceMetrics::record_guard_violation(violation.guard());
            return Err(violation.into());
        }

        self.apply_price(&product, target_price, false, REASON_MANUAL)
            .await
    }

    async fn apply_price(
        &self,
        product: &Product,
        new_price: f64,
        auto: bool,
        reason: &str,
    ) -> Result<PriceHistoryEntry, PricingError> {
        let previous = ledger::last_recorded_price(self.repository.as_ref(), product).await?;
        let entry = self
            .repository
            .apply_price_adjustment(
                product.id,
                new_price,
                ledger::new_entry(product.id, new_price, previous, auto, reason),
            )
            .await?;

        PriceMetrics::record_adjustment(auto);
        PriceMetrics::set_product_price(product.id, new_price);

        info!(
            "Product {} price changed {:.2} -> {:.2} ({})",
            product.id, product.current_price, new_price, reason
        );

        self.events.emit(
            EventType::PriceUpdate,
            json!({
                "kind": "product",
                "productId": product.id,
                "oldPrice": product.current_price,
                "newPrice": new_price,
                "isAutoAdjusted": auto,
                "reason": reason,
            }),
        );

        Ok(entry)
    }

    /// Persists the notification and pushes it to the sink; a storage failure is only logged
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.repository.save_notification(&notification).await {
            warn!("Failed to persist notification: {:#}", e);
        }
        self.events
            .emit(EventType::Notification, notification.to_payload());
    }
}
