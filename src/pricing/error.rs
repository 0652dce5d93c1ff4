use thiserror::Error;

/// A price that an automatic or manual change must never reach
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardViolation {
    #[error("Price {price:.2} is below the minimum price {min_price:.2}")]
    BelowMinPrice { price: f64, min_price: f64 },

    #[error("Price {price:.2} is below the cost price {cost_price:.2}")]
    BelowCostPrice { price: f64, cost_price: f64 },

    #[error("Price {0} is not a positive number")]
    InvalidPrice(f64),
}

impl GuardViolation {
    /// Short label used for metrics and notification metadata
    pub fn guard(&self) -> &'static str {
        match self {
            GuardViolation::BelowMinPrice { .. } => "min_price",
            GuardViolation::BelowCostPrice { .. } => "cost_price",
            GuardViolation::InvalidPrice(_) => "invalid_price",
        }
    }
}

/// Errors that can occur while evaluating or changing a product price
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Guard violation: {0}")]
    Guard(#[from] GuardViolation),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}
