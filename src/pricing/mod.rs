//! Guarded price decisions and the price ledger.

pub mod engine;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod locks;

pub use engine::{
    recommend, AlertReason, Decision, EvaluationSummary, PriceDecisionEngine, Recommendation,
};
pub use error::{GuardViolation, PricingError};
pub use guard::check_guards;
pub use locks::ProductLocks;
