pub mod metrics_config;
pub mod models;
pub mod parser;
#[cfg(test)]
mod tests;

pub use models::MarketGuardConfig;
pub use parser::*;
