use thiserror::Error;

use super::models::FailureKind;

/// Errors that can occur while extracting a price from a source
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP error with status code: {0}")]
    HttpStatus(u16),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No element matched price selector '{0}'")]
    PriceNotFound(String),

    #[error("Could not parse a positive price from '{0}'")]
    UnparseablePrice(String),
}

impl ExtractionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractionError::Network(_)
            | ExtractionError::Timeout(_)
            | ExtractionError::HttpStatus(_)
            | ExtractionError::Browser(_) => FailureKind::Transient,
            ExtractionError::InvalidSelector { .. }
            | ExtractionError::PriceNotFound(_)
            | ExtractionError::UnparseablePrice(_) => FailureKind::Parse,
        }
    }
}
