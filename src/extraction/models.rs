use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::ExtractionError;
use crate::constants::selectors;

/// Which extraction implementation a source needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Single HTTP GET, markup parsed as-is
    #[default]
    Static,
    /// Headless browser render, markup read from the live document
    Rendered,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Static => "static",
            FetchStrategy::Rendered => "rendered",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(FetchStrategy::Static),
            "rendered" => Ok(FetchStrategy::Rendered),
            other => Err(format!("unknown fetch strategy '{other}'")),
        }
    }
}

/// Per-source extraction ruleset. Unset selectors fall back to the defaults
/// in [`crate::constants::selectors`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_selector: Option<String>,

    /// Marker whose presence means the listing is out of stock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_selector: Option<String>,

    /// Extra request headers sent to the source
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Politeness delay override in milliseconds
    #[serde(default, rename = "delay", alias = "delayMs", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,

    /// Route the fetch through the proxy pool
    #[serde(default)]
    pub requires_proxy: bool,
}

impl ExtractionRules {
    pub fn price_selector(&self) -> &str {
        self.price_selector.as_deref().unwrap_or(selectors::PRICE)
    }

    pub fn name_selector(&self) -> &str {
        self.name_selector.as_deref().unwrap_or(selectors::NAME)
    }

    pub fn image_selector(&self) -> &str {
        self.image_selector.as_deref().unwrap_or(selectors::IMAGE)
    }

    pub fn availability_selector(&self) -> &str {
        self.availability_selector
            .as_deref()
            .unwrap_or(selectors::UNAVAILABLE)
    }
}

/// How a failed extraction should be treated by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network failure or timeout
    Transient,
    /// Selector missing or price unparseable
    Parse,
}

/// Canonical result of one extraction attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl Observation {
    /// Unsuccessful observation carrying the error text and its retry class
    pub fn failed(error: &ExtractionError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            failure: Some(error.kind()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Positive price, only present on a successful observation
    pub fn valid_price(&self) -> Option<f64> {
        match self.price {
            Some(price) if self.success && price > 0.0 => Some(price),
            _ => None,
        }
    }

    /// Whether the retry policy should try this task again
    pub fn is_retryable(&self, retry_parse_failures: bool) -> bool {
        if self.success {
            return false;
        }
        match self.failure {
            Some(FailureKind::Parse) => retry_parse_failures,
            _ => true,
        }
    }
}
