//! Egress proxy rotation for outbound fetches.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Source of egress endpoints. Callers only ever see the next endpoint.
pub trait ProxyRotation: Send + Sync {
    /// Returns the next endpoint, or `None` when no proxies are configured
    fn next(&self) -> Option<String>;
}

/// Round-robin proxy pool with a lock-free cursor
#[derive(Debug, Default)]
pub struct ProxyPool {
    endpoints: Vec<String>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<String>) -> Self {
        if !endpoints.is_empty() {
            info!("Initialized proxy pool with {} endpoint(s)", endpoints.len());
        }
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl ProxyRotation for ProxyPool {
    fn next(&self) -> Option<String> {
        if self.endpoints.is_empty() {
            return None;
        }
        // fetch_add wraps on overflow; the modulo keeps the sequence cyclic
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Some(self.endpoints[index].clone())
    }
}

/// Turns `host:port` into a URL reqwest and Chromium both accept
pub fn proxy_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}
