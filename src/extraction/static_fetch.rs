//! Single-request HTTP extraction.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::document::observe_html;
use super::error::ExtractionError;
use super::models::{ExtractionRules, FetchStrategy, Observation};
use super::{politeness_pause, Extractor, FetchSettings};
use crate::metrics::ScrapeMetrics;
use crate::proxy::{proxy_url, ProxyRotation};

/// Fetches the raw markup with one GET and applies the rules to it
pub struct StaticExtractor {
    client: Client,
    settings: FetchSettings,
    proxies: Arc<dyn ProxyRotation>,
}

impl StaticExtractor {
    pub fn new(settings: FetchSettings, proxies: Arc<dyn ProxyRotation>) -> anyhow::Result<Self> {
        let client = build_client(&settings, None)?;
        Ok(Self {
            client,
            settings,
            proxies,
        })
    }

    /// Client for this request; a fresh one when the source must go through a proxy
    fn client_for(&self, rules: &ExtractionRules) -> anyhow::Result<(Client, Option<String>)> {
        if !rules.requires_proxy {
            return Ok((self.client.clone(), None));
        }
        match self.proxies.next() {
            Some(endpoint) => {
                let client = build_client(&self.settings, Some(&endpoint))?;
                Ok((client, Some(endpoint)))
            }
            None => {
                warn!("Source requires a proxy but the pool is empty, fetching directly");
                Ok((self.client.clone(), None))
            }
        }
    }

    async fn fetch(
        &self,
        client: &Client,
        url: &str,
        rules: &ExtractionRules,
    ) -> Result<(u16, String), ExtractionError> {
        let response = client
            .get(url)
            .headers(request_headers(rules))
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        Ok((status.as_u16(), body))
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> ExtractionError {
        if error.is_timeout() {
            ExtractionError::Timeout(self.settings.timeout_ms())
        } else {
            ExtractionError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Static
    }

    async fn extract(&self, url: &str, rules: &ExtractionRules) -> Observation {
        politeness_pause(self.settings.delay_for(rules)).await;

        let (client, proxy) = match self.client_for(rules) {
            Ok(selected) => selected,
            Err(e) => {
                let error = ExtractionError::Network(format!("{e:#}"));
                return Observation::failed(&error).with_metadata("strategy", "static");
            }
        };

        let started = Instant::now();
        debug!("Fetching {} (proxy: {:?})", url, proxy);

        let (observation, status_code) = match self.fetch(&client, url, rules).await {
            Ok((status, body)) => (observe_html(&body, rules), Some(status)),
            Err(e) => {
                let status = match &e {
                    ExtractionError::HttpStatus(code) => Some(*code),
                    _ => None,
                };
                (Observation::failed(&e), status)
            }
        };

        let elapsed = started.elapsed();
        ScrapeMetrics::observe_fetch("static", elapsed.as_secs_f64(), observation.success);

        let mut observation = observation
            .with_metadata("strategy", "static")
            .with_metadata("fetch_ms", elapsed.as_millis() as u64)
            .with_metadata("proxy_used", proxy.is_some());
        if let Some(code) = status_code {
            observation = observation.with_metadata("status_code", code);
        }
        observation
    }
}

fn build_client(settings: &FetchSettings, proxy: Option<&str>) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.clone());

    if let Some(endpoint) = proxy {
        let proxy = Proxy::all(proxy_url(endpoint))
            .with_context(|| format!("Invalid proxy endpoint '{endpoint}'"))?;
        builder = builder.proxy(proxy);
    }

    builder.build().context("Failed to build HTTP client")
}

// Invalid header names or values are skipped rather than failing the fetch
fn request_headers(rules: &ExtractionRules) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &rules.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping invalid request header '{}'", name),
        }
    }
    headers
}
