//! Browser-rendered extraction for sources that build prices client-side.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::document::observe_html;
use super::error::ExtractionError;
use super::models::{ExtractionRules, FetchStrategy, Observation};
use super::renderer::{RenderedPage, Renderer};
use super::{politeness_pause, Extractor, FetchSettings};
use crate::metrics::ScrapeMetrics;

/// Renders with a direct browser, or with a proxied one for sources that
/// require it
pub struct RenderedExtractor {
    direct: Arc<dyn Renderer>,
    proxied: Option<Arc<dyn Renderer>>,
    settings: FetchSettings,
}

impl RenderedExtractor {
    pub fn new(direct: Arc<dyn Renderer>, settings: FetchSettings) -> Self {
        Self {
            direct,
            proxied: None,
            settings,
        }
    }

    /// Browser used for sources flagged `requires_proxy`
    pub fn with_proxied(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.proxied = Some(renderer);
        self
    }

    fn renderer_for(&self, rules: &ExtractionRules) -> &Arc<dyn Renderer> {
        if !rules.requires_proxy {
            return &self.direct;
        }
        match &self.proxied {
            Some(renderer) => renderer,
            None => {
                warn!("Source requires a proxy but no proxied browser is configured, rendering directly");
                &self.direct
            }
        }
    }

    /// Opens a page and loads the document, all under the request timeout.
    /// The page is closed on every path, including a timeout.
    async fn render(
        &self,
        renderer: &dyn Renderer,
        url: &str,
        rules: &ExtractionRules,
    ) -> Result<String, ExtractionError> {
        let mut opened: Option<Box<dyn RenderedPage>> = None;

        let load = async {
            let page = opened.insert(renderer.open_page().await?);
            page.set_extra_headers(&rules.headers).await?;
            page.navigate(url).await?;
            page.html().await
        };
        let result = tokio::time::timeout(self.settings.timeout, load).await;

        if let Some(page) = opened.take() {
            match tokio::time::timeout(self.settings.timeout, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to close browser page: {:#}", e),
                Err(_) => warn!("Timed out closing browser page for {}", url),
            }
        }

        match result {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => Err(ExtractionError::Browser(format!("{e:#}"))),
            Err(_) => Err(ExtractionError::Timeout(self.settings.timeout_ms())),
        }
    }
}

#[async_trait]
impl Extractor for RenderedExtractor {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    async fn extract(&self, url: &str, rules: &ExtractionRules) -> Observation {
        politeness_pause(self.settings.delay_for(rules)).await;

        let renderer = self.renderer_for(rules);
        let started = Instant::now();
        debug!("Rendering {} (proxy: {:?})", url, renderer.proxy());

        let observation = match self.render(renderer.as_ref(), url, rules).await {
            Ok(html) => observe_html(&html, rules),
            Err(e) => Observation::failed(&e),
        };

        let elapsed = started.elapsed();
        ScrapeMetrics::observe_fetch("rendered", elapsed.as_secs_f64(), observation.success);

        observation
            .with_metadata("strategy", "rendered")
            .with_metadata("fetch_ms", elapsed.as_millis() as u64)
            .with_metadata("proxy_used", renderer.proxy().is_some())
    }
}
