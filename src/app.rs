//! Wires configuration, storage and the event sink into the running pipeline.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::MarketGuardConfig;
use crate::database::PriceRepository;
use crate::events::EventSink;
use crate::extraction::{
    ChromiumRenderer, ExtractorSet, FetchSettings, RenderedExtractor, Renderer, RendererSettings,
    StaticExtractor,
};
use crate::pricing::PriceDecisionEngine;
use crate::proxy::{ProxyPool, ProxyRotation};
use crate::scraping::{RetryPolicy, ScrapeScheduler, TaskRunner};

pub struct App {
    pub config: MarketGuardConfig,
    pub repository: Arc<dyn PriceRepository>,
    pub events: Arc<dyn EventSink>,
    pub engine: Arc<PriceDecisionEngine>,
    pub scheduler: Arc<ScrapeScheduler>,
    renderers: Vec<Arc<dyn Renderer>>,
}

impl App {
    pub fn build(
        config: MarketGuardConfig,
        repository: Arc<dyn PriceRepository>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let proxies = Arc::new(ProxyPool::new(config.proxy.active_endpoints()));
        let fetch_settings = FetchSettings::from_config(&config.scraping);

        // Chromium takes one proxy per process, so proxied sources get their own browser
        let renderer_settings = RendererSettings::from_config(&config.browser, &config.scraping);
        let mut renderers: Vec<Arc<dyn Renderer>> =
            vec![Arc::new(ChromiumRenderer::new(renderer_settings.clone(), None))];
        let mut rendered = RenderedExtractor::new(Arc::clone(&renderers[0]), fetch_settings.clone());
        if let Some(endpoint) = proxies.next() {
            let proxied: Arc<dyn Renderer> =
                Arc::new(ChromiumRenderer::new(renderer_settings, Some(endpoint)));
            rendered = rendered.with_proxied(Arc::clone(&proxied));
            renderers.push(proxied);
        }

        let extractors = ExtractorSet::new(
            Arc::new(StaticExtractor::new(fetch_settings, proxies)?),
            Arc::new(rendered),
        );

        let engine = Arc::new(PriceDecisionEngine::new(
            Arc::clone(&repository),
            Arc::clone(&events),
            config.pricing.min_price_margin_default,
        ));

        let mut runner = TaskRunner::new(
            Arc::clone(&repository),
            extractors,
            Arc::clone(&events),
            RetryPolicy::from_config(&config.scraping),
        );
        if config.scraping.evaluate_on_observation {
            runner = runner.with_engine(Arc::clone(&engine));
        }

        let scheduler = Arc::new(ScrapeScheduler::new(
            Arc::clone(&repository),
            Arc::new(runner),
            Arc::clone(&events),
            config.scraping.worker_pool_size,
        ));

        info!(
            "Pipeline ready: {} workers, {} retry attempts, proxy {}",
            config.scraping.worker_pool_size,
            config.scraping.retry_attempts,
            if config.proxy.enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            config,
            repository,
            events,
            engine,
            scheduler,
            renderers,
        })
    }

    /// Closes every headless browser that was started
    pub async fn shutdown(&self) -> Result<()> {
        for renderer in &self.renderers {
            renderer.shutdown().await?;
        }
        Ok(())
    }
}
