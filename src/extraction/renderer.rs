//! Headless browser abstraction used by the rendered strategy.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::models::{BrowserConfig, ScrapingConfig};
use crate::constants::browser::CHROMIUM_PATH_ENV;
use crate::proxy::proxy_url;

/// A browser engine that hands out pages
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn RenderedPage>>;

    /// Closes the browser; safe to call when it was never launched
    async fn shutdown(&self) -> Result<()>;

    fn active_pages(&self) -> usize;

    /// Egress proxy the browser was launched with
    fn proxy(&self) -> Option<&str> {
        None
    }
}

/// A single browser tab
#[async_trait]
pub trait RenderedPage: Send + Sync {
    async fn set_extra_headers(&mut self, headers: &HashMap<String, String>) -> Result<()>;

    /// Navigates and returns once the page has settled
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn html(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub idle_settle: Duration,
    pub user_agent: String,
}

impl RendererSettings {
    pub fn from_config(browser: &BrowserConfig, scraping: &ScrapingConfig) -> Self {
        Self {
            executable: browser.executable.clone(),
            headless: browser.headless,
            idle_settle: Duration::from_millis(browser.idle_settle_ms),
            user_agent: scraping.user_agent.clone(),
        }
    }

    fn resolve_executable(&self) -> Option<PathBuf> {
        self.executable
            .clone()
            .or_else(|| std::env::var(CHROMIUM_PATH_ENV).ok().map(PathBuf::from))
    }
}

struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Chromium driven over CDP. The process is launched on first use and lives
/// until [`Renderer::shutdown`].
pub struct ChromiumRenderer {
    settings: RendererSettings,
    proxy: Option<String>,
    browser: Mutex<Option<LaunchedBrowser>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    pub fn new(settings: RendererSettings, proxy: Option<String>) -> Self {
        Self {
            settings,
            proxy,
            browser: Mutex::new(None),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn launch(&self) -> Result<LaunchedBrowser> {
        let mut builder = ChromiumConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.settings.user_agent));

        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = self.settings.resolve_executable() {
            builder = builder.chrome_executable(path);
        }
        if let Some(endpoint) = &self.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy_url(endpoint)));
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        info!(
            "Launched headless browser (proxy: {})",
            self.proxy.as_deref().unwrap_or("none")
        );

        Ok(LaunchedBrowser { browser, handler })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open_page(&self) -> Result<Box<dyn RenderedPage>> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let launched = guard
            .as_ref()
            .ok_or_else(|| anyhow!("browser is not running"))?;

        let page = launched
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumPage {
            page,
            idle_settle: self.settings.idle_settle,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(mut launched) = self.browser.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = launched.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = launched.browser.wait().await {
            warn!("Failed waiting for browser exit: {}", e);
        }
        launched.handler.abort();

        info!("Headless browser shut down");
        Ok(())
    }

    fn active_pages(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

struct ChromiumPage {
    page: Page,
    idle_settle: Duration,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderedPage for ChromiumPage {
    async fn set_extra_headers(&mut self, headers: &HashMap<String, String>) -> Result<()> {
        if headers.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_value(headers)?;
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(value)))
            .await
            .context("failed to set extra headers")?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        // goto resolves once the navigation has committed and loaded
        self.page.goto(url).await.context("navigation failed")?;

        // no network-idle event over CDP; give late XHRs a moment
        if !self.idle_settle.is_zero() {
            tokio::time::sleep(self.idle_settle).await;
        }
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        self.page.content().await.context("failed to read page HTML")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}
