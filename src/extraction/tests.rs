#[cfg(test)]
mod tests {
    mod document_tests {
        use crate::extraction::document::{inspect_html, observe_html};
        use crate::extraction::{ExtractionRules, FailureKind};

        const PRODUCT_PAGE: &str = r#"
            <html><body>
              <h1 class="product-title"> Samsung Galaxy A15 </h1>
              <div class="product-image"><img data-src="/img/a15.jpg"></div>
              <span class="price">2 449 000 so'm</span>
            </body></html>
        "#;

        #[test]
        fn test_default_selectors() {
            let obs = observe_html(PRODUCT_PAGE, &ExtractionRules::default());

            assert!(obs.success);
            assert_eq!(obs.price, Some(2449000.0));
            assert_eq!(obs.name.as_deref(), Some("Samsung Galaxy A15"));
            assert_eq!(obs.image_url.as_deref(), Some("/img/a15.jpg"));
            assert_eq!(obs.is_available, Some(true));
            assert!(obs.error.is_none());
        }

        #[test]
        fn test_custom_selectors_take_precedence() {
            let html = r#"
                <div id="cost">19,99 €</div>
                <span class="price">1.00</span>
                <p class="sold-out">Sold out</p>
            "#;
            let rules = ExtractionRules {
                price_selector: Some("#cost".to_string()),
                availability_selector: Some(".sold-out".to_string()),
                ..Default::default()
            };

            let obs = observe_html(html, &rules);
            assert!(obs.success);
            assert_eq!(obs.price, Some(19.99));
            assert_eq!(obs.is_available, Some(false));
        }

        #[test]
        fn test_price_from_data_attribute() {
            let html = r#"<meta class="price" content="349.50">"#;
            let snapshot = inspect_html(html, &ExtractionRules::default()).unwrap();
            assert_eq!(snapshot.price_text.as_deref(), Some("349.50"));
        }

        #[test]
        fn test_image_prefers_src() {
            let html = r#"<img class="product-img" src="/a.png" data-src="/b.png">"#;
            let snapshot = inspect_html(html, &ExtractionRules::default()).unwrap();
            assert_eq!(snapshot.image_url.as_deref(), Some("/a.png"));
        }

        #[test]
        fn test_missing_price_is_parse_failure() {
            let obs = observe_html("<h1>Only a name</h1>", &ExtractionRules::default());

            assert!(!obs.success);
            assert!(obs.price.is_none());
            assert_eq!(obs.name.as_deref(), Some("Only a name"));
            assert_eq!(obs.failure, Some(FailureKind::Parse));
            assert!(obs.error.unwrap().contains("No element matched"));
        }

        #[test]
        fn test_unparseable_price_is_zero_and_failed() {
            let html = r#"<span class="price">Narxni so'rang</span>"#;
            let obs = observe_html(html, &ExtractionRules::default());

            assert!(!obs.success);
            assert_eq!(obs.price, Some(0.0));
            assert_eq!(obs.valid_price(), None);
            assert_eq!(obs.failure, Some(FailureKind::Parse));
        }

        #[test]
        fn test_invalid_selector() {
            let rules = ExtractionRules {
                price_selector: Some("[[[".to_string()),
                ..Default::default()
            };
            let obs = observe_html(PRODUCT_PAGE, &rules);
            assert!(!obs.success);
            assert!(obs.error.unwrap().contains("Invalid selector"));
        }

        #[test]
        fn test_out_of_stock_with_price() {
            let html = r#"<span class="price">100</span><div class="unavailable"></div>"#;
            let obs = observe_html(html, &ExtractionRules::default());
            assert!(obs.success);
            assert_eq!(obs.is_available, Some(false));
        }
    }

    mod rules_tests {
        use crate::extraction::{ExtractionRules, FetchSettings, FetchStrategy};
        use std::time::Duration;

        #[test]
        fn test_rules_deserialize_from_competitor_json() {
            let json = serde_json::json!({
                "priceSelector": ".cost",
                "headers": {"Accept-Language": "uz"},
                "delay": 1500,
                "requiresProxy": true
            });
            let rules: ExtractionRules = serde_json::from_value(json).unwrap();

            assert_eq!(rules.price_selector(), ".cost");
            assert_eq!(rules.name_selector(), crate::constants::selectors::NAME);
            assert_eq!(rules.headers.get("Accept-Language").unwrap(), "uz");
            assert_eq!(rules.delay_ms, Some(1500));
            assert!(rules.requires_proxy);
        }

        #[test]
        fn test_delay_resolution() {
            let settings = FetchSettings {
                timeout: Duration::from_secs(30),
                politeness_delay: Duration::from_millis(5000),
                user_agent: "ua".to_string(),
            };
            let mut rules = ExtractionRules::default();
            assert_eq!(settings.delay_for(&rules), Duration::from_millis(5000));

            rules.delay_ms = Some(250);
            assert_eq!(settings.delay_for(&rules), Duration::from_millis(250));
        }

        #[test]
        fn test_fetch_strategy_parsing() {
            assert_eq!("Rendered".parse::<FetchStrategy>().unwrap(), FetchStrategy::Rendered);
            assert_eq!("static".parse::<FetchStrategy>().unwrap(), FetchStrategy::Static);
            assert!("dynamic".parse::<FetchStrategy>().is_err());
        }
    }

    mod static_tests {
        use crate::extraction::{
            ExtractionRules, Extractor, FailureKind, FetchSettings, StaticExtractor,
        };
        use crate::proxy::ProxyPool;
        use std::sync::Arc;
        use std::time::Duration;

        fn extractor(timeout_ms: u64) -> StaticExtractor {
            let settings = FetchSettings {
                timeout: Duration::from_millis(timeout_ms),
                politeness_delay: Duration::ZERO,
                user_agent: "marketguard-test".to_string(),
            };
            StaticExtractor::new(settings, Arc::new(ProxyPool::new(Vec::new()))).unwrap()
        }

        #[tokio::test]
        async fn test_static_extract_success() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/product/1")
                .match_header("x-shop", "marketguard")
                .match_header("user-agent", "marketguard-test")
                .with_status(200)
                .with_body(r#"<h1>Phone</h1><span class="price">1,299.99</span>"#)
                .expect(1)
                .create_async()
                .await;

            let mut rules = ExtractionRules::default();
            rules
                .headers
                .insert("x-shop".to_string(), "marketguard".to_string());

            let url = format!("{}/product/1", server.url());
            let obs = extractor(5000).extract(&url, &rules).await;

            assert!(obs.success, "unexpected failure: {:?}", obs.error);
            assert_eq!(obs.price, Some(1299.99));
            assert_eq!(obs.name.as_deref(), Some("Phone"));
            assert_eq!(obs.metadata["strategy"], "static");
            assert_eq!(obs.metadata["status_code"], 200);
            assert_eq!(obs.metadata["proxy_used"], false);

            mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_static_http_error_is_transient() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/gone")
                .with_status(503)
                .with_body("Service Unavailable")
                .expect(1)
                .create_async()
                .await;

            let url = format!("{}/gone", server.url());
            let obs = extractor(5000)
                .extract(&url, &ExtractionRules::default())
                .await;

            assert!(!obs.success);
            assert_eq!(obs.failure, Some(FailureKind::Transient));
            assert!(obs
                .error
                .unwrap()
                .contains("HTTP error with status code: 503"));
            assert_eq!(obs.metadata["status_code"], 503);

            mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_static_connection_error() {
            let obs = extractor(2000)
                .extract("http://127.0.0.1:1/nothing", &ExtractionRules::default())
                .await;

            assert!(!obs.success);
            assert_eq!(obs.failure, Some(FailureKind::Transient));
        }

        #[tokio::test]
        async fn test_static_missing_price_is_parse_failure() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/empty")
                .with_status(200)
                .with_body("<html><body>Nothing here</body></html>")
                .create_async()
                .await;

            let url = format!("{}/empty", server.url());
            let obs = extractor(5000)
                .extract(&url, &ExtractionRules::default())
                .await;

            assert!(!obs.success);
            assert_eq!(obs.failure, Some(FailureKind::Parse));
        }
    }

    mod rendered_tests {
        use crate::extraction::{
            ExtractionRules, Extractor, FailureKind, FetchSettings, FetchStrategy,
            RenderedExtractor, RenderedPage, Renderer,
        };
        use anyhow::{anyhow, Result};
        use async_trait::async_trait;
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        #[derive(Clone)]
        enum Behaviour {
            Html(&'static str),
            NavigationFails,
            Hangs,
            OpenHangs,
            CloseFails(&'static str),
        }

        struct FakeRenderer {
            behaviour: Behaviour,
            proxy: Option<String>,
            open: Arc<AtomicUsize>,
            opened_total: AtomicUsize,
            headers_seen: Arc<Mutex<HashMap<String, String>>>,
        }

        impl FakeRenderer {
            fn new(behaviour: Behaviour) -> Self {
                Self {
                    behaviour,
                    proxy: None,
                    open: Arc::new(AtomicUsize::new(0)),
                    opened_total: AtomicUsize::new(0),
                    headers_seen: Arc::new(Mutex::new(HashMap::new())),
                }
            }

            fn proxied(behaviour: Behaviour, endpoint: &str) -> Self {
                Self {
                    proxy: Some(endpoint.to_string()),
                    ..Self::new(behaviour)
                }
            }

            fn pages_opened(&self) -> usize {
                self.opened_total.load(Ordering::SeqCst)
            }
        }

        struct FakePage {
            behaviour: Behaviour,
            open: Arc<AtomicUsize>,
            headers_seen: Arc<Mutex<HashMap<String, String>>>,
        }

        #[async_trait]
        impl Renderer for FakeRenderer {
            async fn open_page(&self) -> Result<Box<dyn RenderedPage>> {
                if let Behaviour::OpenHangs = self.behaviour {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                self.open.fetch_add(1, Ordering::SeqCst);
                self.opened_total.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakePage {
                    behaviour: self.behaviour.clone(),
                    open: Arc::clone(&self.open),
                    headers_seen: Arc::clone(&self.headers_seen),
                }))
            }

            async fn shutdown(&self) -> Result<()> {
                Ok(())
            }

            fn active_pages(&self) -> usize {
                self.open.load(Ordering::SeqCst)
            }

            fn proxy(&self) -> Option<&str> {
                self.proxy.as_deref()
            }
        }

        #[async_trait]
        impl RenderedPage for FakePage {
            async fn set_extra_headers(&mut self, headers: &HashMap<String, String>) -> Result<()> {
                self.headers_seen.lock().unwrap().extend(headers.clone());
                Ok(())
            }

            async fn navigate(&mut self, _url: &str) -> Result<()> {
                match self.behaviour {
                    Behaviour::Html(_) | Behaviour::CloseFails(_) | Behaviour::OpenHangs => Ok(()),
                    Behaviour::NavigationFails => Err(anyhow!("net::ERR_CONNECTION_RESET")),
                    Behaviour::Hangs => {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(())
                    }
                }
            }

            async fn html(&self) -> Result<String> {
                match self.behaviour {
                    Behaviour::Html(html) | Behaviour::CloseFails(html) => Ok(html.to_string()),
                    _ => Err(anyhow!("no document")),
                }
            }

            async fn close(self: Box<Self>) -> Result<()> {
                self.open.fetch_sub(1, Ordering::SeqCst);
                match self.behaviour {
                    Behaviour::CloseFails(_) => Err(anyhow!("target closed")),
                    _ => Ok(()),
                }
            }
        }

        const LISTING: &str = r#"<span class="price">12 990 so'm</span>"#;

        fn settings(timeout_ms: u64) -> FetchSettings {
            FetchSettings {
                timeout: Duration::from_millis(timeout_ms),
                politeness_delay: Duration::ZERO,
                user_agent: "ua".to_string(),
            }
        }

        fn extractor(renderer: Arc<FakeRenderer>, timeout_ms: u64) -> RenderedExtractor {
            RenderedExtractor::new(renderer, settings(timeout_ms))
        }

        fn proxy_rules(requires_proxy: bool) -> ExtractionRules {
            ExtractionRules {
                requires_proxy,
                ..ExtractionRules::default()
            }
        }

        #[tokio::test]
        async fn test_rendered_extract_success_and_page_closed() {
            let renderer = Arc::new(FakeRenderer::new(Behaviour::Html(
                r#"<div data-price="" class="price">$ 89.90</div>"#,
            )));
            let mut rules = ExtractionRules::default();
            rules.headers.insert("Cookie".to_string(), "region=tashkent".to_string());

            let extractor = extractor(Arc::clone(&renderer), 1000);
            assert_eq!(extractor.strategy(), FetchStrategy::Rendered);

            let obs = extractor.extract("https://shop.example/p/1", &rules).await;

            assert!(obs.success);
            assert_eq!(obs.price, Some(89.9));
            assert_eq!(obs.metadata["strategy"], "rendered");
            assert_eq!(renderer.active_pages(), 0);
            assert_eq!(
                renderer.headers_seen.lock().unwrap().get("Cookie").map(String::as_str),
                Some("region=tashkent")
            );
        }

        #[tokio::test]
        async fn test_rendered_navigation_failure_is_transient() {
            let renderer = Arc::new(FakeRenderer::new(Behaviour::NavigationFails));
            let obs = extractor(Arc::clone(&renderer), 1000)
                .extract("https://shop.example/p/1", &ExtractionRules::default())
                .await;

            assert!(!obs.success);
            assert_eq!(obs.failure, Some(FailureKind::Transient));
            assert!(obs.error.unwrap().contains("ERR_CONNECTION_RESET"));
            assert_eq!(renderer.active_pages(), 0);
        }

        #[tokio::test]
        async fn test_rendered_timeout_releases_page() {
            let renderer = Arc::new(FakeRenderer::new(Behaviour::Hangs));
            let obs = extractor(Arc::clone(&renderer), 50)
                .extract("https://shop.example/p/1", &ExtractionRules::default())
                .await;

            assert!(!obs.success);
            assert_eq!(obs.error.as_deref(), Some("Request timed out after 50ms"));
            assert_eq!(renderer.active_pages(), 0);
        }

        #[tokio::test]
        async fn test_hung_browser_start_times_out() {
            let renderer = Arc::new(FakeRenderer::new(Behaviour::OpenHangs));
            let extraction = extractor(Arc::clone(&renderer), 50);

            let obs = tokio::time::timeout(
                Duration::from_secs(2),
                extraction.extract("https://shop.example/p/1", &ExtractionRules::default()),
            )
            .await
            .expect("extraction must finish within its own timeout");

            assert!(!obs.success);
            assert_eq!(obs.failure, Some(FailureKind::Transient));
            assert_eq!(obs.error.as_deref(), Some("Request timed out after 50ms"));
            assert_eq!(renderer.active_pages(), 0);
        }

        #[tokio::test]
        async fn test_page_close_failure_keeps_observation() {
            let renderer = Arc::new(FakeRenderer::new(Behaviour::CloseFails(LISTING)));
            let obs = extractor(Arc::clone(&renderer), 1000)
                .extract("https://shop.example/p/1", &ExtractionRules::default())
                .await;

            assert!(obs.success);
            assert_eq!(obs.price, Some(12990.0));
            assert_eq!(renderer.active_pages(), 0);
        }

        #[tokio::test]
        async fn test_direct_browser_for_sources_without_proxy() {
            let direct = Arc::new(FakeRenderer::new(Behaviour::Html(LISTING)));
            let proxied = Arc::new(FakeRenderer::proxied(Behaviour::Html(LISTING), "10.0.0.1:3128"));
            let extraction = RenderedExtractor::new(direct.clone(), settings(1000))
                .with_proxied(proxied.clone());

            let obs = extraction
                .extract("https://shop.example/p/1", &proxy_rules(false))
                .await;

            assert!(obs.success);
            assert_eq!(obs.metadata["proxy_used"], false);
            assert_eq!(direct.pages_opened(), 1);
            assert_eq!(proxied.pages_opened(), 0);
        }

        #[tokio::test]
        async fn test_proxied_browser_for_sources_requiring_proxy() {
            let direct = Arc::new(FakeRenderer::new(Behaviour::Html(LISTING)));
            let proxied = Arc::new(FakeRenderer::proxied(Behaviour::Html(LISTING), "10.0.0.1:3128"));
            let extraction = RenderedExtractor::new(direct.clone(), settings(1000))
                .with_proxied(proxied.clone());

            let obs = extraction
                .extract("https://shop.example/p/1", &proxy_rules(true))
                .await;

            assert!(obs.success);
            assert_eq!(obs.metadata["proxy_used"], true);
            assert_eq!(direct.pages_opened(), 0);
            assert_eq!(proxied.pages_opened(), 1);
        }

        #[tokio::test]
        async fn test_missing_proxied_browser_falls_back_to_direct() {
            let direct = Arc::new(FakeRenderer::new(Behaviour::Html(LISTING)));
            let obs = extractor(Arc::clone(&direct), 1000)
                .extract("https://shop.example/p/1", &proxy_rules(true))
                .await;

            assert!(obs.success);
            assert_eq!(obs.metadata["proxy_used"], false);
            assert_eq!(direct.pages_opened(), 1);
        }
    }
}
