#[cfg(test)]
mod tests {
    use std::io::Write;
    use tempfile::NamedTempFile;
    use crate::config::parser::{load_config, parse_config, validate_config, ConfigError};

    // Helper function to create a temporary file with content
    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes()).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_valid_configuration() {
        let config_yaml = r#"
        scraping:
          schedule: "0 */10 * * * *"
          retry_attempts: 4
          backoff_base_ms: 2000
          timeout_ms: 15000
          politeness_delay_ms: 1000
          worker_pool_size: 6
          evaluate_on_observation: false

        browser:
          executable: /usr/bin/chromium
          idle_settle_ms: 250

        pricing:
          schedule: "0 */30 * * * *"
          min_price_margin_default: 150

        database_cleanup:
          enabled: true
          retention_days: 14

        metrics:
          enabled: false
          port: 9191
        "#;

        let config = parse_config(config_yaml).expect("Failed to parse valid config");
        validate_config(&config).expect("Valid config rejected");

        assert_eq!(config.scraping.schedule, "0 */10 * * * *");
        assert_eq!(config.scraping.retry_attempts, 4);
        assert_eq!(config.scraping.backoff_base_ms, 2000);
        assert_eq!(config.scraping.timeout_ms, 15000);
        assert_eq!(config.scraping.politeness_delay_ms, 1000);
        assert_eq!(config.scraping.worker_pool_size, 6);
        assert!(!config.scraping.evaluate_on_observation);
        assert!(config.scraping.retry_parse_failures);

        assert_eq!(
            config.browser.executable.as_deref(),
            Some(std::path::Path::new("/usr/bin/chromium"))
        );
        assert_eq!(config.browser.idle_settle_ms, 250);

        assert_eq!(config.pricing.min_price_margin_default, 150.0);
        assert_eq!(config.database_cleanup.retention_days, 14);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9191);
    }

    #[test]
    fn test_minimal_configuration_uses_defaults() {
        let config = parse_config("").expect("Empty config should parse");
        validate_config(&config).expect("Default config should validate");

        assert_eq!(config.scraping.retry_attempts, 3);
        assert_eq!(config.scraping.backoff_base_ms, 5000);
        assert_eq!(config.scraping.timeout_ms, 30000);
        assert_eq!(config.scraping.politeness_delay_ms, 5000);
        assert_eq!(config.pricing.min_price_margin_default, 100.0);
        assert!(!config.proxy.enabled);
        assert!(config.proxy.list.is_empty());
        assert!(config.database_cleanup.enabled);
        assert_eq!(config.database_cleanup.schedule, "0 0 3 * * *");
    }

    #[test]
    fn test_invalid_cron_schedule() {
        let config_yaml = r#"
        scraping:
          schedule: "every fifteen minutes"
        "#;

        let config = parse_config(config_yaml).unwrap();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_retry_attempts_out_of_range() {
        let config_yaml = r#"
        scraping:
          retry_attempts: 0
        "#;

        let config = parse_config(config_yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_worker_pool_out_of_range() {
        let config_yaml = r#"
        scraping:
          worker_pool_size: 0
        "#;

        let config = parse_config(config_yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_negative_margin_rejected() {
        let config_yaml = r#"
        pricing:
          min_price_margin_default: -5
        "#;

        let config = parse_config(config_yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_enabled_proxy_without_endpoints() {
        let config_yaml = r#"
        proxy:
          enabled: true
          list: ["  "]
        "#;

        let config = parse_config(config_yaml).unwrap();
        let result = validate_config(&config);

        if let Err(ConfigError::Other(err)) = result {
            assert!(err.contains("proxy list is empty"));
        } else {
            panic!("Expected Other error for empty proxy list");
        }
    }

    #[test]
    fn test_invalid_yaml() {
        let config_yaml = r#"
        scraping:
          retry_attempts: [not, a, number
        "#;

        let temp_file = create_temp_file(config_yaml);
        let result = load_config(temp_file.path());

        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_wrong_field_type() {
        let config_yaml = r#"
        scraping:
          timeout_ms: "thirty seconds"
        "#;

        let temp_file = create_temp_file(config_yaml);
        let result = load_config(temp_file.path());

        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/marketguard/config.yaml");
        assert!(matches!(result, Err(ConfigError::FileError(_))));
    }
}
