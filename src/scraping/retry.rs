use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::config::models::ScrapingConfig;
use crate::constants::scraping::MAX_BACKOFF_INTERVAL_MS;
use crate::extraction::Observation;

/// Attempt cap and exponential backoff for one scrape task
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub retry_parse_failures: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &ScrapingConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            backoff_base: config.backoff_base(),
            retry_parse_failures: config.retry_parse_failures,
        }
    }

    /// Delays of base, 2 x base, 4 x base and so on, without jitter
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.backoff_base)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_millis(MAX_BACKOFF_INTERVAL_MS).max(self.backoff_base))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Whether another attempt follows `attempt` for this observation
    pub fn should_retry(&self, observation: &Observation, attempt: u32) -> bool {
        attempt < self.max_attempts && observation.is_retryable(self.retry_parse_failures)
    }

    /// Delays between consecutive attempts, in order
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.max_attempts)
            .map(|_| backoff.next_backoff().unwrap_or(self.backoff_base))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionError;

    fn policy(max_attempts: u32, retry_parse_failures: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(5000),
            retry_parse_failures,
        }
    }

    #[test]
    fn test_delays_double_from_base() {
        assert_eq!(
            policy(4, true).delays(),
            vec![
                Duration::from_millis(5000),
                Duration::from_millis(10000),
                Duration::from_millis(20000)
            ]
        );
        assert!(policy(1, true).delays().is_empty());
    }

    #[test]
    fn test_retry_until_cap() {
        let p = policy(3, true);
        let failed = Observation::failed(&ExtractionError::Timeout(30000));
        assert!(p.should_retry(&failed, 1));
        assert!(p.should_retry(&failed, 2));
        assert!(!p.should_retry(&failed, 3));
    }

    #[test]
    fn test_success_is_never_retried() {
        let ok = Observation {
            success: true,
            price: Some(10.0),
            ..Default::default()
        };
        assert!(!policy(3, true).should_retry(&ok, 1));
    }

    #[test]
    fn test_parse_failures_can_fail_fast() {
        let parse = Observation::failed(&ExtractionError::PriceNotFound(".price".to_string()));
        assert!(policy(3, true).should_retry(&parse, 1));
        assert!(!policy(3, false).should_retry(&parse, 1));

        let network = Observation::failed(&ExtractionError::Network("reset".to_string()));
        assert!(policy(3, false).should_retry(&network, 1));
    }
}
