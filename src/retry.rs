use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Exponential backoff settings
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Preset: bringing up an optional startup dependency such as the
    /// notification transport (3 attempts, delays 1s then 2s)
    pub fn startup_probe() -> Self {
        Self::new(3, Duration::from_secs(1)).with_max_delay(Duration::from_secs(4))
    }

    /// Delay before the given attempt (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::startup_probe()
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` is exhausted,
/// returning the last error in the latter case
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "{}: retry {}/{} after {:?}",
                operation_name,
                attempt + 1,
                config.max_attempts,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= config.max_attempts => {
                warn!(
                    "{}: all {} attempts failed, last error: {}",
                    operation_name, config.max_attempts, e
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "{}: attempt {}/{} failed ({})",
                    operation_name,
                    attempt + 1,
                    config.max_attempts,
                    e
                );
            }
        }
        attempt += 1;
    }
}
