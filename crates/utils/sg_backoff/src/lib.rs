//! A small exponential-backoff helper used by the chunk reader to retry transient object-storage
//! fetches (`spec.md` §4.2, "a transient fetch error is retried inside the reader according to a
//! bounded exponential policy").

use std::time::Duration;

use rand::Rng as _;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// Tracks retry state for a single logical operation.
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of attempts made so far (0 before the first call to [`Self::next_delay`]).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns `true` if another attempt is still allowed under `max_attempts`.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.config.max_attempts
    }

    /// Computes the delay before the next attempt and advances the internal counter.
    ///
    /// Returns `None` once `max_attempts` has been exhausted -- callers should treat that as a
    /// terminal failure (`spec.md` §7, "a terminal error aborts the batch").
    fn next_delay(&mut self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }

        let exp = self.config.base_delay.saturating_mul(1 << self.attempt.min(20));
        let capped = exp.min(self.config.max_delay);
        // Full jitter: uniformly distributed between zero and the capped exponential delay.
        let jittered = rand::rng().random_range(Duration::ZERO..=capped);

        self.attempt += 1;
        Some(jittered)
    }

    /// Sleeps for the next backoff delay. Returns `false` if retries are exhausted (in which
    /// case no sleep happened and the caller should give up).
    pub async fn wait(&mut self) -> bool {
        match self.next_delay() {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                true
            }
            None => false,
        }
    }
}

/// Retries `op` until it succeeds or the backoff policy is exhausted, returning the last error on
/// exhaustion. `is_transient` classifies errors: a non-transient error aborts immediately without
/// consuming a retry, matching `spec.md`'s distinction between transient and terminal fetch
/// errors.
pub async fn retry<T, E, F, Fut>(config: BackoffConfig, mut is_transient: impl FnMut(&E) -> bool, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut backoff = Backoff::new(config);
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && backoff.wait().await => continue,
            Err(err) => return Err(err),
        }
    }
}
