/// Retry policy with exponential backoff, jitter and an optional deadline
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, the first call included
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
    /// Wall-clock budget across all attempts and sleeps. `None` bounds by count only.
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
            deadline: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: E },
    #[error("deadline of {deadline:?} reached after {attempts} attempt(s): {last_error}")]
    DeadlineExceeded {
        deadline: Duration,
        attempts: u32,
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::DeadlineExceeded { last_error, .. } => last_error,
        }
    }

    pub fn into_last_error(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::DeadlineExceeded { last_error, .. } => last_error,
        }
    }
}

/// Execute a future with retry logic.
///
/// An attempt already in flight is never interrupted; the deadline is checked
/// before each backoff sleep, so the worst case is one attempt past the budget.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = config.max_attempts.max(1);
    let started = Instant::now();
    let mut backoff = config.initial_backoff;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %err, "Max attempts reached");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last_error: err,
            });
        }

        let delay = calculate_backoff(backoff, config.jitter);

        if let Some(deadline) = config.deadline {
            if started.elapsed() + delay >= deadline {
                warn!(
                    attempts = attempt,
                    deadline_ms = deadline.as_millis() as u64,
                    error = %err,
                    "Retry deadline reached"
                );
                return Err(RetryError::DeadlineExceeded {
                    deadline,
                    attempts: attempt,
                    last_error: err,
                });
            }
        }

        warn!(
            "Retry attempt {}/{} failed ({}), waiting {:?}",
            attempt, max_attempts, err, delay
        );

        tokio::time::sleep(delay).await;

        backoff = Duration::from_millis(
            ((backoff.as_millis() as f64 * config.backoff_multiplier)
                .min(config.max_backoff.as_millis() as f64)) as u64,
        );
    }
}

fn calculate_backoff(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let jitter_factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}
