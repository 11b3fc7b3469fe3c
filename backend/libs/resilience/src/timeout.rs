/// Timeout wrapper for async operations
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Execute a future, failing with [`TimeoutError`] once `duration` has elapsed.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError(duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_timeout_success() {
        let value = assert_ok!(with_timeout(Duration::from_secs(1), async { 42 }).await);
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;

        let err = assert_err!(result);
        assert_eq!(err.0, Duration::from_millis(10));
        assert!(err.to_string().contains("timed out"));
    }
}
