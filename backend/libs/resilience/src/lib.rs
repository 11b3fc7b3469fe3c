/// Resilience helpers shared by Nova services
///
/// - **Retry**: bounded attempts with exponential backoff, jitter and an optional
///   wall-clock deadline. The last underlying error is always handed back.
/// - **Timeout**: bounds a single async call.
///
/// # Example: Kafka publish with an attempt ceiling
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig {
///         max_attempts: 5,
///         deadline: Some(Duration::from_secs(10)),
///         ..Default::default()
///     };
///
///     let result = with_retry(&config, || async {
///         // Your broker send here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod retry;
pub mod timeout;

pub use retry::{with_retry, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};
