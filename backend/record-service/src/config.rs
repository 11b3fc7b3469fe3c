/// Configuration management for Record Service
///
/// Values come from environment variables (after `dotenvy` has loaded an
/// optional `.env` file). Unset variables fall back to defaults; values that
/// are set but fail to parse are configuration errors.
use resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cache (Redis) configuration
    pub cache: CacheConfig,
    /// Kafka producer configuration
    pub kafka: KafkaConfig,
    /// Kafka consumer group configuration
    pub consumer: ConsumerConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL
    pub url: String,
    /// TTL applied to every record snapshot
    pub ttl_secs: u64,
    /// Upper bound for a single cache call
    pub op_timeout_ms: u64,
}

/// Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka brokers
    pub brokers: Vec<String>,
    /// Record events topic
    pub topic: String,
    #[serde(default = "default_kafka_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_kafka_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Total publish attempts, the first send included
    #[serde(default = "default_kafka_retry_attempts")]
    pub retry_attempts: u32,
    /// Wall-clock budget for one publish across retries; 0 disables it
    #[serde(default = "default_kafka_publish_deadline_ms")]
    pub publish_deadline_ms: u64,
}

/// Kafka consumer group configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub enabled: bool,
    pub group_id: String,
    /// Partition count used when the topic has to be created
    pub topic_partitions: i32,
    /// Replication factor used when the topic has to be created
    pub topic_replication: i32,
    /// This process's slot when partitions are shared across processes
    pub member_index: u32,
    /// Number of processes sharing the topic's partitions
    pub member_count: u32,
    pub metadata_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let consumer = ConsumerConfig {
            enabled: parse_env_or_default("KAFKA_CONSUMER_ENABLED", true)?,
            group_id: std::env::var("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|_| "record-service".to_string()),
            topic_partitions: parse_env_or_default("KAFKA_TOPIC_PARTITIONS", 1)?,
            topic_replication: parse_env_or_default("KAFKA_TOPIC_REPLICATION", 1)?,
            member_index: parse_env_or_default("KAFKA_CONSUMER_MEMBER_INDEX", 0)?,
            member_count: parse_env_or_default("KAFKA_CONSUMER_MEMBER_COUNT", 1)?,
            metadata_timeout_ms: parse_env_or_default("KAFKA_METADATA_TIMEOUT_MS", 10_000)?,
        };

        if consumer.topic_partitions < 1 {
            return Err("KAFKA_TOPIC_PARTITIONS must be >= 1".to_string());
        }
        if consumer.topic_replication < 1 {
            return Err("KAFKA_TOPIC_REPLICATION must be >= 1".to_string());
        }
        if consumer.member_count == 0 || consumer.member_index >= consumer.member_count {
            return Err(format!(
                "KAFKA_CONSUMER_MEMBER_INDEX ({}) must be below KAFKA_CONSUMER_MEMBER_COUNT ({})",
                consumer.member_index, consumer.member_count
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: app_env,
                host: std::env::var("RECORD_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("RECORD_SERVICE_PORT", 3000)?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/records".to_string()),
                max_connections: parse_env_or_default("DB_MAX_CONNECTIONS", 25)?,
                min_connections: parse_env_or_default("DB_MIN_CONNECTIONS", 5)?,
                acquire_timeout_secs: parse_env_or_default("DB_ACQUIRE_TIMEOUT_SECS", 10)?,
                max_lifetime_secs: parse_env_or_default("DB_MAX_LIFETIME_SECS", 900)?,
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                ttl_secs: parse_env_or_default("CACHE_TTL_SECS", 86_400)?,
                op_timeout_ms: parse_env_or_default("CACHE_OP_TIMEOUT_MS", 250)?,
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                topic: std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "records".to_string()),
                request_timeout_ms: parse_env_or_default(
                    "KAFKA_REQUEST_TIMEOUT_MS",
                    default_kafka_request_timeout_ms(),
                )?,
                retry_backoff_ms: parse_env_or_default(
                    "KAFKA_RETRY_BACKOFF_MS",
                    default_kafka_retry_backoff_ms(),
                )?,
                retry_attempts: parse_env_or_default(
                    "KAFKA_RETRY_ATTEMPTS",
                    default_kafka_retry_attempts(),
                )?,
                publish_deadline_ms: parse_env_or_default(
                    "KAFKA_PUBLISH_DEADLINE_MS",
                    default_kafka_publish_deadline_ms(),
                )?,
            },
            consumer,
        })
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl KafkaConfig {
    /// Brokers in librdkafka's `bootstrap.servers` form
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    /// Retry policy for a single publish
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            deadline: (self.publish_deadline_ms > 0)
                .then(|| Duration::from_millis(self.publish_deadline_ms)),
            ..Default::default()
        }
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

fn default_kafka_request_timeout_ms() -> u64 {
    5_000
}

fn default_kafka_retry_backoff_ms() -> u64 {
    100
}

fn default_kafka_retry_attempts() -> u32 {
    5
}

fn default_kafka_publish_deadline_ms() -> u64 {
    10_000
}
