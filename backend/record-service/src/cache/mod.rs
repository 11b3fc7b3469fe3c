/// Record caching layer
///
/// Cache-aside storage for record snapshots. The cache is never
/// authoritative: every failure here is reported to the caller as a
/// `CacheError`, and the caller decides to fall back to the repository.
use thiserror::Error;

pub mod record_cache;

pub use record_cache::{
    decode_snapshot, record_key, CachedSnapshot, RecordCache, RedisRecordCache,
};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation timed out: {0}")]
    Timeout(#[from] resilience::TimeoutError),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
