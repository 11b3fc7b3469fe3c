use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use resilience::with_timeout;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::CacheResult;
use crate::metrics::records::RECORD_CACHE_EVENTS;
use crate::models::Record;

/// Key-value store for record snapshots
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Store a snapshot under the record's own id
    async fn set(&self, record: &Record, ttl: Duration) -> CacheResult<()>;

    /// `Ok(None)` is a miss
    async fn get(&self, id: Uuid) -> CacheResult<Option<Record>>;

    async fn delete(&self, id: Uuid) -> CacheResult<()>;
}

pub fn record_key(id: Uuid) -> String {
    format!("record:{}", id)
}

/// What a stored value turned out to be
#[derive(Debug)]
pub enum CachedSnapshot {
    Miss,
    Hit(Record),
    Corrupt(serde_json::Error),
}

pub fn decode_snapshot(data: Option<&str>) -> CachedSnapshot {
    match data {
        None => CachedSnapshot::Miss,
        Some(data) => match serde_json::from_str::<Record>(data) {
            Ok(record) => CachedSnapshot::Hit(record),
            Err(e) => CachedSnapshot::Corrupt(e),
        },
    }
}

/// Redis-backed record cache; every call is bounded by `op_timeout`
#[derive(Clone)]
pub struct RedisRecordCache {
    redis: ConnectionManager,
    op_timeout: Duration,
}

impl RedisRecordCache {
    pub fn new(redis: ConnectionManager, op_timeout: Duration) -> Self {
        Self { redis, op_timeout }
    }

    async fn drop_corrupt_entry(&self, key: &str) {
        let mut conn = self.redis.clone();
        match with_timeout(self.op_timeout, conn.del::<_, ()>(key)).await {
            Ok(Ok(())) => debug!(%key, "Removed corrupt record cache entry"),
            Ok(Err(e)) => debug!(%key, "Failed to remove corrupt cache entry: {}", e),
            Err(e) => debug!(%key, "Failed to remove corrupt cache entry: {}", e),
        }
    }
}

#[async_trait]
impl RecordCache for RedisRecordCache {
    async fn set(&self, record: &Record, ttl: Duration) -> CacheResult<()> {
        let key = record_key(record.id);
        let data = serde_json::to_string(record)?;

        let mut conn = self.redis.clone();
        let result = with_timeout(
            self.op_timeout,
            conn.set_ex::<_, _, ()>(&key, data, ttl.as_secs().max(1)),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                debug!(record_id = %record.id, "Record cache WRITE with TTL {:?}", ttl);
                RECORD_CACHE_EVENTS.with_label_values(&["write"]).inc();
                Ok(())
            }
            Ok(Err(e)) => {
                RECORD_CACHE_EVENTS.with_label_values(&["error"]).inc();
                Err(e.into())
            }
            Err(e) => {
                RECORD_CACHE_EVENTS.with_label_values(&["error"]).inc();
                Err(e.into())
            }
        }
    }

    async fn get(&self, id: Uuid) -> CacheResult<Option<Record>> {
        let key = record_key(id);
        let mut conn = self.redis.clone();

        let lookup = with_timeout(self.op_timeout, conn.get::<_, Option<String>>(&key)).await;
        let data = match lookup {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                RECORD_CACHE_EVENTS.with_label_values(&["error"]).inc();
                return Err(e.into());
            }
            Err(e) => {
                RECORD_CACHE_EVENTS.with_label_values(&["error"]).inc();
                return Err(e.into());
            }
        };

        match decode_snapshot(data.as_deref()) {
            CachedSnapshot::Miss => {
                debug!(record_id = %id, "Record cache MISS");
                RECORD_CACHE_EVENTS.with_label_values(&["miss"]).inc();
                Ok(None)
            }
            CachedSnapshot::Hit(record) => {
                debug!(record_id = %id, "Record cache HIT");
                RECORD_CACHE_EVENTS.with_label_values(&["hit"]).inc();
                Ok(Some(record))
            }
            CachedSnapshot::Corrupt(e) => {
                // Unreadable snapshots count as a miss; the next read repopulates
                warn!(record_id = %id, error = %e, "Corrupt record cache entry");
                RECORD_CACHE_EVENTS.with_label_values(&["corrupt"]).inc();
                self.drop_corrupt_entry(&key).await;
                Ok(None)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> CacheResult<()> {
        let key = record_key(id);
        let mut conn = self.redis.clone();

        match with_timeout(self.op_timeout, conn.del::<_, ()>(&key)).await {
            Ok(Ok(())) => {
                debug!(record_id = %id, "Record cache INVALIDATE");
                RECORD_CACHE_EVENTS.with_label_values(&["invalidate"]).inc();
                Ok(())
            }
            Ok(Err(e)) => {
                RECORD_CACHE_EVENTS.with_label_values(&["error"]).inc();
                Err(e.into())
            }
            Err(e) => {
                RECORD_CACHE_EVENTS.with_label_values(&["error"]).inc();
                Err(e.into())
            }
        }
    }
}
