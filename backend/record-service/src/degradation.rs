/// Non-fatal failure channel
///
/// Cache and publish failures never change the outcome of a record
/// operation, and malformed events never stop a partition worker. Each such
/// failure is reported here exactly once per failed step.
use tracing::warn;
use uuid::Uuid;

use crate::kafka::events::EventKind;
use crate::metrics::records::RECORD_DEGRADATIONS_TOTAL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    CacheRead { record_id: Uuid, error: String },
    CacheWrite { record_id: Uuid, error: String },
    CacheInvalidate { record_id: Uuid, error: String },
    Publish {
        record_id: Uuid,
        kind: EventKind,
        attempts: u32,
        error: String,
    },
    MalformedEvent {
        partition: i32,
        offset: i64,
        error: String,
    },
}

impl Degradation {
    /// Stable label for the step that failed
    pub fn step(&self) -> &'static str {
        match self {
            Degradation::CacheRead { .. } => "cache_read",
            Degradation::CacheWrite { .. } => "cache_write",
            Degradation::CacheInvalidate { .. } => "cache_invalidate",
            Degradation::Publish { .. } => "publish",
            Degradation::MalformedEvent { .. } => "malformed_event",
        }
    }
}

pub trait DegradationObserver: Send + Sync {
    fn degraded(&self, degradation: Degradation);
}

/// Logs through `tracing` and counts per step
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DegradationObserver for TracingObserver {
    fn degraded(&self, degradation: Degradation) {
        RECORD_DEGRADATIONS_TOTAL
            .with_label_values(&[degradation.step()])
            .inc();

        match degradation {
            Degradation::CacheRead { record_id, error } => {
                warn!(%record_id, %error, "Cache read failed, falling back to repository");
            }
            Degradation::CacheWrite { record_id, error } => {
                warn!(%record_id, %error, "Cache write failed");
            }
            Degradation::CacheInvalidate { record_id, error } => {
                warn!(%record_id, %error, "Cache invalidation failed, entry expires by TTL");
            }
            Degradation::Publish {
                record_id,
                kind,
                attempts,
                error,
            } => {
                warn!(
                    %record_id,
                    event_type = kind.as_str(),
                    attempts,
                    %error,
                    "Record event not published"
                );
            }
            Degradation::MalformedEvent {
                partition,
                offset,
                error,
            } => {
                warn!(partition, offset, %error, "Skipping malformed record event");
            }
        }
    }
}
