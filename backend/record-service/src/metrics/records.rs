//! Record pipeline collectors, registered in a service-local registry

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{histogram_opts, opts, Histogram, IntCounterVec, Registry};

lazy_static! {
    /// Registry served on `/metrics`
    pub static ref REGISTRY: Registry = Registry::new();

    /// Record cache events (hit/miss/corrupt/error/write/invalidate).
    pub static ref RECORD_CACHE_EVENTS: IntCounterVec = register(
        IntCounterVec::new(
            opts!(
                "record_cache_events_total",
                "Record cache events segmented by outcome"
            ),
            &["event"],
        )
        .expect("failed to create record_cache_events_total"),
    );

    /// Record event publish results (success/failure) by event type.
    pub static ref RECORD_PUBLISH_TOTAL: IntCounterVec = register(
        IntCounterVec::new(
            opts!(
                "record_publish_total",
                "Record event publish results segmented by event type and outcome"
            ),
            &["event_type", "result"],
        )
        .expect("failed to create record_publish_total"),
    );

    /// Attempts spent per publish, the first send included.
    pub static ref RECORD_PUBLISH_ATTEMPTS: Histogram = register(
        Histogram::with_opts(histogram_opts!(
            "record_publish_attempts",
            "Send attempts spent on a single record event",
            vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0]
        ))
        .expect("failed to create record_publish_attempts"),
    );

    /// Swallowed best-effort failures by pipeline step.
    pub static ref RECORD_DEGRADATIONS_TOTAL: IntCounterVec = register(
        IntCounterVec::new(
            opts!(
                "record_degradations_total",
                "Non-fatal failures in the record pipeline segmented by step"
            ),
            &["step"],
        )
        .expect("failed to create record_degradations_total"),
    );

    /// Consumed record events by outcome, including drops from the main queue.
    pub static ref RECORD_EVENTS_CONSUMED: IntCounterVec = register(
        IntCounterVec::new(
            opts!(
                "record_events_consumed_total",
                "Record events read by the consumer group segmented by outcome"
            ),
            &["outcome"],
        )
        .expect("failed to create record_events_consumed_total"),
    );
}

fn register<C: Collector + Clone + 'static>(collector: C) -> C {
    REGISTRY
        .register(Box::new(collector.clone()))
        .expect("failed to register record-service collector");
    collector
}

/// Force registration so every family is listed before its first update
pub fn init() {
    lazy_static::initialize(&RECORD_CACHE_EVENTS);
    lazy_static::initialize(&RECORD_PUBLISH_TOTAL);
    lazy_static::initialize(&RECORD_PUBLISH_ATTEMPTS);
    lazy_static::initialize(&RECORD_DEGRADATIONS_TOTAL);
    lazy_static::initialize(&RECORD_EVENTS_CONSUMED);
}
