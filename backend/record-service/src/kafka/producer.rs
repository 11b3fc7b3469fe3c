//! Record event publisher
//!
//! `RecordEventPublisher` owns serialization, keying and the retry policy.
//! The transport below it is an `EventSink`; in production that is a
//! `FutureProducer` configured for full acknowledgment.

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use resilience::{with_retry, RetryConfig};
use std::time::Duration;
use tracing::{debug, info};

use super::events::RecordEvent;
use super::KafkaError;
use crate::config::KafkaConfig;
use crate::metrics::records::{RECORD_PUBLISH_ATTEMPTS, RECORD_PUBLISH_TOTAL};

/// One acknowledged send to the broker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        event_type: &str,
        payload: &[u8],
    ) -> Result<(), KafkaError>;
}

/// Publishes record mutations; a returned error means every attempt failed
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &RecordEvent) -> Result<(), KafkaError>;
}

/// Create a producer that waits for all in-sync replicas
///
/// - `acks = all`: success only once every in-sync replica has the message
/// - `enable.idempotence = true`: broker-side dedup of librdkafka's own resends
/// - `message.timeout.ms`: upper bound for a single send
pub fn create_producer(config: &KafkaConfig) -> Result<FutureProducer, KafkaError> {
    let producer = ClientConfig::new()
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("message.timeout.ms", config.request_timeout_ms.to_string())
        .set("request.timeout.ms", config.request_timeout_ms.to_string())
        .set("enable.idempotence", "true")
        .set("acks", "all")
        .set("max.in.flight.requests.per.connection", "5")
        .set("compression.type", "lz4")
        .set("linger.ms", "5")
        .create::<FutureProducer>()
        .map_err(|e| KafkaError::ProducerError(e.to_string()))?;

    info!(
        brokers = %config.bootstrap_servers(),
        topic = %config.topic,
        "Kafka producer created with idempotency enabled"
    );

    Ok(producer)
}

/// `EventSink` over an rdkafka `FutureProducer`
#[derive(Clone)]
pub struct KafkaEventSink {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaEventSink {
    pub fn new(producer: FutureProducer, queue_timeout: Duration) -> Self {
        Self {
            producer,
            queue_timeout,
        }
    }
}

#[async_trait]
impl EventSink for KafkaEventSink {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        event_type: &str,
        payload: &[u8],
    ) -> Result<(), KafkaError> {
        let headers = OwnedHeaders::new().insert(Header {
            key: "event_type",
            value: Some(event_type),
        });
        let record = FutureRecord::to(topic)
            .payload(payload)
            .key(key)
            .headers(headers);

        let (partition, offset) = self
            .producer
            .send(record, self.queue_timeout)
            .await
            .map_err(|(err, _)| KafkaError::Client(err))?;

        debug!(topic, key, partition, offset, "Kafka delivery acknowledged");
        Ok(())
    }
}

pub struct RecordEventPublisher<S> {
    sink: S,
    topic: String,
    retry: RetryConfig,
}

impl<S: EventSink> RecordEventPublisher<S> {
    pub fn new(sink: S, topic: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            sink,
            topic: topic.into(),
            retry,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl<S: EventSink> EventPublisher for RecordEventPublisher<S> {
    async fn publish(&self, event: &RecordEvent) -> Result<(), KafkaError> {
        let payload = serde_json::to_vec(event)?;
        let key = event.partition_key();
        let event_type = event.event_type.header_value();

        let mut attempts = 0u32;
        let result = with_retry(&self.retry, || {
            attempts += 1;
            self.sink.send(&self.topic, &key, event_type, &payload)
        })
        .await;

        RECORD_PUBLISH_ATTEMPTS.observe(f64::from(attempts));

        match result {
            Ok(()) => {
                RECORD_PUBLISH_TOTAL
                    .with_label_values(&[event.event_type.as_str(), "success"])
                    .inc();
                debug!(
                    record_id = %event.id,
                    event_type,
                    attempts,
                    topic = %self.topic,
                    "Published record event"
                );
                Ok(())
            }
            Err(err) => {
                RECORD_PUBLISH_TOTAL
                    .with_label_values(&[event.event_type.as_str(), "failure"])
                    .inc();
                Err(KafkaError::PublishFailed {
                    attempts: err.attempts(),
                    message: err.into_last_error().to_string(),
                })
            }
        }
    }
}
