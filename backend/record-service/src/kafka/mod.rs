//! Kafka integration for record events
//!
//! This module provides:
//! - The record event wire format (`events`)
//! - Topic provisioning through the admin API (`admin`)
//! - The keyed, acknowledged, retrying publisher (`producer`)
//! - The partition-per-worker consumer group (`consumer`)

use rdkafka::types::RDKafkaErrorCode;
use thiserror::Error;

pub mod admin;
pub mod consumer;
pub mod events;
pub mod producer;

pub use admin::{ensure_topic, TopicProvisioning};
pub use consumer::{
    AllPartitions, ConsumerGroupHandle, InboundMessage, PartitionAssignment, PartitionWorker,
    RecordEventConsumer, RecordEventHandler, RoundRobinShare, WorkerStats,
};
pub use events::{EventKind, RecordEvent};
pub use producer::{
    create_producer, EventPublisher, EventSink, KafkaEventSink, RecordEventPublisher,
};

/// Kafka integration error types
#[derive(Debug, Error)]
pub enum KafkaError {
    #[error("Kafka client error: {0}")]
    Client(#[from] rdkafka::error::KafkaError),

    #[error("Producer error: {0}")]
    ProducerError(String),

    #[error("Failed to provision topic {topic}: {code}")]
    Provisioning {
        topic: String,
        code: RDKafkaErrorCode,
    },

    #[error("Topic {topic} metadata unavailable: {code}")]
    Metadata {
        topic: String,
        code: RDKafkaErrorCode,
    },

    #[error("Topic {0} not found in cluster metadata")]
    TopicNotFound(String),

    #[error("No partition queue for partition {0}")]
    PartitionQueue(i32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed after {attempts} attempt(s): {message}")]
    PublishFailed { attempts: u32, message: String },

    #[error("Background task failed: {0}")]
    Join(String),
}
