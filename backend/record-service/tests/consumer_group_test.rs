//! Integration Tests: Record event consumer group against a broker
//!
//! Requires a reachable Kafka cluster in `KAFKA_BROKERS`; run with
//! `cargo test -- --ignored`.
//!
//! Coverage:
//! - A missing topic is provisioned with the configured partition count
//! - Every discovered partition gets its own worker
//! - Events published through the keyed publisher reach the handler
//! - The shutdown signal stops every worker and the main-queue driver

mod common;

use common::fakes::{RecordingHandler, RecordingObserver};
use record_service::config::{ConsumerConfig, KafkaConfig};
use record_service::kafka::{
    create_producer, EventKind, EventPublisher, KafkaEventSink, RecordEvent, RecordEventConsumer,
    RecordEventPublisher,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

const EVENT_COUNT: usize = 30;

fn kafka_config(topic: &str) -> KafkaConfig {
    KafkaConfig {
        brokers: common::test_kafka_brokers(),
        topic: topic.to_string(),
        request_timeout_ms: 5_000,
        retry_backoff_ms: 100,
        retry_attempts: 5,
        publish_deadline_ms: 10_000,
    }
}

fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        enabled: true,
        group_id: format!("record-service-test-{}", Uuid::new_v4()),
        topic_partitions: 3,
        topic_replication: 1,
        member_index: 0,
        member_count: 1,
        metadata_timeout_ms: 10_000,
    }
}

#[tokio::test]
#[ignore = "Requires Kafka broker"]
async fn test_group_consumes_every_partition_and_drains() {
    let topic = format!("records-test-{}", Uuid::new_v4());
    let kafka = kafka_config(&topic);

    let handler = Arc::new(RecordingHandler::default());
    let observer = Arc::new(RecordingObserver::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let group = RecordEventConsumer::new(
        &kafka,
        consumer_config(),
        handler.clone(),
        observer.clone(),
    )
    .start(shutdown_rx)
    .await
    .expect("consumer group should start");

    assert_eq!(group.partitions(), &[0, 1, 2]);

    // Offset::End resolves asynchronously after assign
    tokio::time::sleep(Duration::from_secs(3)).await;

    let producer = create_producer(&kafka).expect("producer should be created");
    let publisher = RecordEventPublisher::new(
        KafkaEventSink::new(producer, Duration::from_secs(5)),
        topic.clone(),
        kafka.retry_config(),
    );

    let mut published = HashSet::new();
    for _ in 0..EVENT_COUNT {
        let id = Uuid::new_v4();
        publisher
            .publish(&RecordEvent::deleted(id))
            .await
            .expect("publish should be acknowledged");
        published.insert(id);
    }

    let delivered = tokio::time::timeout(Duration::from_secs(30), async {
        while handler.handled().len() < EVENT_COUNT {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "events were not consumed in time");

    let handled = handler.handled();
    let received: HashSet<Uuid> = handled.iter().map(|event| event.id).collect();
    assert_eq!(received, published);
    assert!(handled.iter().all(|event| event.event_type == EventKind::Deleted));

    shutdown_tx.send(true).unwrap();

    let mut stopped = tokio::time::timeout(Duration::from_secs(10), group.join())
        .await
        .expect("consumer group should drain after shutdown");
    stopped.sort_by_key(|(partition, _)| *partition);

    let partitions: Vec<i32> = stopped.iter().map(|(partition, _)| *partition).collect();
    assert_eq!(partitions, vec![0, 1, 2]);

    let processed: u64 = stopped.iter().map(|(_, stats)| stats.processed).sum();
    assert_eq!(processed, EVENT_COUNT as u64);
    assert!(observer.degradations().is_empty());
}

#[tokio::test]
#[ignore = "Requires Kafka broker"]
async fn test_group_stops_when_signalled_before_any_traffic() {
    let topic = format!("records-test-{}", Uuid::new_v4());
    let kafka = kafka_config(&topic);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let group = RecordEventConsumer::new(
        &kafka,
        consumer_config(),
        Arc::new(RecordingHandler::default()),
        Arc::new(RecordingObserver::default()),
    )
    .start(shutdown_rx)
    .await
    .expect("consumer group should start");

    drop(shutdown_tx);

    let stopped = tokio::time::timeout(Duration::from_secs(10), group.join())
        .await
        .expect("dropping the signal should stop the group");
    assert_eq!(stopped.len(), 3);
    assert!(stopped.iter().all(|(_, stats)| stats.processed == 0));
}
