//! Record event consumer group
//!
//! On start the group provisions the topic, reads the partition set once,
//! picks its share through a `PartitionAssignment`, and spawns one
//! `PartitionWorker` per assigned partition reading from the newest offset.
//! Every worker and the main-queue driver stop on the shared `watch` signal.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::admin::ensure_topic;
use super::events::{EventKind, RecordEvent};
use super::KafkaError;
use crate::config::{ConsumerConfig, KafkaConfig};
use crate::degradation::{Degradation, DegradationObserver};
use crate::metrics::records::RECORD_EVENTS_CONSUMED;

/// Processing callback for decoded record events
#[async_trait]
pub trait RecordEventHandler: Send + Sync {
    async fn handle(&self, event: RecordEvent) -> anyhow::Result<()>;
}

/// Chooses which of the discovered partitions this process consumes.
///
/// Evaluated once at startup; there is no rebalancing afterwards.
pub trait PartitionAssignment: Send + Sync + fmt::Debug {
    /// `discovered` is sorted ascending
    fn select(&self, discovered: &[i32]) -> Vec<i32>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllPartitions;

impl PartitionAssignment for AllPartitions {
    fn select(&self, discovered: &[i32]) -> Vec<i32> {
        discovered.to_vec()
    }
}

/// Takes partitions where `p % member_count == member_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobinShare {
    member_index: u32,
    member_count: u32,
}

impl RoundRobinShare {
    pub fn new(member_index: u32, member_count: u32) -> Option<Self> {
        (member_count > 0 && member_index < member_count).then_some(Self {
            member_index,
            member_count,
        })
    }
}

impl PartitionAssignment for RoundRobinShare {
    fn select(&self, discovered: &[i32]) -> Vec<i32> {
        discovered
            .iter()
            .copied()
            .filter(|p| {
                u32::try_from(*p)
                    .map(|p| p % self.member_count == self.member_index)
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Strategy implied by the member settings
pub fn assignment_for(config: &ConsumerConfig) -> Arc<dyn PartitionAssignment> {
    match RoundRobinShare::new(config.member_index, config.member_count) {
        Some(share) if config.member_count > 1 => Arc::new(share),
        _ => Arc::new(AllPartitions),
    }
}

/// Owned copy of the parts of a Kafka message a worker needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub partition: i32,
    pub offset: i64,
    pub event_type: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl InboundMessage {
    pub fn from_kafka<M: Message>(message: &M) -> Self {
        Self {
            partition: message.partition(),
            offset: message.offset(),
            event_type: header_value(message, "event_type").map(str::to_string),
            payload: message.payload().map(<[u8]>::to_vec),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub failed: u64,
    pub malformed: u64,
    pub skipped: u64,
}

/// Reads one partition until cancelled
pub struct PartitionWorker {
    partition: i32,
    handler: Arc<dyn RecordEventHandler>,
    observer: Arc<dyn DegradationObserver>,
}

impl PartitionWorker {
    pub fn new(
        partition: i32,
        handler: Arc<dyn RecordEventHandler>,
        observer: Arc<dyn DegradationObserver>,
    ) -> Self {
        Self {
            partition,
            handler,
            observer,
        }
    }

    /// Drive `messages` until shutdown is signalled, the signal's sender is
    /// dropped, or the stream ends. A message already being handled is
    /// finished first.
    pub async fn run<S>(self, messages: S, mut shutdown: watch::Receiver<bool>) -> WorkerStats
    where
        S: Stream<Item = Result<InboundMessage, KafkaError>>,
    {
        tokio::pin!(messages);

        let partition = self.partition;
        let mut stats = WorkerStats::default();

        if *shutdown.borrow() {
            return stats;
        }

        info!(partition, "Partition worker started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(partition, "Shutdown signal received, stopping partition worker");
                        break;
                    }
                }

                message = messages.next() => {
                    match message {
                        Some(Ok(message)) => self.process(message, &mut stats).await,
                        Some(Err(e)) => {
                            error!(partition, error = %e, "Kafka consumer error");
                        }
                        None => {
                            warn!(partition, "Partition stream ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            partition,
            processed = stats.processed,
            failed = stats.failed,
            malformed = stats.malformed,
            skipped = stats.skipped,
            "Partition worker stopped"
        );

        stats
    }

    async fn process(&self, message: InboundMessage, stats: &mut WorkerStats) {
        let InboundMessage {
            partition,
            offset,
            event_type,
            payload,
        } = message;

        let Some(payload) = payload else {
            debug!(partition, offset, "Empty message payload, skipping");
            RECORD_EVENTS_CONSUMED.with_label_values(&["empty"]).inc();
            stats.skipped += 1;
            return;
        };

        if let Some(event_type) = event_type.as_deref() {
            if EventKind::from_header(event_type).is_none() {
                debug!(partition, offset, event_type, "Ignoring non-record event");
                RECORD_EVENTS_CONSUMED.with_label_values(&["ignored"]).inc();
                stats.skipped += 1;
                return;
            }
        }

        let event: RecordEvent = match serde_json::from_slice(&payload) {
            Ok(event) => event,
            Err(e) => {
                RECORD_EVENTS_CONSUMED
                    .with_label_values(&["malformed"])
                    .inc();
                stats.malformed += 1;
                self.observer.degraded(Degradation::MalformedEvent {
                    partition,
                    offset,
                    error: e.to_string(),
                });
                return;
            }
        };

        let record_id = event.id;
        let kind = event.event_type;

        match self.handler.handle(event).await {
            Ok(()) => {
                debug!(
                    partition,
                    offset,
                    %record_id,
                    event_type = kind.as_str(),
                    "Record event processed"
                );
                RECORD_EVENTS_CONSUMED
                    .with_label_values(&["processed"])
                    .inc();
                stats.processed += 1;
            }
            Err(e) => {
                error!(
                    partition,
                    offset,
                    %record_id,
                    event_type = kind.as_str(),
                    error = %e,
                    "Record event handler failed"
                );
                RECORD_EVENTS_CONSUMED.with_label_values(&["failed"]).inc();
                stats.failed += 1;
            }
        }
    }
}

/// Builds and starts the consumer group
pub struct RecordEventConsumer {
    brokers: String,
    topic: String,
    settings: ConsumerConfig,
    handler: Arc<dyn RecordEventHandler>,
    observer: Arc<dyn DegradationObserver>,
    assignment: Arc<dyn PartitionAssignment>,
}

impl RecordEventConsumer {
    pub fn new(
        kafka: &KafkaConfig,
        settings: ConsumerConfig,
        handler: Arc<dyn RecordEventHandler>,
        observer: Arc<dyn DegradationObserver>,
    ) -> Self {
        let assignment = assignment_for(&settings);

        Self {
            brokers: kafka.bootstrap_servers(),
            topic: kafka.topic.clone(),
            settings,
            handler,
            observer,
            assignment,
        }
    }

    pub fn with_assignment(mut self, assignment: Arc<dyn PartitionAssignment>) -> Self {
        self.assignment = assignment;
        self
    }

    /// Provision, assign and spawn. Fails only before any worker is running.
    pub async fn start(
        self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ConsumerGroupHandle, KafkaError> {
        let metadata_timeout = Duration::from_millis(self.settings.metadata_timeout_ms);

        ensure_topic(
            &self.brokers,
            &self.topic,
            self.settings.topic_partitions,
            self.settings.topic_replication,
            metadata_timeout,
        )
        .await?;

        let consumer: Arc<StreamConsumer> = Arc::new(
            ClientConfig::new()
                .set("bootstrap.servers", &self.brokers)
                .set("group.id", &self.settings.group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", "latest")
                .set("enable.partition.eof", "false")
                .set("session.timeout.ms", "45000")
                .create()?,
        );

        let discovered =
            discover_partitions(consumer.clone(), self.topic.clone(), metadata_timeout).await?;
        let assigned = self.assignment.select(&discovered);

        if assigned.is_empty() {
            warn!(
                topic = %self.topic,
                discovered = ?discovered,
                assignment = ?self.assignment,
                "No partitions assigned to this member"
            );
        }

        let mut tpl = TopicPartitionList::new();
        for &partition in &assigned {
            tpl.add_partition_offset(&self.topic, partition, Offset::End)?;
        }
        consumer.assign(&tpl)?;

        let mut workers = JoinSet::new();
        for &partition in &assigned {
            let queue = consumer
                .split_partition_queue(&self.topic, partition)
                .ok_or(KafkaError::PartitionQueue(partition))?;
            let worker =
                PartitionWorker::new(partition, self.handler.clone(), self.observer.clone());
            let shutdown = shutdown.clone();

            workers.spawn(async move {
                let messages = queue.stream().map(|message| {
                    message
                        .map(|m| InboundMessage::from_kafka(&m))
                        .map_err(KafkaError::from)
                });
                let stats = worker.run(messages, shutdown).await;
                (partition, stats)
            });
        }

        let driver = tokio::spawn(drive_main_queue(consumer.clone(), shutdown));

        info!(
            topic = %self.topic,
            group_id = %self.settings.group_id,
            partitions = ?assigned,
            "Record event consumer group started"
        );

        Ok(ConsumerGroupHandle {
            consumer,
            partitions: assigned,
            workers,
            driver,
        })
    }
}

/// Running consumer group
pub struct ConsumerGroupHandle {
    consumer: Arc<StreamConsumer>,
    partitions: Vec<i32>,
    workers: JoinSet<(i32, WorkerStats)>,
    driver: JoinHandle<()>,
}

impl ConsumerGroupHandle {
    pub fn partitions(&self) -> &[i32] {
        &self.partitions
    }

    /// Wait for every worker and the queue driver, then release the assignment.
    ///
    /// Returns once the shutdown signal has been sent (or its sender dropped).
    pub async fn join(mut self) -> Vec<(i32, WorkerStats)> {
        let mut finished = Vec::with_capacity(self.partitions.len());

        while let Some(result) = self.workers.join_next().await {
            match result {
                Ok(outcome) => finished.push(outcome),
                Err(e) => error!(error = %e, "Partition worker task failed"),
            }
        }

        if let Err(e) = self.driver.await {
            error!(error = %e, "Consumer queue driver failed");
        }

        if let Err(e) = self.consumer.unassign() {
            warn!(error = %e, "Failed to release partition assignment");
        }

        info!(workers = finished.len(), "Record event consumer group stopped");
        finished
    }
}

/// Poll the consumer's main queue so client errors and stray messages are
/// serviced while the partition queues are split off.
async fn drive_main_queue(consumer: Arc<StreamConsumer>, mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            message = consumer.recv() => {
                match message {
                    Ok(m) => note_stray_message(m.partition(), m.offset()),
                    Err(e) => warn!(error = %e, "Kafka consumer error"),
                }
            }
        }
    }

    debug!("Consumer main queue driver stopped");
}

/// Messages on the main queue never reach a worker
fn note_stray_message(partition: i32, offset: i64) {
    warn!(partition, offset, "Message delivered on main consumer queue, dropping");
    RECORD_EVENTS_CONSUMED
        .with_label_values(&["main_queue"])
        .inc();
}

async fn discover_partitions(
    consumer: Arc<StreamConsumer>,
    topic: String,
    timeout: Duration,
) -> Result<Vec<i32>, KafkaError> {
    tokio::task::spawn_blocking(move || {
        let metadata = consumer.fetch_metadata(Some(&topic), timeout)?;

        let topic_metadata = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| KafkaError::TopicNotFound(topic.clone()))?;

        if let Some(err) = topic_metadata.error() {
            return Err(KafkaError::Metadata {
                topic: topic.clone(),
                code: err.into(),
            });
        }

        let mut partitions: Vec<i32> = topic_metadata
            .partitions()
            .iter()
            .map(|p| p.id())
            .collect();
        partitions.sort_unstable();

        if partitions.is_empty() {
            return Err(KafkaError::TopicNotFound(topic));
        }

        Ok(partitions)
    })
    .await
    .map_err(|e| KafkaError::Join(e.to_string()))?
}

fn header_value<'a, M: Message>(message: &'a M, key: &str) -> Option<&'a str> {
    message
        .headers()
        .and_then(|headers| {
            headers
                .iter()
                .find(|header| header.key == key)
                .and_then(|header| header.value)
        })
        .and_then(|value| std::str::from_utf8(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_partitions_takes_everything() {
        assert_eq!(AllPartitions.select(&[0, 1, 2]), vec![0, 1, 2]);
    }

    #[test]
    fn test_round_robin_share_splits_by_modulo() {
        let partitions = [0, 1, 2, 3, 4, 5, 6];

        let first = RoundRobinShare::new(0, 3).unwrap();
        let second = RoundRobinShare::new(1, 3).unwrap();
        let third = RoundRobinShare::new(2, 3).unwrap();

        assert_eq!(first.select(&partitions), vec![0, 3, 6]);
        assert_eq!(second.select(&partitions), vec![1, 4]);
        assert_eq!(third.select(&partitions), vec![2, 5]);
    }

    #[test]
    fn test_round_robin_share_rejects_bad_slots() {
        assert!(RoundRobinShare::new(0, 0).is_none());
        assert!(RoundRobinShare::new(3, 3).is_none());
    }

    #[test]
    fn test_stray_main_queue_message_is_counted() {
        let counter = RECORD_EVENTS_CONSUMED.with_label_values(&["main_queue"]);
        let before = counter.get();

        note_stray_message(2, 41);

        assert!(counter.get() > before);
    }

    #[test]
    fn test_single_member_gets_all_partitions() {
        let config = ConsumerConfig {
            enabled: true,
            group_id: "record-service".to_string(),
            topic_partitions: 4,
            topic_replication: 1,
            member_index: 0,
            member_count: 1,
            metadata_timeout_ms: 1_000,
        };

        assert_eq!(assignment_for(&config).select(&[0, 1, 2, 3]), vec![0, 1, 2, 3]);

        let shared = ConsumerConfig {
            member_index: 1,
            member_count: 2,
            ..config
        };
        assert_eq!(assignment_for(&shared).select(&[0, 1, 2, 3]), vec![1, 3]);
    }
}
