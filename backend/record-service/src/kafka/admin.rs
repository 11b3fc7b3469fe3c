use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication, TopicResult};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::info;

use super::KafkaError;

/// Outcome of provisioning; both variants are success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicProvisioning {
    Created,
    AlreadyExists,
}

/// Create `topic` with a fixed partition count and replication factor.
///
/// An existing topic is left untouched, whatever its partition count.
pub async fn ensure_topic(
    brokers: &str,
    topic: &str,
    partitions: i32,
    replication: i32,
    timeout: Duration,
) -> Result<TopicProvisioning, KafkaError> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .create()?;

    let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(replication));
    let options = AdminOptions::new().operation_timeout(Some(timeout));

    let results = admin.create_topics(&[new_topic], &options).await?;

    let outcome = results
        .into_iter()
        .map(|result| classify_topic_result(topic, result))
        .next()
        .unwrap_or(Ok(TopicProvisioning::AlreadyExists))?;

    info!(
        topic = %topic,
        partitions,
        replication,
        outcome = ?outcome,
        "Kafka topic provisioned"
    );

    Ok(outcome)
}

fn classify_topic_result(
    topic: &str,
    result: TopicResult,
) -> Result<TopicProvisioning, KafkaError> {
    match result {
        Ok(_) => Ok(TopicProvisioning::Created),
        Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => Ok(TopicProvisioning::AlreadyExists),
        Err((_, code)) => Err(KafkaError::Provisioning {
            topic: topic.to_string(),
            code,
        }),
    }
}
