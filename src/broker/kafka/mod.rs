#![forbid(unsafe_code)]

//! Kafka transport backed by librdkafka.
//!
//! Offsets are stored explicitly when a message is marked and committed in the
//! background by the client, so a message is only ever acknowledged after the
//! handler chain finished with it. Partitions revoked by a rebalance stop
//! their claims before the revoke completes and are no longer marked.

mod context;

pub use context::{KafkaClientContext, KafkaClientRole, KafkaConnectivityState};

use super::{
    ConsumerGroup, ConsumerGroupError, ConsumerGroupHandler, ConsumerGroupSession,
    ConsumerMessage, Delivery, Header, Message, ProduceError, ProducerMessage, SyncProducer,
};
use super::router::{Dispatch, Ownership, PartitionRouter, RouterEvent};
use crate::config::KafkaConfig;
use crate::error::{Context, Result};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message as _, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

const CLAIM_BUFFER: usize = 64;

/// Blocking producer for handlers running on worker threads.
pub struct KafkaProducer {
    producer: FutureProducer<KafkaClientContext>,
    runtime: Handle,
    send_timeout: Duration,
}

impl KafkaProducer {
    /// Must be called from within a tokio runtime; sends are driven on it.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let context = KafkaClientContext::new(
            format!("{}-producer", config.client_id),
            KafkaClientRole::Producer,
        );
        let producer: FutureProducer<KafkaClientContext> = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("client.id", config.client_id.as_str())
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .create_with_context(context)
            .with_context(|| {
                format!(
                    "failed to create Kafka producer (brokers={})",
                    config.brokers.join(",")
                )
            })?;

        Ok(Self {
            producer,
            runtime: Handle::try_current()
                .map_err(|err| crate::err!("Kafka producer needs a tokio runtime: {err}"))?,
            send_timeout: config.send_timeout(),
        })
    }
}

impl SyncProducer for KafkaProducer {
    fn send(&self, message: ProducerMessage) -> std::result::Result<Delivery, ProduceError> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for (key, value) in message.headers.iter() {
            headers = headers.insert(rdkafka::message::Header {
                key,
                value: Some(value.as_bytes()),
            });
        }

        let mut record = FutureRecord::<[u8], [u8]>::to(&message.topic)
            .payload(message.value.as_slice())
            .headers(headers);
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }

        self.runtime
            .block_on(self.producer.send(record, Timeout::After(self.send_timeout)))
            .map(|(partition, offset)| Delivery { partition, offset })
            .map_err(|(err, _)| ProduceError::Delivery {
                topic: message.topic.clone(),
                reason: err.to_string(),
            })
    }
}

struct KafkaSession {
    consumer: Arc<StreamConsumer<KafkaClientContext>>,
    member_id: String,
    ownership: Ownership,
    marks: Mutex<HashMap<(String, i32), i64>>,
}

impl ConsumerGroupSession for KafkaSession {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn mark_message(&self, message: &dyn Message) {
        if !self.ownership.owns(message.entrypoint(), message.partition()) {
            tracing::debug!(
                target: "orchestrate::kafka",
                event = "offset_mark_skipped",
                topic = %message.entrypoint(),
                partition = message.partition(),
                offset = message.offset(),
            );
            return;
        }
        let next = message.offset() + 1;
        {
            let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
            let key = (message.entrypoint().to_string(), message.partition());
            match marks.get(&key) {
                Some(current) if *current >= next => return,
                _ => {
                    marks.insert(key, next);
                }
            }
        }

        let mut offsets = TopicPartitionList::new();
        let stored = offsets
            .add_partition_offset(message.entrypoint(), message.partition(), Offset::Offset(next))
            .and_then(|()| self.consumer.store_offsets(&offsets));
        if let Err(err) = stored {
            tracing::error!(
                target: "orchestrate::kafka",
                event = "offset_store_failed",
                topic = %message.entrypoint(),
                partition = message.partition(),
                offset = message.offset(),
                error = %err,
            );
        }
    }
}

pub struct KafkaConsumerGroup {
    config: KafkaConfig,
}

impl KafkaConsumerGroup {
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn create_consumer(
        &self,
        topics: &[String],
        ownership: Ownership,
    ) -> Result<StreamConsumer<KafkaClientContext>> {
        let brokers = self.config.brokers.join(",");
        let context = KafkaClientContext::new(
            format!(
                "consumer[group={},topics={}]",
                self.config.group_id,
                topics.join(",")
            ),
            KafkaClientRole::Consumer,
        )
        .with_ownership(ownership);

        let consumer: StreamConsumer<KafkaClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers.as_str())
            .set("group.id", self.config.group_id.as_str())
            .set("client.id", self.config.client_id.as_str())
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set(
                "session.timeout.ms",
                self.config.session_timeout_ms.to_string(),
            )
            .create_with_context(context)
            .with_context(|| {
                format!(
                    "failed to create Kafka consumer (brokers={brokers}, group={})",
                    self.config.group_id
                )
            })?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .with_context(|| format!("failed to subscribe to topics {topics:?}"))?;
        Ok(consumer)
    }
}

fn owned_message(message: &BorrowedMessage<'_>) -> ConsumerMessage {
    let headers: Header = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| {
                    let value = header
                        .value
                        .map(|value| String::from_utf8_lossy(value).into_owned())
                        .unwrap_or_default();
                    (header.key.to_string(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    ConsumerMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp: message.timestamp().to_millis(),
        key: message.key().map(<[u8]>::to_vec).unwrap_or_default(),
        value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
    }
}

enum Step {
    Shutdown,
    Routed(RouterEvent),
    Received(std::result::Result<ConsumerMessage, KafkaError>),
}

#[async_trait]
impl ConsumerGroup for KafkaConsumerGroup {
    async fn consume(
        &self,
        topics: &[String],
        handler: Arc<dyn ConsumerGroupHandler>,
        shutdown: CancellationToken,
    ) -> std::result::Result<(), ConsumerGroupError> {
        let ownership = Ownership::default();
        let consumer = Arc::new(
            self.create_consumer(topics, ownership.clone())
                .map_err(|err| ConsumerGroupError::Broker(err.to_string()))?,
        );
        let connectivity = consumer.context().state().clone();
        let session: Arc<dyn ConsumerGroupSession> = Arc::new(KafkaSession {
            consumer: consumer.clone(),
            member_id: format!("{}-{}", self.config.client_id, uuid::Uuid::new_v4()),
            ownership: ownership.clone(),
            marks: Mutex::new(HashMap::new()),
        });
        handler.setup(&session)?;

        tracing::info!(
            target: "orchestrate::kafka",
            event = "consumer_group_joined",
            group = %self.config.group_id,
            member = %session.member_id(),
            topics = ?topics,
        );

        let mut router = PartitionRouter::new(
            handler.clone(),
            session.clone(),
            ownership,
            shutdown.child_token(),
            CLAIM_BUFFER,
        );

        let mut outcome = loop {
            let step = tokio::select! {
                _ = shutdown.cancelled() => Step::Shutdown,
                event = router.next_event() => Step::Routed(event),
                received = consumer.recv() => Step::Received(received.map(|message| owned_message(&message))),
            };

            let message = match step {
                Step::Shutdown => break Ok(()),
                Step::Routed(RouterEvent::Settled) => continue,
                Step::Routed(RouterEvent::Failed(err)) => break Err(err),
                Step::Routed(RouterEvent::Resume { topic, partition }) => {
                    set_paused(&consumer, &topic, partition, false);
                    continue;
                }
                Step::Received(Ok(message)) => message,
                Step::Received(Err(KafkaError::PartitionEOF(partition))) => {
                    tracing::debug!(
                        target: "orchestrate::kafka",
                        event = "partition_eof",
                        partition = partition,
                    );
                    continue;
                }
                Step::Received(Err(err)) => break Err(ConsumerGroupError::Broker(err.to_string())),
            };

            if connectivity.mark_connected() {
                tracing::info!(
                    target: "orchestrate::kafka",
                    event = "transport_reconnected",
                    group = %self.config.group_id,
                );
            }

            match router.dispatch(message) {
                Ok(Dispatch::Paused { topic, partition }) => {
                    set_paused(&consumer, &topic, partition, true);
                }
                Ok(Dispatch::Delivered | Dispatch::Held) => {}
                Err(err) => break Err(err),
            }
        };

        if let Err(err) = router.shutdown().await {
            if outcome.is_ok() {
                outcome = Err(err);
            }
        }

        if let Err(err) = consumer.commit_consumer_state(CommitMode::Sync) {
            tracing::warn!(
                target: "orchestrate::kafka",
                event = "offset_commit_failed",
                group = %self.config.group_id,
                error = %err,
            );
        }
        handler.cleanup(&session)?;

        tracing::info!(
            target: "orchestrate::kafka",
            event = "consumer_group_left",
            group = %self.config.group_id,
            member = %session.member_id(),
        );
        outcome
    }
}

fn set_paused(
    consumer: &StreamConsumer<KafkaClientContext>,
    topic: &str,
    partition: i32,
    paused: bool,
) {
    let mut partitions = TopicPartitionList::new();
    partitions.add_partition(topic, partition);
    let (applied, event) = if paused {
        (consumer.pause(&partitions), "partition_paused")
    } else {
        (consumer.resume(&partitions), "partition_resumed")
    };
    match applied {
        Ok(()) => tracing::debug!(
            target: "orchestrate::kafka",
            event = event,
            topic = %topic,
            partition = partition,
        ),
        Err(err) => tracing::warn!(
            target: "orchestrate::kafka",
            event = "partition_flow_control_failed",
            topic = %topic,
            partition = partition,
            paused = paused,
            error = %err,
        ),
    }
}
