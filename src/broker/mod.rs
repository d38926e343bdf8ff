#![forbid(unsafe_code)]

//! Broker boundary of the pipeline.
//!
//! The engine only sees [`Message`], [`ConsumerGroupSession`] and [`SyncProducer`];
//! concrete transports (the in-process broker, Kafka) implement them.

pub mod daemon;
mod header;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod router;

pub use header::Header;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Inbound message as seen by the handler chain.
pub trait Message: Send + Sync {
    /// Topic the message was consumed from.
    fn entrypoint(&self) -> &str;
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    fn header(&self) -> &Header;
    fn header_mut(&mut self) -> &mut Header;
    fn partition(&self) -> i32;
    fn offset(&self) -> i64;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Option<i64>,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Header,
}

impl ConsumerMessage {
    pub fn new(topic: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_position(mut self, partition: i32, offset: i64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }
}

impl Message for ConsumerMessage {
    fn entrypoint(&self) -> &str {
        &self.topic
    }

    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn header(&self) -> &Header {
        &self.headers
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.headers
    }

    fn partition(&self) -> i32 {
        self.partition
    }

    fn offset(&self) -> i64 {
        self.offset
    }
}

/// Outbound record handed to a [`SyncProducer`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProducerMessage {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub headers: Header,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Error)]
pub enum ProduceError {
    #[error("failed to deliver message to `{topic}`: {reason}")]
    Delivery { topic: String, reason: String },
    #[error("producer is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConsumerGroupError {
    #[error("broker error: {0}")]
    Broker(String),
    #[error("partition worker for {topic}/{partition} failed: {reason}")]
    Worker {
        topic: String,
        partition: i32,
        reason: String,
    },
    #[error("consumer group is closed")]
    Closed,
}

/// Publishes a record and blocks until the broker acknowledged it.
pub trait SyncProducer: Send + Sync {
    fn send(&self, message: ProducerMessage) -> Result<Delivery, ProduceError>;
}

/// Membership of one consumer in its group for the lifetime of a `consume` call.
pub trait ConsumerGroupSession: Send + Sync {
    fn member_id(&self) -> &str;

    /// Marks `message` as processed. Marking an offset at or below the current
    /// mark for that partition leaves the mark untouched.
    fn mark_message(&self, message: &dyn Message);
}

/// Stream of messages for a single claimed partition.
pub struct Claim {
    topic: String,
    partition: i32,
    messages: mpsc::Receiver<ConsumerMessage>,
    shutdown: CancellationToken,
}

impl Claim {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        messages: mpsc::Receiver<ConsumerMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            messages,
            shutdown,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Blocks the worker thread until the next message arrives. Returns `None`
    /// once the claim is revoked or cancelled.
    pub fn next_message(&mut self) -> Option<ConsumerMessage> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        self.messages.blocking_recv()
    }
}

/// Per-partition processing callbacks, invoked on dedicated worker threads.
pub trait ConsumerGroupHandler: Send + Sync {
    fn setup(&self, _session: &Arc<dyn ConsumerGroupSession>) -> Result<(), ConsumerGroupError> {
        Ok(())
    }

    fn cleanup(&self, _session: &Arc<dyn ConsumerGroupSession>) -> Result<(), ConsumerGroupError> {
        Ok(())
    }

    fn consume_claim(
        &self,
        session: Arc<dyn ConsumerGroupSession>,
        claim: &mut Claim,
    ) -> Result<(), ConsumerGroupError>;
}

#[async_trait]
pub trait ConsumerGroup: Send + Sync {
    /// Joins the group on `topics` and drives `handler` until `shutdown` fires
    /// or the session ends.
    async fn consume(
        &self,
        topics: &[String],
        handler: Arc<dyn ConsumerGroupHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ConsumerGroupError>;
}
