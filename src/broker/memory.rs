#![forbid(unsafe_code)]

//! In-process broker with partitioned topic logs and per-group committed offsets.
//!
//! Consuming claims every partition of the requested topics and runs one
//! blocking worker per partition, the same way a broker consumer group fans
//! out. Unmarked messages are redelivered on the next `consume`.

use super::{
    Claim, ConsumerGroup, ConsumerGroupError, ConsumerGroupHandler, ConsumerGroupSession,
    ConsumerMessage, Delivery, Message, ProduceError, ProducerMessage, SyncProducer,
};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const CLAIM_BUFFER: usize = 16;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type Partitions = Vec<Vec<ConsumerMessage>>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CommitKey {
    group: String,
    topic: String,
    partition: i32,
}

struct MemoryState {
    partitions: usize,
    logs: Mutex<HashMap<String, Partitions>>,
    committed: Mutex<HashMap<CommitKey, i64>>,
    produced: Notify,
    round_robin: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryState {
    fn partition_for(&self, key: Option<&[u8]>) -> usize {
        match key {
            Some(key) if !key.is_empty() => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % self.partitions as u64) as usize
            }
            _ => self.round_robin.fetch_add(1, Ordering::Relaxed) % self.partitions,
        }
    }

    fn append(&self, message: ProducerMessage) -> Delivery {
        let partition = self.partition_for(message.key.as_deref());
        let delivery = {
            let mut logs = lock(&self.logs);
            let topic = logs
                .entry(message.topic.clone())
                .or_insert_with(|| vec![Vec::new(); self.partitions]);
            let log = &mut topic[partition];
            let offset = log.len() as i64;
            log.push(ConsumerMessage {
                topic: message.topic,
                partition: partition as i32,
                offset,
                timestamp: Some(chrono::Utc::now().timestamp_millis()),
                key: message.key.unwrap_or_default(),
                value: message.value,
                headers: message.headers,
            });
            Delivery {
                partition: partition as i32,
                offset,
            }
        };
        self.produced.notify_waiters();
        delivery
    }

    fn read_from(&self, topic: &str, partition: i32, from: i64) -> Vec<ConsumerMessage> {
        let logs = lock(&self.logs);
        logs.get(topic)
            .and_then(|partitions| partitions.get(partition as usize))
            .map(|log| log.iter().skip(from.max(0) as usize).cloned().collect())
            .unwrap_or_default()
    }

    fn committed(&self, key: &CommitKey) -> Option<i64> {
        lock(&self.committed).get(key).copied()
    }

    fn commit(&self, key: CommitKey, next_offset: i64) -> bool {
        let mut committed = lock(&self.committed);
        match committed.get(&key) {
            Some(current) if *current >= next_offset => false,
            _ => {
                committed.insert(key, next_offset);
                true
            }
        }
    }
}

#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<MemoryState>,
}

impl MemoryBroker {
    pub fn new(partitions: usize) -> Self {
        Self {
            state: Arc::new(MemoryState {
                partitions: partitions.max(1),
                logs: Mutex::new(HashMap::new()),
                committed: Mutex::new(HashMap::new()),
                produced: Notify::new(),
                round_robin: AtomicUsize::new(0),
            }),
        }
    }

    pub fn partitions(&self) -> usize {
        self.state.partitions
    }

    /// Every message of `topic`, ordered by partition then offset.
    pub fn messages(&self, topic: &str) -> Vec<ConsumerMessage> {
        lock(&self.state.logs)
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Next offset the group will consume on this partition, if it ever marked one.
    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        self.state.committed(&CommitKey {
            group: group.to_string(),
            topic: topic.to_string(),
            partition,
        })
    }

    pub fn consumer_group(&self, group: impl Into<String>) -> MemoryConsumerGroup {
        MemoryConsumerGroup {
            state: self.state.clone(),
            group: group.into(),
            generation: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Standalone session, for driving the engine by hand.
    pub fn session(&self, group: impl Into<String>) -> Arc<dyn ConsumerGroupSession> {
        let group = group.into();
        Arc::new(MemorySession {
            state: self.state.clone(),
            member_id: format!("{group}-manual"),
            group,
        })
    }
}

impl SyncProducer for MemoryBroker {
    fn send(&self, message: ProducerMessage) -> Result<Delivery, ProduceError> {
        Ok(self.state.append(message))
    }
}

struct MemorySession {
    state: Arc<MemoryState>,
    group: String,
    member_id: String,
}

impl ConsumerGroupSession for MemorySession {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn mark_message(&self, message: &dyn Message) {
        let key = CommitKey {
            group: self.group.clone(),
            topic: message.entrypoint().to_string(),
            partition: message.partition(),
        };
        if !self.state.commit(key, message.offset() + 1) {
            tracing::debug!(
                target: "orchestrate::broker",
                event = "stale_offset_ignored",
                group = %self.group,
                topic = %message.entrypoint(),
                partition = message.partition(),
                offset = message.offset(),
            );
        }
    }
}

pub struct MemoryConsumerGroup {
    state: Arc<MemoryState>,
    group: String,
    generation: Arc<AtomicUsize>,
}

#[async_trait]
impl ConsumerGroup for MemoryConsumerGroup {
    async fn consume(
        &self,
        topics: &[String],
        handler: Arc<dyn ConsumerGroupHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ConsumerGroupError> {
        if topics.is_empty() {
            return Err(ConsumerGroupError::Broker("no topics to consume".to_string()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let session: Arc<dyn ConsumerGroupSession> = Arc::new(MemorySession {
            state: self.state.clone(),
            group: self.group.clone(),
            member_id: format!("{}-{generation}", self.group),
        });
        handler.setup(&session)?;

        let claims_shutdown = shutdown.child_token();
        let mut feeders = JoinSet::new();
        let mut workers = JoinSet::new();

        for topic in topics {
            for partition in 0..self.state.partitions as i32 {
                let (tx, rx) = mpsc::channel(CLAIM_BUFFER);
                let key = CommitKey {
                    group: self.group.clone(),
                    topic: topic.clone(),
                    partition,
                };
                feeders.spawn(feed_partition(
                    self.state.clone(),
                    key,
                    tx,
                    claims_shutdown.clone(),
                ));

                let handler = handler.clone();
                let session = session.clone();
                let mut claim = Claim::new(topic.clone(), partition, rx, claims_shutdown.clone());
                let topic = topic.clone();
                workers.spawn_blocking(move || {
                    let outcome = handler.consume_claim(session, &mut claim);
                    (topic, partition, outcome)
                });
            }
        }

        tracing::info!(
            target: "orchestrate::broker",
            event = "consumer_group_joined",
            group = %self.group,
            member = %session.member_id(),
            claims = workers.len(),
        );

        let mut first_exit = None;
        tokio::select! {
            _ = shutdown.cancelled() => {}
            Some(exit) = workers.join_next() => first_exit = Some(exit),
        }
        claims_shutdown.cancel();
        while feeders.join_next().await.is_some() {}

        let mut outcome = Ok(());
        let mut exits = Vec::new();
        exits.extend(first_exit);
        while let Some(exit) = workers.join_next().await {
            exits.push(exit);
        }
        for exit in exits {
            match exit {
                Ok((_, _, Ok(()))) => {}
                Ok((_, _, Err(err))) => outcome = Err(err),
                Err(err) => {
                    outcome = Err(ConsumerGroupError::Broker(format!(
                        "partition worker panicked: {err}"
                    )))
                }
            }
        }

        handler.cleanup(&session)?;
        tracing::info!(
            target: "orchestrate::broker",
            event = "consumer_group_left",
            group = %self.group,
            member = %session.member_id(),
        );
        outcome
    }
}

async fn feed_partition(
    state: Arc<MemoryState>,
    key: CommitKey,
    tx: mpsc::Sender<ConsumerMessage>,
    shutdown: CancellationToken,
) {
    let mut next = state.committed(&key).unwrap_or(0);
    loop {
        let produced = state.produced.notified();
        let pending = state.read_from(&key.topic, key.partition, next);
        if pending.is_empty() {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = produced => continue,
                _ = tokio::time::sleep(POLL_INTERVAL) => continue,
            }
        }

        for message in pending {
            next = message.offset + 1;
            tokio::select! {
                _ = shutdown.cancelled() => return,
                sent = tx.send(message) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
