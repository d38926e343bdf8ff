#![forbid(unsafe_code)]

//! Fans one consumer stream out to a claim per partition.
//!
//! A partition whose claim is full is reported as paused and its messages are
//! held back in arrival order, so a slow partition never stalls the others.
//! Revoking a partition through [`Ownership`] stops its claim and drops what
//! was still held back for it.

use super::{Claim, ConsumerGroupError, ConsumerGroupHandler, ConsumerGroupSession, ConsumerMessage};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

type PartitionKey = (String, i32);
type WorkerExit = (String, i32, Result<(), ConsumerGroupError>);
type CapacityReady = (PartitionKey, Result<OwnedPermit<ConsumerMessage>, SendError<()>>);

/// Partitions currently claimed by this member, shared with the rebalance callback.
#[derive(Clone, Debug, Default)]
pub struct Ownership {
    inner: Arc<OwnershipInner>,
}

#[derive(Debug, Default)]
struct OwnershipInner {
    claims: Mutex<HashMap<PartitionKey, CancellationToken>>,
    revoked: Notify,
}

impl Ownership {
    pub fn owns(&self, topic: &str, partition: i32) -> bool {
        self.claims().contains_key(&(topic.to_string(), partition))
    }

    /// Cancels the claim on `topic`/`partition`. Returns false when it was not claimed.
    pub fn revoke(&self, topic: &str, partition: i32) -> bool {
        let Some(token) = self.claims().remove(&(topic.to_string(), partition)) else {
            return false;
        };
        token.cancel();
        self.inner.revoked.notify_one();
        true
    }

    fn claim(&self, key: PartitionKey, token: CancellationToken) {
        self.claims().insert(key, token);
    }

    fn claims(&self) -> MutexGuard<'_, HashMap<PartitionKey, CancellationToken>> {
        self.inner
            .claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the partition's claim.
    Delivered,
    /// Queued behind earlier messages of an already paused partition.
    Held,
    /// The claim is full; the partition should stop fetching until resumed.
    Paused { topic: String, partition: i32 },
}

#[derive(Debug)]
pub enum RouterEvent {
    /// Everything held back for the partition reached its claim.
    Resume { topic: String, partition: i32 },
    Failed(ConsumerGroupError),
    Settled,
}

struct Route {
    sender: mpsc::Sender<ConsumerMessage>,
    backlog: VecDeque<ConsumerMessage>,
    token: CancellationToken,
    waiter: Option<AbortHandle>,
}

pub struct PartitionRouter {
    handler: Arc<dyn ConsumerGroupHandler>,
    session: Arc<dyn ConsumerGroupSession>,
    ownership: Ownership,
    shutdown: CancellationToken,
    capacity: usize,
    routes: HashMap<PartitionKey, Route>,
    workers: JoinSet<WorkerExit>,
    waiters: JoinSet<CapacityReady>,
}

impl PartitionRouter {
    /// Claims run on blocking worker threads of the current tokio runtime.
    pub fn new(
        handler: Arc<dyn ConsumerGroupHandler>,
        session: Arc<dyn ConsumerGroupSession>,
        ownership: Ownership,
        shutdown: CancellationToken,
        capacity: usize,
    ) -> Self {
        Self {
            handler,
            session,
            ownership,
            shutdown,
            capacity: capacity.max(1),
            routes: HashMap::new(),
            workers: JoinSet::new(),
            waiters: JoinSet::new(),
        }
    }

    /// Number of partitions with a live claim.
    pub fn claimed(&self) -> usize {
        self.routes.len()
    }

    pub fn dispatch(&mut self, message: ConsumerMessage) -> Result<Dispatch, ConsumerGroupError> {
        self.sweep_revoked();

        let route = match self.routes.entry((message.topic.clone(), message.partition)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (sender, receiver) = mpsc::channel(self.capacity);
                let token = self.shutdown.child_token();
                self.ownership.claim(entry.key().clone(), token.clone());

                let (topic, partition) = entry.key().clone();
                let mut claim = Claim::new(topic, partition, receiver, token.clone());
                let handler = self.handler.clone();
                let session = self.session.clone();
                self.workers.spawn_blocking(move || {
                    let exit = handler.consume_claim(session, &mut claim);
                    (claim.topic().to_string(), claim.partition(), exit)
                });

                entry.insert(Route {
                    sender,
                    backlog: VecDeque::new(),
                    token,
                    waiter: None,
                })
            }
        };

        if !route.backlog.is_empty() {
            route.backlog.push_back(message);
            return Ok(Dispatch::Held);
        }

        match route.sender.try_send(message) {
            Ok(()) => Ok(Dispatch::Delivered),
            Err(TrySendError::Full(message)) => {
                let key = (message.topic.clone(), message.partition);
                route.backlog.push_back(message);
                route.waiter = Some(wait_for_capacity(
                    &mut self.waiters,
                    key.clone(),
                    route.sender.clone(),
                ));
                Ok(Dispatch::Paused {
                    topic: key.0,
                    partition: key.1,
                })
            }
            Err(TrySendError::Closed(_)) => Err(ConsumerGroupError::Closed),
        }
    }

    /// Waits for a claim to free capacity, a worker to exit or a partition to
    /// be revoked. Cancel safe.
    pub async fn next_event(&mut self) -> RouterEvent {
        tokio::select! {
            _ = self.ownership.inner.revoked.notified() => {
                self.sweep_revoked();
                RouterEvent::Settled
            }
            Some(exit) = self.workers.join_next() => self.on_worker_exit(exit),
            Some(ready) = self.waiters.join_next() => self.on_capacity(ready),
        }
    }

    /// Stops every claim and waits for the workers; returns the first worker failure.
    pub async fn shutdown(mut self) -> Result<(), ConsumerGroupError> {
        self.shutdown.cancel();
        self.waiters.abort_all();
        self.routes.clear();

        let mut outcome = Ok(());
        while let Some(exit) = self.workers.join_next().await {
            if let Err(err) = worker_outcome(exit) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    fn on_worker_exit(&mut self, exit: Result<WorkerExit, JoinError>) -> RouterEvent {
        let (topic, partition) = match exit {
            Ok((topic, partition, Ok(()))) => (topic, partition),
            failed => {
                return match worker_outcome(failed) {
                    Err(err) => RouterEvent::Failed(err),
                    Ok(()) => RouterEvent::Settled,
                }
            }
        };

        let key = (topic, partition);
        if self
            .routes
            .get(&key)
            .is_some_and(|route| route.token.is_cancelled())
        {
            self.close_route(&key);
        }
        RouterEvent::Settled
    }

    fn on_capacity(&mut self, ready: Result<CapacityReady, JoinError>) -> RouterEvent {
        let (key, permit) = match ready {
            Ok(ready) => ready,
            Err(err) if err.is_cancelled() => return RouterEvent::Settled,
            Err(err) => {
                return RouterEvent::Failed(ConsumerGroupError::Broker(format!(
                    "claim capacity waiter failed: {err}"
                )))
            }
        };
        let Some(route) = self.routes.get_mut(&key) else {
            return RouterEvent::Settled;
        };
        route.waiter = None;
        if route.token.is_cancelled() {
            return RouterEvent::Settled;
        }
        let Ok(permit) = permit else {
            return RouterEvent::Failed(ConsumerGroupError::Closed);
        };

        if let Some(message) = route.backlog.pop_front() {
            permit.send(message);
        }
        while let Some(message) = route.backlog.pop_front() {
            match route.sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) => {
                    route.backlog.push_front(message);
                    route.waiter = Some(wait_for_capacity(
                        &mut self.waiters,
                        key,
                        route.sender.clone(),
                    ));
                    return RouterEvent::Settled;
                }
                Err(TrySendError::Closed(_)) => return RouterEvent::Failed(ConsumerGroupError::Closed),
            }
        }

        RouterEvent::Resume {
            topic: key.0,
            partition: key.1,
        }
    }

    fn sweep_revoked(&mut self) {
        let revoked: Vec<PartitionKey> = self
            .routes
            .iter()
            .filter(|(_, route)| route.token.is_cancelled())
            .map(|(key, _)| key.clone())
            .collect();
        for key in revoked {
            self.close_route(&key);
        }
    }

    fn close_route(&mut self, key: &PartitionKey) {
        let Some(route) = self.routes.remove(key) else {
            return;
        };
        if let Some(waiter) = route.waiter {
            waiter.abort();
        }
        tracing::info!(
            target: "orchestrate::broker",
            event = "claim_released",
            topic = %key.0,
            partition = key.1,
            dropped = route.backlog.len(),
        );
    }
}

fn wait_for_capacity(
    waiters: &mut JoinSet<CapacityReady>,
    key: PartitionKey,
    sender: mpsc::Sender<ConsumerMessage>,
) -> AbortHandle {
    waiters.spawn(async move { (key, sender.reserve_owned().await) })
}

fn worker_outcome(exit: Result<WorkerExit, JoinError>) -> Result<(), ConsumerGroupError> {
    match exit {
        Ok((_, _, outcome)) => outcome,
        Err(err) => Err(ConsumerGroupError::Broker(format!(
            "partition worker panicked: {err}"
        ))),
    }
}
