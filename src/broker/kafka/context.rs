#![forbid(unsafe_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{ConsumerContext, Rebalance};
use rdkafka::error::KafkaError;

use crate::broker::router::Ownership;

#[derive(Clone, Copy, Debug)]
pub enum KafkaClientRole {
    Producer,
    Consumer,
}

impl KafkaClientRole {
    fn as_str(&self) -> &'static str {
        match self {
            KafkaClientRole::Producer => "producer",
            KafkaClientRole::Consumer => "consumer",
        }
    }
}

/// Tracks whether the client is currently cut off from the brokers so that
/// only transitions are logged at warn level.
#[derive(Debug, Default)]
pub struct KafkaConnectivityState {
    disconnected: AtomicBool,
}

impl KafkaConnectivityState {
    pub fn mark_disconnected(&self) -> bool {
        !self.disconnected.swap(true, Ordering::SeqCst)
    }

    pub fn mark_connected(&self) -> bool {
        self.disconnected.swap(false, Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct KafkaClientContext {
    client: String,
    role: KafkaClientRole,
    state: Arc<KafkaConnectivityState>,
    ownership: Ownership,
}

impl KafkaClientContext {
    pub fn new(client: impl Into<String>, role: KafkaClientRole) -> Self {
        Self {
            client: client.into(),
            role,
            state: Arc::new(KafkaConnectivityState::default()),
            ownership: Ownership::default(),
        }
    }

    /// Claims revoked by a rebalance are cancelled through `ownership`.
    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn state(&self) -> &Arc<KafkaConnectivityState> {
        &self.state
    }
}

impl ClientContext for KafkaClientContext {
    fn log(&self, _level: RDKafkaLogLevel, _facility: &str, _message: &str) {
        // connection failures arrive through `error`
    }

    fn error(&self, error: KafkaError, reason: &str) {
        if self.state.mark_disconnected() {
            tracing::warn!(
                target: "orchestrate::kafka",
                event = "rdkafka_client_error",
                client = %self.client,
                role = %self.role.as_str(),
                error = %error,
                reason = %reason,
            );
        } else {
            tracing::debug!(
                target: "orchestrate::kafka",
                event = "rdkafka_client_error",
                client = %self.client,
                role = %self.role.as_str(),
                error = %error,
                reason = %reason,
            );
        }
    }
}

impl ConsumerContext for KafkaClientContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        let Rebalance::Revoke(partitions) = rebalance else {
            return;
        };
        for element in partitions.elements() {
            if self.ownership.revoke(element.topic(), element.partition()) {
                tracing::info!(
                    target: "orchestrate::kafka",
                    event = "claim_revoked",
                    client = %self.client,
                    topic = %element.topic(),
                    partition = element.partition(),
                );
            }
        }
    }

    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        let kind = match rebalance {
            Rebalance::Assign(_) => "assign",
            Rebalance::Revoke(_) => "revoke",
            Rebalance::Error(_) => "error",
        };
        tracing::info!(
            target: "orchestrate::kafka",
            event = "consumer_rebalanced",
            client = %self.client,
            kind = kind,
        );
    }
}
