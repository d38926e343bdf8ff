#![forbid(unsafe_code)]

//! Routes processed envelopes to per scenario channels for end to end harnesses.

use crate::engine::Handler;
use crate::errors;
use crate::types::Envelope;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

pub const COMPONENT: &str = "handler.dispatcher";
pub const SCENARIO_LABEL: &str = "scenario.id";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("envelope carries no `scenario.id` context label")]
    MissingScenario,
    #[error("no channel registered for `{0}`")]
    Unregistered(String),
    #[error("channel `{0}` is closed")]
    Closed(String),
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    channels: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>>,
}

fn channel_key(short_topic: &str, scenario: &str) -> String {
    format!("{short_topic}/{scenario}")
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        short_topic: &str,
        scenario: &str,
    ) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel_key(short_topic, scenario), tx);
        rx
    }

    pub fn unregister(&self, short_topic: &str, scenario: &str) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&channel_key(short_topic, scenario));
    }

    pub fn dispatch(&self, short_topic: &str, envelope: Envelope) -> Result<(), DispatchError> {
        let scenario = envelope
            .context_label(SCENARIO_LABEL)
            .ok_or(DispatchError::MissingScenario)?;
        let key = channel_key(short_topic, scenario);

        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = channels
            .get(&key)
            .ok_or_else(|| DispatchError::Unregistered(key.clone()))?;
        sender.send(envelope).map_err(|_| DispatchError::Closed(key))
    }

    /// Handler dispatching the context envelope. `short_topics` maps consumed
    /// topics to the short names scenarios register under; unmapped topics
    /// dispatch under their own name.
    pub fn handler(&self, short_topics: HashMap<String, String>) -> Handler {
        let dispatcher = self.clone();
        Handler::new(move |ctx| {
            let topic = ctx.message().entrypoint();
            let short_topic = short_topics
                .get(topic)
                .map(String::as_str)
                .unwrap_or(topic)
                .to_string();

            if let Err(err) = dispatcher.dispatch(&short_topic, ctx.envelope.clone()) {
                tracing::warn!(
                    target: "orchestrate::dispatcher",
                    event = "dispatch_failed",
                    topic = %short_topic,
                    envelope = %ctx.envelope.id,
                    error = %err,
                );
                ctx.error(errors::data_error(err.to_string()).extend_component(COMPONENT));
            }
        })
    }
}
