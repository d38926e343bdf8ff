#![forbid(unsafe_code)]

use super::Handler;
use crate::broker::{ConsumerGroupSession, Message};
use crate::errors::{self, TxError};
use crate::types::Envelope;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

const COMPONENT: &str = "engine";

struct Sequence {
    handlers: Arc<[Handler]>,
    cursor: usize,
}

/// Per-message processing state, owned by the worker thread running the chain.
pub struct TxContext {
    pub envelope: Envelope,
    message: Box<dyn Message>,
    session: Option<Arc<dyn ConsumerGroupSession>>,
    stack: Vec<Sequence>,
    aborted: bool,
    deadline: Option<Instant>,
    extensions: http::Extensions,
    values: HashMap<String, String>,
    span: tracing::Span,
}

impl TxContext {
    pub fn new(
        message: Box<dyn Message>,
        session: Option<Arc<dyn ConsumerGroupSession>>,
        span: tracing::Span,
    ) -> Self {
        Self {
            envelope: Envelope::new(),
            message,
            session,
            stack: Vec::new(),
            aborted: false,
            deadline: None,
            extensions: http::Extensions::new(),
            values: HashMap::new(),
            span,
        }
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    pub fn message_mut(&mut self) -> &mut dyn Message {
        self.message.as_mut()
    }

    pub fn session(&self) -> Option<&Arc<dyn ConsumerGroupSession>> {
        self.session.as_ref()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Runs `handlers` as a nested sequence and returns once it is exhausted or aborted.
    pub fn apply_handlers(&mut self, handlers: Arc<[Handler]>) {
        self.stack.push(Sequence {
            handlers,
            cursor: 0,
        });
        self.next();
        self.stack.pop();
    }

    /// Runs the remaining handlers of the current sequence. Code placed after
    /// the call in a handler executes once every later handler has returned.
    pub fn next(&mut self) {
        let Some(depth) = self.stack.len().checked_sub(1) else {
            return;
        };

        while !self.aborted {
            let handler = {
                let sequence = &mut self.stack[depth];
                let Some(handler) = sequence.handlers.get(sequence.cursor).cloned() else {
                    break;
                };
                sequence.cursor += 1;
                handler
            };

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.call(self))) {
                self.recover(payload);
            }
        }
    }

    /// Skips every handler not yet entered. Handlers already entered still unwind.
    pub fn abort(&mut self) {
        self.aborted = true;
        for sequence in &mut self.stack {
            sequence.cursor = sequence.handlers.len();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Appends `err` to the envelope and returns the recorded copy.
    pub fn error(&mut self, err: TxError) -> &TxError {
        self.envelope.errors.push(err);
        &self.envelope.errors[self.envelope.errors.len() - 1]
    }

    pub fn abort_with_error(&mut self, err: TxError) -> &TxError {
        self.abort();
        self.error(err)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn replace_deadline(&mut self, deadline: Option<Instant>) -> Option<Instant> {
        std::mem::replace(&mut self.deadline, deadline)
    }

    pub fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }

    /// String scratch values for data only known at runtime.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub(crate) fn recover(&mut self, payload: Box<dyn Any + Send>) {
        let reason = panic_message(payload.as_ref());
        tracing::error!(
            target: "orchestrate::engine",
            event = "handler_panicked",
            topic = %self.message.entrypoint(),
            partition = self.message.partition(),
            offset = self.message.offset(),
            reason = %reason,
        );
        self.abort_with_error(
            errors::internal_error(format!("handler panicked: {reason}")).extend_component(COMPONENT),
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
