#![forbid(unsafe_code)]

//! Middleware chain executed once per inbound message.
//!
//! Handlers run in registration order. A handler that calls [`TxContext::next`]
//! lets the rest of the chain run before its own trailing code, so trailing
//! code unwinds in reverse registration order. A panicking handler is turned
//! into an internal error and aborts the chain for that message only.

mod context;
mod slots;

pub use context::TxContext;
pub use slots::{SlotGuard, Slots};

use crate::broker::{
    Claim, ConsumerGroupError, ConsumerGroupHandler, ConsumerGroupSession, Message,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

type HandlerFn = dyn Fn(&mut TxContext) + Send + Sync;

#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&mut TxContext) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn call(&self, ctx: &mut TxContext) {
        (self.0)(ctx)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

/// Runs `handlers` as a single handler with its own cursor. Aborting inside
/// the group aborts the enclosing chain as well.
pub fn combine_handlers(handlers: Vec<Handler>) -> Handler {
    let handlers: Arc<[Handler]> = handlers.into();
    Handler::new(move |ctx| ctx.apply_handlers(handlers.clone()))
}

#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Maximum number of chains executing at once across partitions; 0 disables the limit.
    pub slots: usize,
}

pub struct Engine {
    handlers: Arc<[Handler]>,
    slots: Option<Slots>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            handlers: Arc::from(Vec::new()),
            slots: (config.slots > 0).then(|| Slots::new(config.slots)),
        }
    }

    /// Appends a handler. Registration happens before the engine is shared.
    pub fn register(&mut self, handler: Handler) -> &mut Self {
        let mut handlers = self.handlers.to_vec();
        handlers.push(handler);
        self.handlers = handlers.into();
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Processes one message through the full chain and hands back the final context.
    pub fn run(
        &self,
        message: Box<dyn Message>,
        session: Option<Arc<dyn ConsumerGroupSession>>,
    ) -> TxContext {
        let _slot = self.slots.as_ref().map(Slots::acquire);
        let started = Instant::now();

        let span = tracing::info_span!(
            "envelope",
            topic = %message.entrypoint(),
            partition = message.partition(),
            offset = message.offset(),
            envelope_id = tracing::field::Empty,
        );
        let _entered = span.clone().entered();

        let mut ctx = TxContext::new(message, session, span);
        let handlers = self.handlers.clone();
        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| ctx.apply_handlers(handlers)))
        {
            ctx.recover(payload);
        }

        tracing::debug!(
            target: "orchestrate::engine",
            event = "envelope_processed",
            envelope = %ctx.envelope.id,
            aborted = ctx.is_aborted(),
            errors = ctx.envelope.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
        );

        ctx
    }
}

impl ConsumerGroupHandler for Engine {
    fn consume_claim(
        &self,
        session: Arc<dyn ConsumerGroupSession>,
        claim: &mut Claim,
    ) -> Result<(), ConsumerGroupError> {
        tracing::info!(
            target: "orchestrate::engine",
            event = "claim_started",
            member = %session.member_id(),
            topic = %claim.topic(),
            partition = claim.partition(),
        );

        while let Some(message) = claim.next_message() {
            self.run(Box::new(message), Some(session.clone()));
        }

        tracing::info!(
            target: "orchestrate::engine",
            event = "claim_released",
            topic = %claim.topic(),
            partition = claim.partition(),
        );
        Ok(())
    }
}
