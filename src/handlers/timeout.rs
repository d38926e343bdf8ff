#![forbid(unsafe_code)]

use crate::engine::Handler;
use crate::errors;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

pub const COMPONENT: &str = "engine.timeout";

/// Gives `handler` (and, for a middleware, everything after it) a time budget.
///
/// The deadline is exposed on the context for handlers that can honour it;
/// overrunning it records an internal error carrying `message`.
pub fn timeout(handler: Handler, budget: Duration, message: impl Into<String>) -> Handler {
    let message = message.into();
    Handler::new(move |ctx| {
        let deadline = Instant::now() + budget;
        let scoped = match ctx.deadline() {
            Some(outer) => outer.min(deadline),
            None => deadline,
        };
        let previous = ctx.replace_deadline(Some(scoped));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.call(ctx)));
        ctx.replace_deadline(previous);
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }

        if Instant::now() > scoped {
            tracing::warn!(
                target: "orchestrate::engine",
                event = "handler_timed_out",
                envelope = %ctx.envelope.id,
                budget_ms = budget.as_millis() as u64,
            );
            ctx.error(errors::internal_error(message.clone()).extend_component(COMPONENT));
        }
    })
}
