#![forbid(unsafe_code)]

use crate::engine::Handler;
use crate::metrics::{record_envelope, EnvelopeOutcome};
use std::time::Instant;

/// Reports outcome and elapsed time of the downstream chain.
pub fn metrics() -> Handler {
    Handler::new(|ctx| {
        let started = Instant::now();
        ctx.next();
        record_envelope(
            ctx.message().entrypoint(),
            EnvelopeOutcome::of(&ctx.envelope),
            started.elapsed(),
        );
    })
}
