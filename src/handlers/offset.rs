#![forbid(unsafe_code)]

use crate::engine::Handler;

/// Marks the consumed offset once every downstream handler has returned.
///
/// Register it early: its work happens while the chain unwinds. Without a
/// consumer group session on the context it does nothing.
pub fn marker() -> Handler {
    Handler::new(|ctx| {
        ctx.next();

        let Some(session) = ctx.session().cloned() else {
            return;
        };
        let message = ctx.message();
        session.mark_message(message);
        crate::metrics::record_offset_marked(message.entrypoint(), message.partition());
        crate::envelope_event!(
            debug,
            "orchestrate::offset",
            "offset_marked",
            topic = message.entrypoint(),
            envelope = ctx.envelope.id,
            partition = message.partition(),
            offset = message.offset()
        );
    })
}
