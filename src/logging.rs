//! Helper macros enforcing consistent pipeline log fields.
//!
//! Handler logs always carry `topic` and `envelope` so a message can be traced
//! across stages by its envelope id.

/// Log an event for an envelope flowing through a topic plus any extra fields.
#[macro_export]
macro_rules! envelope_event {
    ($level:ident, $target:expr, $event:expr, topic = $topic:expr, envelope = $envelope:expr $(, $field:ident = $value:expr )* $(,)?) => {
        tracing::$level!(
            target: $target,
            event = $event,
            topic = %$topic,
            envelope = %$envelope,
            $($field = %$value,)*
        )
    };
    ($level:ident, $target:expr, $event:expr, topic = $topic:expr $(, $field:ident = $value:expr )* $(,)?) => {
        tracing::$level!(
            target: $target,
            event = $event,
            topic = %$topic,
            $($field = %$value,)*
        )
    };
}
