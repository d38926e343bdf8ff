#[path = "common/mod.rs"]
mod common;

use orchestrate::engine::{Engine, EngineConfig, Handler};
use orchestrate::errors;
use orchestrate::handlers::{self, DecoderRoute};
use orchestrate::metrics::{EnvelopeOutcome, PipelineCounters};
use orchestrate::types::Envelope;
use std::sync::Arc;

#[test]
fn outcome_follows_the_error_list() {
    let mut envelope = Envelope::new();
    assert_eq!(EnvelopeOutcome::of(&envelope), EnvelopeOutcome::Success);

    envelope.append_error(errors::retry_warning("retry"));
    assert_eq!(EnvelopeOutcome::of(&envelope), EnvelopeOutcome::Warning);

    envelope.append_error(errors::storage_error("db down"));
    assert_eq!(EnvelopeOutcome::of(&envelope), EnvelopeOutcome::Error);
    assert_eq!(EnvelopeOutcome::Error.as_str(), "error");
}

// The only test in this binary touching the process wide counters.
#[test]
fn counters_track_processed_envelopes() {
    let before = PipelineCounters::global().snapshot();

    let producer = common::RecordingProducer::default();
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register(handlers::marker())
        .register(handlers::metrics())
        .register(Handler::new(|ctx| {
            ctx.envelope = common::sample_envelope();
            if ctx.message().offset() == 1 {
                ctx.error(errors::nonce_too_low_warning("nonce too low"));
            }
            if ctx.message().offset() == 2 {
                ctx.error(errors::internal_error("boom"));
            }
        }))
        .register(handlers::decoder_producer(
            Arc::new(producer.clone()),
            DecoderRoute::default(),
        ));

    let session: Arc<dyn orchestrate::broker::ConsumerGroupSession> =
        Arc::new(common::RecordingSession::default());
    for offset in 0..3 {
        let message = orchestrate::broker::ConsumerMessage::new("topic-tx-sender", Vec::new())
            .with_position(0, offset);
        engine.run(Box::new(message), Some(session.clone()));
    }

    let after = PipelineCounters::global().snapshot();
    assert_eq!(after.envelopes_success - before.envelopes_success, 1);
    assert_eq!(after.envelopes_warning - before.envelopes_warning, 1);
    assert_eq!(after.envelopes_error - before.envelopes_error, 1);
    assert_eq!(after.produced_success - before.produced_success, 3);
    assert_eq!(after.offsets_marked - before.offsets_marked, 3);
    assert_eq!(producer.sent().len(), 3);
}
