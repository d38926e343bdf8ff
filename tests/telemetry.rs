#[path = "common/mod.rs"]
mod common;

use orchestrate::engine::{Engine, EngineConfig};
use orchestrate::handlers::{self, DecoderRoute, LoaderConfig};
use prost::Message;
use std::sync::{Arc, Mutex};
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

struct BufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = BufferGuard;

    fn make_writer(&'a self) -> Self::Writer {
        BufferGuard {
            buffer: self.buffer.clone(),
        }
    }
}

struct BufferGuard {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for BufferGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.buffer.lock().expect("log buffer lock");
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture_logs<F>(action: F) -> String
where
    F: FnOnce(),
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = BufferWriter {
        buffer: buffer.clone(),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .without_time()
        .with_target(true)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    with_default(subscriber, action);

    let contents = buffer.lock().expect("log buffer lock");
    String::from_utf8(contents.clone()).expect("utf8 logs")
}

fn pipeline(producer: common::RecordingProducer) -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .register(handlers::marker())
        .register(handlers::loader(LoaderConfig::default()))
        .register(handlers::decoder_producer(
            Arc::new(producer),
            DecoderRoute::default(),
        ));
    engine
}

#[test]
fn pipeline_emits_envelope_lifecycle_events() {
    let engine = pipeline(common::RecordingProducer::default());
    let mut envelope = common::sample_envelope();
    let payload = envelope.tx_envelope_as_request().encode_to_vec();

    let output = capture_logs(|| {
        let session = common::RecordingSession::default();
        engine.run(
            Box::new(
                orchestrate::broker::ConsumerMessage::new("topic-tx-sender", payload)
                    .with_position(3, 17),
            ),
            Some(Arc::new(session)),
        );
    });

    assert!(output.contains("event=\"envelope_loaded\""), "logs: {output}");
    assert!(output.contains("event=\"envelope_produced\""), "logs: {output}");
    assert!(output.contains("event=\"offset_marked\""), "logs: {output}");
    assert!(output.contains("event=\"envelope_processed\""), "logs: {output}");
    assert!(
        output.contains(&format!("envelope={}", common::ENVELOPE_ID)),
        "logs: {output}"
    );
    assert!(output.contains("topic=topic-tx-decoder.10"), "logs: {output}");
    assert!(output.contains("partition=3"), "logs: {output}");
    assert!(output.contains("offset=17"), "logs: {output}");
}

#[test]
fn failures_are_logged_with_their_cause() {
    let engine = pipeline(common::RecordingProducer::failing());
    let mut envelope = common::sample_envelope();
    let payload = envelope.tx_envelope_as_request().encode_to_vec();

    let output = capture_logs(|| {
        engine.run(common::message("topic-tx-sender", vec![1]), None);
        engine.run(common::message("topic-tx-sender", payload), None);
    });

    assert!(output.contains("event=\"envelope_load_failed\""), "logs: {output}");
    assert!(output.contains("corrupt bytes"), "logs: {output}");
    assert!(output.contains("event=\"envelope_produce_failed\""), "logs: {output}");
    assert!(output.contains("broker unreachable"), "logs: {output}");
}
