use metrics::{Key, Label, Level, Metadata};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// Outcome of one envelope run as reported to metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeOutcome {
    Success,
    Warning,
    Error,
}

impl EnvelopeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeOutcome::Success => "success",
            EnvelopeOutcome::Warning => "warning",
            EnvelopeOutcome::Error => "error",
        }
    }

    pub fn of(envelope: &crate::types::Envelope) -> Self {
        if envelope.errors.is_empty() {
            EnvelopeOutcome::Success
        } else if envelope.only_warnings() {
            EnvelopeOutcome::Warning
        } else {
            EnvelopeOutcome::Error
        }
    }
}

/// Process wide counters mirrored next to the recorder for cheap snapshots.
#[derive(Default)]
pub struct PipelineCounters {
    envelopes_success: AtomicU64,
    envelopes_warning: AtomicU64,
    envelopes_error: AtomicU64,
    produced_success: AtomicU64,
    produced_failure: AtomicU64,
    offsets_marked: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCountersSnapshot {
    pub envelopes_success: u64,
    pub envelopes_warning: u64,
    pub envelopes_error: u64,
    pub produced_success: u64,
    pub produced_failure: u64,
    pub offsets_marked: u64,
}

impl PipelineCounters {
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<PipelineCounters> = OnceLock::new();
        INSTANCE.get_or_init(PipelineCounters::default)
    }

    pub fn snapshot(&self) -> PipelineCountersSnapshot {
        PipelineCountersSnapshot {
            envelopes_success: self.envelopes_success.load(Ordering::Relaxed),
            envelopes_warning: self.envelopes_warning.load(Ordering::Relaxed),
            envelopes_error: self.envelopes_error.load(Ordering::Relaxed),
            produced_success: self.produced_success.load(Ordering::Relaxed),
            produced_failure: self.produced_failure.load(Ordering::Relaxed),
            offsets_marked: self.offsets_marked.load(Ordering::Relaxed),
        }
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

pub fn record_envelope(topic: &str, outcome: EnvelopeOutcome, elapsed: Duration) {
    let counters = PipelineCounters::global();
    let counter = match outcome {
        EnvelopeOutcome::Success => &counters.envelopes_success,
        EnvelopeOutcome::Warning => &counters.envelopes_warning,
        EnvelopeOutcome::Error => &counters.envelopes_error,
    };
    counter.fetch_add(1, Ordering::Relaxed);

    let labels = vec![
        Label::new("topic", topic.to_owned()),
        Label::new("outcome", outcome.as_str()),
    ];
    let counter_key = Key::from_parts("orchestrate_envelopes_total", labels.clone());
    let histogram_key = Key::from_parts("orchestrate_envelope_elapsed_ms", labels);
    let metadata = metadata();

    metrics::with_recorder(|recorder| {
        recorder
            .register_counter(&counter_key, &metadata)
            .increment(1);
        recorder
            .register_histogram(&histogram_key, &metadata)
            .record(elapsed.as_secs_f64() * 1000.0);
    });
}

pub fn record_produced(topic: &str, success: bool) {
    let counters = PipelineCounters::global();
    if success {
        counters.produced_success.fetch_add(1, Ordering::Relaxed);
    } else {
        counters.produced_failure.fetch_add(1, Ordering::Relaxed);
    }

    let status = if success { "success" } else { "error" };
    let key = Key::from_parts(
        "orchestrate_produced_total",
        vec![
            Label::new("topic", topic.to_owned()),
            Label::new("status", status),
        ],
    );
    let metadata = metadata();
    metrics::with_recorder(|recorder| recorder.register_counter(&key, &metadata).increment(1));
}

pub fn record_offset_marked(topic: &str, partition: i32) {
    PipelineCounters::global()
        .offsets_marked
        .fetch_add(1, Ordering::Relaxed);

    let key = Key::from_parts(
        "orchestrate_offsets_marked_total",
        vec![
            Label::new("topic", topic.to_owned()),
            Label::new("partition", partition.to_string()),
        ],
    );
    let metadata = metadata();
    metrics::with_recorder(|recorder| recorder.register_counter(&key, &metadata).increment(1));
}
