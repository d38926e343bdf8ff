#![allow(dead_code)]

use num_bigint::BigInt;
use orchestrate::broker::{
    ConsumerGroupSession, ConsumerMessage, Delivery, Message, ProduceError, ProducerMessage,
    SyncProducer,
};
use orchestrate::engine::{Handler, TxContext};
use orchestrate::errors;
use orchestrate::types::tx::JobType;
use orchestrate::types::Envelope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const ENVELOPE_ID: &str = "dce80ed3-8b0e-4045-9a91-832ba0391c44";
pub const SENDER: &str = "0x0000000000000000000000000000000000000001";
pub const RECIPIENT: &str = "0xdbb881a51CD4023E4400CEF3ef73046743f08da3";
pub const TX_HASH: &str = "0x0a0cafa26ca3f411e6629e9e02c53f23713b0033d7a72e534136104b5447a210";
pub const RAW: &str = "0xf86c0184ee6b2800829c4094dbb881a51cd4023e4400cef3ef73046743f08da3";

/// Envelope as the sender stage sees it once a transaction was signed.
pub fn sample_envelope() -> Envelope {
    let mut envelope = Envelope::new();
    envelope
        .set_id(ENVELOPE_ID)
        .set_chain_id(BigInt::from(10))
        .set_chain_name("testnet")
        .set_gas(21_000)
        .set_nonce(1)
        .set_gas_price(BigInt::from(1_000_000_000u64))
        .set_value(BigInt::from(0))
        .set_job_uuid("6f6e8a1c-6f8b-4d3e-9a34-1b2c3d4e5f60")
        .set_header("tenant", "acme");
    envelope.set_from_string(SENDER).expect("sender address");
    envelope.set_to_string(RECIPIENT).expect("recipient address");
    envelope.set_raw_string(RAW).expect("raw transaction");
    envelope.set_tx_hash_string(TX_HASH).expect("tx hash");
    envelope
}

pub fn eea_envelope() -> Envelope {
    let mut envelope = sample_envelope();
    envelope.set_job_type(JobType::EthOrionEeaTx);
    envelope
}

pub fn message(topic: &str, payload: Vec<u8>) -> Box<dyn Message> {
    Box::new(ConsumerMessage::new(topic, payload))
}

/// Execution trace stored on the context, in call order.
#[derive(Clone, Debug, Default)]
pub struct Trace(pub Vec<String>);

pub fn trace(ctx: &mut TxContext, entry: impl Into<String>) {
    if ctx.extensions().get::<Trace>().is_none() {
        ctx.extensions_mut().insert(Trace::default());
    }
    if let Some(trace) = ctx.extensions_mut().get_mut::<Trace>() {
        trace.0.push(entry.into());
    }
}

pub fn trace_of(ctx: &TxContext) -> Vec<String> {
    ctx.extensions()
        .get::<Trace>()
        .map(|trace| trace.0.clone())
        .unwrap_or_default()
}

pub fn pipeline(name: &'static str) -> Handler {
    Handler::new(move |ctx| trace(ctx, name))
}

pub fn middleware(name: &'static str) -> Handler {
    Handler::new(move |ctx| {
        trace(ctx, format!("{name}-before"));
        ctx.next();
        trace(ctx, format!("{name}-after"));
    })
}

pub fn error_handler(name: &'static str) -> Handler {
    Handler::new(move |ctx| {
        trace(ctx, name);
        ctx.error(errors::internal_error("test Error"));
    })
}

pub fn aborter() -> Handler {
    Handler::new(|ctx| {
        trace(ctx, "abort");
        ctx.abort_with_error(errors::internal_error("test Error"));
    })
}

/// `pA, mA, err, mB, pB, abort, pC, mC`
pub fn ordering_chain() -> Vec<Handler> {
    vec![
        pipeline("pA"),
        middleware("mA"),
        error_handler("err"),
        middleware("mB"),
        pipeline("pB"),
        aborter(),
        pipeline("pC"),
        middleware("mC"),
    ]
}

pub fn expected_ordering() -> Vec<String> {
    ["pA", "mA-before", "err", "mB-before", "pB", "abort", "mB-after", "mA-after"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Clone, Default)]
pub struct RecordingProducer {
    sent: Arc<Mutex<Vec<ProducerMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingProducer {
    pub fn failing() -> Self {
        let producer = Self::default();
        producer.failing.store(true, Ordering::SeqCst);
        producer
    }

    pub fn sent(&self) -> Vec<ProducerMessage> {
        self.sent.lock().expect("producer state").clone()
    }
}

impl SyncProducer for RecordingProducer {
    fn send(&self, message: ProducerMessage) -> Result<Delivery, ProduceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProduceError::Delivery {
                topic: message.topic,
                reason: "broker unreachable".to_string(),
            });
        }
        let mut sent = self.sent.lock().expect("producer state");
        sent.push(message);
        Ok(Delivery {
            partition: 0,
            offset: sent.len() as i64 - 1,
        })
    }
}

#[derive(Clone, Default)]
pub struct RecordingSession {
    marks: Arc<Mutex<Vec<(String, i32, i64)>>>,
}

impl RecordingSession {
    pub fn marks(&self) -> Vec<(String, i32, i64)> {
        self.marks.lock().expect("session state").clone()
    }
}

impl ConsumerGroupSession for RecordingSession {
    fn member_id(&self) -> &str {
        "recording-member"
    }

    fn mark_message(&self, message: &dyn Message) {
        self.marks.lock().expect("session state").push((
            message.entrypoint().to_string(),
            message.partition(),
            message.offset(),
        ));
    }
}
