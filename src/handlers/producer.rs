#![forbid(unsafe_code)]

//! Publishes the envelope to the next pipeline stage.

use crate::broker::{Header, ProducerMessage, SyncProducer};
use crate::engine::{Handler, TxContext};
use crate::errors::{self, TxError};
use crate::types::Envelope;
use prost::Message as _;
use std::sync::Arc;

pub const COMPONENT: &str = "handler.producer";

/// Builds the outbound record for the current context. `Ok(None)` skips publication.
pub type PrepareMessage =
    dyn Fn(&mut TxContext) -> Result<Option<ProducerMessage>, TxError> + Send + Sync;

/// Generic producer: prepares a record and sends it synchronously.
///
/// Prepare and delivery failures abort the chain with the error recorded on the envelope.
pub fn producer<F>(producer: Arc<dyn SyncProducer>, prepare: F) -> Handler
where
    F: Fn(&mut TxContext) -> Result<Option<ProducerMessage>, TxError> + Send + Sync + 'static,
{
    let prepare: Arc<PrepareMessage> = Arc::new(prepare);
    Handler::new(move |ctx| {
        let message = match prepare(ctx) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(err) => {
                ctx.abort_with_error(err.extend_component(COMPONENT));
                return;
            }
        };

        let topic = message.topic.clone();
        match producer.send(message) {
            Ok(delivery) => {
                crate::metrics::record_produced(&topic, true);
                crate::envelope_event!(
                    info,
                    "orchestrate::producer",
                    "envelope_produced",
                    topic = topic,
                    envelope = ctx.envelope.id,
                    partition = delivery.partition,
                    offset = delivery.offset
                );
            }
            Err(err) => {
                crate::metrics::record_produced(&topic, false);
                crate::envelope_event!(
                    error,
                    "orchestrate::producer",
                    "envelope_produce_failed",
                    topic = topic,
                    envelope = ctx.envelope.id,
                    error = err
                );
                ctx.abort_with_error(
                    errors::kafka_connection_error(format!("failed to produce message: {err}"))
                        .extend_component(COMPONENT),
                );
            }
        }
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderRoute {
    /// Base of the chain scoped decoder topic, published as `<decoder_topic>.<chain-id>`.
    pub decoder_topic: String,
    pub recover_topic: String,
    /// Publish envelopes carrying neither metadata nor transaction fields.
    pub external_tx_enabled: bool,
}

impl Default for DecoderRoute {
    fn default() -> Self {
        Self {
            decoder_topic: "topic-tx-decoder".to_string(),
            recover_topic: "topic-tx-recover".to_string(),
            external_tx_enabled: false,
        }
    }
}

impl DecoderRoute {
    /// Destination topic: recover for failed envelopes without receipt,
    /// otherwise the chain scoped decoder topic.
    pub fn topic_for(&self, envelope: &Envelope) -> Result<String, TxError> {
        if envelope.receipt.is_none() && !envelope.only_warnings() {
            return Ok(self.recover_topic.clone());
        }
        let chain_id = envelope.chain_id()?;
        Ok(format!("{}.{chain_id}", self.decoder_topic))
    }
}

fn has_metadata(envelope: &Envelope) -> bool {
    !envelope.id.is_empty() || !envelope.job_uuid().is_empty()
}

/// Record preparation for the decoder stage.
pub fn prepare_decoder_message(
    ctx: &mut TxContext,
    route: &DecoderRoute,
) -> Result<Option<ProducerMessage>, TxError> {
    if !route.external_tx_enabled && !has_metadata(&ctx.envelope) && !ctx.envelope.has_tx() {
        crate::envelope_event!(
            debug,
            "orchestrate::producer",
            "external_tx_skipped",
            topic = ctx.message().entrypoint(),
            offset = ctx.message().offset()
        );
        ctx.abort();
        return Ok(None);
    }

    let topic = route.topic_for(&ctx.envelope)?;
    let key = ctx.envelope.partition_key();
    let headers: Header = ctx
        .envelope
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let value = ctx.envelope.tx_envelope_as_response().encode_to_vec();

    Ok(Some(ProducerMessage {
        topic,
        key: (!key.is_empty()).then(|| key.into_bytes()),
        value,
        headers,
    }))
}

pub fn decoder_producer(producer_handle: Arc<dyn SyncProducer>, route: DecoderRoute) -> Handler {
    producer(producer_handle, move |ctx| prepare_decoder_message(ctx, &route))
}
