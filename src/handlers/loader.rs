#![forbid(unsafe_code)]

//! Decodes the inbound payload into the context envelope.

use crate::engine::Handler;
use crate::errors::{self, TxError};
use crate::types::tx::{TxEnvelope, TxRequest, TxResponse};
use crate::types::Envelope;
use prost::Message as _;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub const COMPONENT: &str = "encoding.broker";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Request,
    Response,
    Envelope,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Request => "request",
            Shape::Response => "response",
            Shape::Envelope => "envelope",
        }
    }
}

/// Why a single decode attempt failed.
#[derive(Debug)]
pub enum DecodeError {
    /// Bytes are not a valid encoding of the attempted message.
    Corrupt(prost::DecodeError),
    /// Bytes decoded but the message does not describe a valid envelope.
    WrongShape(TxError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Corrupt(err) => write!(f, "corrupt bytes ({err})"),
            DecodeError::WrongShape(err) => write!(f, "wrong shape ({})", err.message),
        }
    }
}

/// Ordered attempt failures, one entry per shape tried.
#[derive(Debug)]
pub struct LoadFailure {
    pub attempts: Vec<(Shape, DecodeError)>,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .attempts
            .iter()
            .map(|(shape, err)| format!("{}: {err}", shape.as_str()))
            .collect();
        write!(f, "failed to load envelope - {}", rendered.join("; "))
    }
}

pub fn decode_as(shape: Shape, payload: &[u8]) -> Result<Envelope, DecodeError> {
    match shape {
        Shape::Request => TxRequest::decode(payload)
            .map_err(DecodeError::Corrupt)?
            .envelope()
            .map_err(DecodeError::WrongShape),
        Shape::Response => TxResponse::decode(payload)
            .map_err(DecodeError::Corrupt)?
            .envelope()
            .map_err(DecodeError::WrongShape),
        Shape::Envelope => TxEnvelope::decode(payload)
            .map_err(DecodeError::Corrupt)?
            .envelope()
            .map_err(DecodeError::WrongShape),
    }
}

/// Tries every shape in order and keeps the first that yields a valid envelope.
pub fn load_envelope(payload: &[u8], response_first: bool) -> Result<Envelope, LoadFailure> {
    let order = if response_first {
        [Shape::Response, Shape::Request, Shape::Envelope]
    } else {
        [Shape::Request, Shape::Response, Shape::Envelope]
    };

    let mut attempts = Vec::with_capacity(order.len());
    for shape in order {
        match decode_as(shape, payload) {
            Ok(envelope) => return Ok(envelope),
            Err(err) => attempts.push((shape, err)),
        }
    }
    Err(LoadFailure { attempts })
}

#[derive(Clone, Debug, Default)]
pub struct LoaderConfig {
    /// Topics whose payloads are expected to be responses (decoded, recover).
    pub response_topics: HashSet<String>,
}

impl LoaderConfig {
    pub fn with_response_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            response_topics: topics.into_iter().map(Into::into).collect(),
        }
    }
}

pub fn loader(config: LoaderConfig) -> Handler {
    let config = Arc::new(config);
    Handler::new(move |ctx| {
        let topic = ctx.message().entrypoint().to_string();
        let response_first = config.response_topics.contains(&topic);

        match load_envelope(ctx.message().value(), response_first) {
            Ok(envelope) => {
                let mut errors = std::mem::take(&mut ctx.envelope.errors);
                ctx.envelope = envelope;
                errors.append(&mut ctx.envelope.errors);
                ctx.envelope.errors = errors;
                ctx.span().record("envelope_id", ctx.envelope.id.as_str());
                crate::envelope_event!(
                    debug,
                    "orchestrate::loader",
                    "envelope_loaded",
                    topic = topic,
                    envelope = ctx.envelope.id,
                    partition = ctx.message().partition(),
                    offset = ctx.message().offset()
                );
            }
            Err(failure) => {
                crate::envelope_event!(
                    warn,
                    "orchestrate::loader",
                    "envelope_load_failed",
                    topic = topic,
                    partition = ctx.message().partition(),
                    offset = ctx.message().offset(),
                    error = failure
                );
                ctx.error(errors::encoding_error(failure.to_string()).extend_component(COMPONENT));
            }
        }
    })
}
