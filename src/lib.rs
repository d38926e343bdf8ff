#![allow(clippy::result_large_err)]

pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod telemetry;
pub mod types;

pub use engine::{Engine, EngineConfig, Handler, TxContext};
pub use errors::TxError;
pub use types::Envelope;
