//! Handlers plugged into the engine.

pub mod dispatcher;
pub mod loader;
pub mod metrics;
pub mod offset;
pub mod producer;
pub mod timeout;

pub use dispatcher::Dispatcher;
pub use loader::{loader, LoaderConfig};
pub use metrics::metrics;
pub use offset::marker;
pub use producer::{decoder_producer, producer, DecoderRoute};
pub use timeout::timeout;
