pub mod ethereum;
pub mod primitives;
pub mod tx;

pub use tx::Envelope;
