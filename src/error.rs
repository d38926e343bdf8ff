#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
pub type OrchestrateError = Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("envelope error: {0}")]
    Envelope(#[from] crate::errors::TxError),
    #[error("producer error: {0}")]
    Produce(#[from] crate::broker::ProduceError),
    #[error("consumer group error: {0}")]
    ConsumerGroup(#[from] crate::broker::ConsumerGroupError),
    #[cfg(feature = "kafka")]
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn new<E>(error: E) -> Self
    where
        Error: From<E>,
    {
        error.into()
    }

    pub fn msg<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Self::Message(message.into())
    }

    pub fn with_context<M>(context: M, source: Error) -> Self
    where
        M: Into<String>,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error once every context layer is peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

pub trait Context<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Into<String>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    Error: From<E>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Into<String>,
    {
        self.map_err(|err| Error::with_context(context.into(), err.into()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|err| Error::with_context(f().into(), err.into()))
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Message(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Message(value.to_string())
    }
}

#[macro_export]
macro_rules! err {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $crate::error::Error::msg(format!($fmt $(, $arg)*))
    }};
    ($err:expr) => {{
        $crate::error::Error::new($err)
    }};
}

#[macro_export]
macro_rules! bail_err {
    ($($arg:tt)*) => {{
        return Err($crate::err!($($arg)*));
    }};
}

#[macro_export]
macro_rules! ensure_err {
    ($cond:expr $(,)?) => {
        if !$cond {
            return Err($crate::err!(concat!("condition failed: ", stringify!($cond))));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::bail_err!($($arg)+);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked_slots(slots: i64) -> Result<usize> {
        ensure_err!(slots >= 0, "slots must not be negative, got {slots}");
        Ok(slots as usize)
    }

    #[test]
    fn context_layers_keep_the_root_cause() {
        let outcome: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "orchestrate.yaml",
        ));
        let err = outcome
            .context("reading configuration")
            .context("starting pipeline")
            .expect_err("io failure");

        assert_eq!(err.to_string(), "starting pipeline");
        assert!(matches!(err.root(), Error::Io(_)));
    }

    #[test]
    fn macros_build_message_errors() {
        assert_eq!(checked_slots(4).expect("valid slots"), 4);
        let err = checked_slots(-1).expect_err("negative slots");
        assert_eq!(err.to_string(), "slots must not be negative, got -1");

        let envelope: Error = crate::errors::internal_error("boom").into();
        assert!(matches!(envelope, Error::Envelope(_)));
    }
}
