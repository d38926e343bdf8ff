#![forbid(unsafe_code)]

use prost::Message;
use std::fmt;

/// Classified failure carried on an envelope and serialised inside `TxResponse.errors`.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct TxError {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(uint64, tag = "2")]
    pub code: u64,
    #[prost(string, tag = "3")]
    pub component: String,
}

impl TxError {
    pub fn new(code: u64, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            component: String::new(),
        }
    }

    /// Fixed width, zero padded, upper-case hexadecimal rendering of the code.
    pub fn hex(&self) -> String {
        format!("{:05X}", self.code)
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Prefixes `component` to the breadcrumb trail (`outer.inner`).
    pub fn extend_component(mut self, component: impl AsRef<str>) -> Self {
        let component = component.as_ref();
        if component.is_empty() {
            return self;
        }
        self.component = if self.component.is_empty() {
            component.to_string()
        } else {
            format!("{component}.{}", self.component)
        };
        self
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}: {}", self.hex(), self.component, self.message)
    }
}

impl std::error::Error for TxError {}
