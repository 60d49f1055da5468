use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// A model lookup by id found nothing.
    RecordNotFound,
    /// Anything else the handler failed at.
    Handler,
}

/// Error returned by an RPC handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub kind: RpcErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self {
            kind: RpcErrorKind::Handler,
            message: message.into(),
        }
    }

    /// `"<model> not found: <id>"`
    pub fn record_not_found(model: &str, id: impl fmt::Display) -> Self {
        Self {
            kind: RpcErrorKind::RecordNotFound,
            message: format!("{model} not found: {id}"),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::handler(err.to_string())
    }
}
