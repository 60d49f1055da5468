//! Error types for the `cable` crate.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// A subscription identifier that is not the expected JSON object.
    InvalidIdentifier,
    /// A signed stream name that does not decode to a stream name.
    InvalidStreamName,
    /// The connection is not (or no longer) registered with the hub.
    UnknownConnection,
    /// An inbound frame that is not a recognised command.
    InvalidCommand,
    /// An outbound frame that could not be serialized.
    Serialization,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Cable error: {:?} ({source})", self.error_kind),
            None => write!(f, "Cable error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::InvalidStreamName,
        }
    }
}

/// Helper function to create cable errors from a message.
pub fn cable_error(kind: ErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: kind,
    }
}

/// Helper function to wrap an underlying error under the given kind.
pub fn cable_error_from<E>(kind: ErrorKind, err: E) -> Error
where
    E: StdError + Send + Sync + 'static,
{
    Error {
        source: Some(Box::new(err)),
        error_kind: kind,
    }
}
