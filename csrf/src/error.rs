//! Error types for the `csrf` crate.
//!
//! Follows the same pattern as the other crates in this workspace: a root Error
//! struct holding an error kind and an optional source.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for token decoding and verification.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Reasons a token fails verification.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Not base64, not UTF-8, wrong number of fields, or an unparsable timestamp.
    Malformed,
    /// The embedded signature does not match the recomputed one.
    SignatureMismatch,
    /// The token was issued for a different session.
    SessionMismatch,
    /// The token is older than the configured maximum age.
    Expired,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "CSRF token error: {:?} ({source})", self.error_kind),
            None => write!(f, "CSRF token error: {:?}", self.error_kind),
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
            error_kind: ErrorKind::Malformed,
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Malformed,
        }
    }
}

/// Helper function to create token errors.
pub fn token_error(kind: ErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: kind,
    }
}
