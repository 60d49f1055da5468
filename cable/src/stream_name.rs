//! Stream name codec for Turbo Streams subscriptions.
//!
//! A subscription identifier is the JSON object
//! `{"channel":"StreamsChannel","signed_stream_name":S}` where `S` is
//! `base64(JSON(stream name))`, optionally followed by `--<signature>`.
//!
//! The signature is never verified here. Stream names are not treated as an
//! access boundary; a deployment that gates private data by stream name must
//! add verification before subscribing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{cable_error, cable_error_from, Error, ErrorKind};

pub const STREAMS_CHANNEL: &str = "StreamsChannel";

const SIGNATURE_SEPARATOR: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub channel: String,
    pub signed_stream_name: String,
}

/// Encode a stream name without a signature.
pub fn encode_stream_name(name: &str) -> String {
    STANDARD.encode(Value::String(name.to_string()).to_string())
}

/// Encode a stream name followed by a signature suffix.
pub fn sign_stream_name(name: &str, signature: &str) -> String {
    format!("{}{SIGNATURE_SEPARATOR}{signature}", encode_stream_name(name))
}

/// Recover the stream name from a (possibly signed) encoded name.
///
/// Names that were encoded as JSON arrays come back joined with `:`.
pub fn decode_stream_name(signed: &str) -> Result<String, Error> {
    let encoded = signed
        .split_once(SIGNATURE_SEPARATOR)
        .map_or(signed, |(encoded, _signature)| encoded);

    let bytes = STANDARD.decode(encoded)?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| cable_error_from(ErrorKind::InvalidStreamName, e))?;

    match value {
        Value::String(name) => Ok(name),
        Value::Array(parts) => parts
            .into_iter()
            .map(|part| match part {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(cable_error(
                    ErrorKind::InvalidStreamName,
                    "stream name parts must be strings or numbers",
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|parts| parts.join(":")),
        _ => Err(cable_error(
            ErrorKind::InvalidStreamName,
            "stream name is not a string",
        )),
    }
}

/// The identifier a client would subscribe to `stream` with.
pub fn identifier_for(stream: &str) -> String {
    serde_json::json!({
        "channel": STREAMS_CHANNEL,
        "signed_stream_name": encode_stream_name(stream),
    })
    .to_string()
}

/// Decode a client identifier into the stream (channel) it names.
pub fn channel_from_identifier(identifier: &str) -> Result<String, Error> {
    let parsed: Identifier = serde_json::from_str(identifier)
        .map_err(|e| cable_error_from(ErrorKind::InvalidIdentifier, e))?;
    decode_stream_name(&parsed.signed_stream_name)
}
