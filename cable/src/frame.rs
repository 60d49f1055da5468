//! Wire frames of the Action Cable protocol.

use serde::{Deserialize, Serialize};

use crate::error::{cable_error_from, Error, ErrorKind};

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Frame {
    Control(Control),
    /// A broadcast delivered to one subscription.
    Message { identifier: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    Welcome,
    ConfirmSubscription { identifier: String },
    RejectSubscription { identifier: String },
    /// Server heartbeat; `message` is the current unix time in seconds.
    Ping { message: i64 },
    /// Reply to a legacy `{type: "ping"}` command.
    Pong,
}

impl Frame {
    pub fn welcome() -> Self {
        Frame::Control(Control::Welcome)
    }

    pub fn confirm_subscription(identifier: impl Into<String>) -> Self {
        Frame::Control(Control::ConfirmSubscription {
            identifier: identifier.into(),
        })
    }

    pub fn reject_subscription(identifier: impl Into<String>) -> Self {
        Frame::Control(Control::RejectSubscription {
            identifier: identifier.into(),
        })
    }

    pub fn ping(unix_seconds: i64) -> Self {
        Frame::Control(Control::Ping {
            message: unix_seconds,
        })
    }

    pub fn pong() -> Self {
        Frame::Control(Control::Pong)
    }

    pub fn message(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Frame::Message {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| cable_error_from(ErrorKind::Serialization, e))
    }
}

/// Commands a client sends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Command(Command),
    Legacy(LegacyCommand),
}

/// Commands as sent by the Action Cable client library.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Subscribe {
        identifier: String,
    },
    Unsubscribe {
        identifier: String,
    },
    Message {
        identifier: String,
        #[serde(default)]
        data: Option<String>,
    },
}

/// The simplified command set older clients speak.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegacyCommand {
    Subscribe { stream: String },
    Unsubscribe { stream: String },
    Ping,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| cable_error_from(ErrorKind::InvalidCommand, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn as_value(frame: &Frame) -> Value {
        serde_json::from_str(&frame.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_control_frames_serialize_with_type() {
        assert_eq!(as_value(&Frame::welcome()), json!({"type": "welcome"}));
        assert_eq!(as_value(&Frame::pong()), json!({"type": "pong"}));
        assert_eq!(
            as_value(&Frame::confirm_subscription("id-1")),
            json!({"type": "confirm_subscription", "identifier": "id-1"})
        );
        assert_eq!(
            as_value(&Frame::reject_subscription("id-1")),
            json!({"type": "reject_subscription", "identifier": "id-1"})
        );
        assert_eq!(
            as_value(&Frame::ping(1700000000)),
            json!({"type": "ping", "message": 1700000000})
        );
    }

    #[test]
    fn test_message_frame_has_no_type() {
        assert_eq!(
            as_value(&Frame::message("id-1", "<p>hi</p>")),
            json!({"identifier": "id-1", "message": "<p>hi</p>"})
        );
    }

    #[test]
    fn test_parse_action_cable_commands() {
        let subscribe = Inbound::parse(r#"{"command":"subscribe","identifier":"{\"channel\":\"StreamsChannel\"}"}"#)
            .unwrap();
        assert_eq!(
            subscribe,
            Inbound::Command(Command::Subscribe {
                identifier: r#"{"channel":"StreamsChannel"}"#.to_string()
            })
        );

        let message =
            Inbound::parse(r#"{"command":"message","identifier":"x","data":"{}"}"#).unwrap();
        assert!(matches!(message, Inbound::Command(Command::Message { .. })));
    }

    #[test]
    fn test_parse_legacy_commands() {
        assert_eq!(
            Inbound::parse(r#"{"type":"ping"}"#).unwrap(),
            Inbound::Legacy(LegacyCommand::Ping)
        );
        assert_eq!(
            Inbound::parse(r#"{"type":"subscribe","stream":"posts"}"#).unwrap(),
            Inbound::Legacy(LegacyCommand::Subscribe {
                stream: "posts".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_commands() {
        for text in ["", "[]", r#"{"command":"dance"}"#, r#"{"type":"welcome"}"#] {
            let err = Inbound::parse(text).unwrap_err();
            assert_eq!(err.error_kind, ErrorKind::InvalidCommand, "{text:?}");
        }
    }
}
