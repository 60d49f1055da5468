use std::fmt;

use tokio::sync::mpsc::UnboundedSender;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The transport refused a frame; the connection behind it should be treated as gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError(pub String);

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send failed: {}", self.0)
    }
}

impl std::error::Error for SendError {}

/// The outbound half of a persistent connection.
///
/// `send_frame` must not block; transports with real I/O queue the frame and
/// write it from their own task.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: String) -> Result<(), SendError>;
}

impl FrameSink for UnboundedSender<String> {
    fn send_frame(&self, frame: String) -> Result<(), SendError> {
        self.send(frame)
            .map_err(|_| SendError("receiver dropped".to_string()))
    }
}
