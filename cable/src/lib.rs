//! Real-time push over persistent connections, speaking the Action Cable
//! protocol so the stock Turbo/Action Cable client works unmodified.
//!
//! # Architecture
//!
//! - **Hub instance, not globals**: a [`BroadcastHub`] is created by the server
//!   and shared with connection handlers and broadcasters; tests build their own.
//! - **One lock per operation**: subscribe, unsubscribe, cleanup and the cleanup
//!   that follows a failed send each move the subscription maps together.
//! - **Sinks return errors**: a connection's outbound half is a [`FrameSink`];
//!   a failed send is an ordinary `Err` that triggers cleanup of that connection
//!   and nothing else.
//! - **Identifiers are echoed back**: every subscriber receives broadcasts under
//!   the exact identifier string it subscribed with.
//!
//! # Message Flow
//!
//! 1. Transport accepts a connection and calls [`BroadcastHub::connect`]; the
//!    client receives `{"type":"welcome"}`
//! 2. Client sends `{"command":"subscribe","identifier":"{...}"}`; the hub
//!    decodes the stream name and confirms with the same identifier
//! 3. Application code calls [`BroadcastHub::broadcast`] (or
//!    [`BroadcastHub::broadcast_action`]) with a stream name and HTML
//! 4. Each subscriber gets `{"identifier": <its identifier>, "message": html}`
//! 5. Transport reports disconnect, or a send fails: [`BroadcastHub::cleanup`]
//!
//! # Modules
//!
//! - `connection`: ConnectionId and the FrameSink transport seam
//! - `frame`: inbound commands and outbound frames
//! - `hub`: the subscription graph and fan-out
//! - `stream_name`: identifier and signed stream name codec
//! - `turbo_stream`: `<turbo-stream>` markup

pub mod connection;
pub mod error;
pub mod frame;
pub mod hub;
pub mod stream_name;
pub mod turbo_stream;

pub use connection::{ConnectionId, FrameSink, SendError};
pub use error::{Error, ErrorKind};
pub use frame::{Frame, Inbound};
pub use hub::BroadcastHub;
pub use turbo_stream::StreamAction;
