//! WebSocket HTTP handler for the web layer.
//!
//! This module contains only the Axum handler and the heartbeat task.
//! Subscription state and the Action Cable protocol live in the `cable` crate.

pub mod handler;

/// Subprotocol the Action Cable client offers.
pub const CABLE_PROTOCOL: &str = "actioncable-v1-json";
