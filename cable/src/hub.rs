use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::*;

use crate::connection::{ConnectionId, FrameSink, SendError};
use crate::error::{cable_error, Error, ErrorKind};
use crate::frame::{Command, Frame, Inbound, LegacyCommand};
use crate::stream_name::{channel_from_identifier, identifier_for};
use crate::turbo_stream::{self, StreamAction};

pub type ChannelName = String;

/// Subscription state. Every mutation goes through one lock so the maps never
/// disagree: a connection is in `channels[c]` iff `c` is in its
/// `subscriptions` iff its `identifiers` has key `c`. Empty sets are pruned.
#[derive(Default)]
struct Graph {
    connections: HashMap<ConnectionId, Arc<dyn FrameSink>>,
    channels: HashMap<ChannelName, HashSet<ConnectionId>>,
    subscriptions: HashMap<ConnectionId, HashSet<ChannelName>>,
    identifiers: HashMap<ConnectionId, HashMap<ChannelName, String>>,
}

impl Graph {
    fn insert(&mut self, connection_id: &ConnectionId, channel: &str, identifier: String) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(connection_id.clone());
        self.subscriptions
            .entry(connection_id.clone())
            .or_default()
            .insert(channel.to_string());
        self.identifiers
            .entry(connection_id.clone())
            .or_default()
            .insert(channel.to_string(), identifier);
    }

    fn remove(&mut self, connection_id: &ConnectionId, channel: &str) -> bool {
        let removed = match self.subscriptions.get_mut(connection_id) {
            Some(channels) => {
                let removed = channels.remove(channel);
                if channels.is_empty() {
                    self.subscriptions.remove(connection_id);
                }
                removed
            }
            None => false,
        };

        if let Some(identifiers) = self.identifiers.get_mut(connection_id) {
            identifiers.remove(channel);
            if identifiers.is_empty() {
                self.identifiers.remove(connection_id);
            }
        }

        self.prune_channel_member(channel, connection_id);
        removed
    }

    fn remove_connection(&mut self, connection_id: &ConnectionId) -> bool {
        let had_sink = self.connections.remove(connection_id).is_some();
        let channels = self.subscriptions.remove(connection_id).unwrap_or_default();
        self.identifiers.remove(connection_id);

        for channel in &channels {
            self.prune_channel_member(channel, connection_id);
        }

        had_sink || !channels.is_empty()
    }

    fn prune_channel_member(&mut self, channel: &str, connection_id: &ConnectionId) {
        if let Some(members) = self.channels.get_mut(channel) {
            members.remove(connection_id);
            if members.is_empty() {
                self.channels.remove(channel);
            }
        }
    }
}

struct Delivery {
    connection_id: ConnectionId,
    sink: Arc<dyn FrameSink>,
    identifier: String,
}

/// Channel subscriptions over persistent connections, speaking the Action
/// Cable wire protocol.
///
/// One hub is owned by the server and shared (behind an `Arc`) with every
/// connection handler and every broadcaster. No lock is held while a frame is
/// handed to a sink.
pub struct BroadcastHub {
    graph: Mutex<Graph>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            graph: Mutex::new(Graph::default()),
        }
    }

    fn graph(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection and greet it with a `welcome` frame.
    pub fn connect<S>(&self, sink: S) -> ConnectionId
    where
        S: FrameSink + 'static,
    {
        let connection_id = ConnectionId::new();
        self.graph()
            .connections
            .insert(connection_id.clone(), Arc::new(sink));
        info!("Registered cable connection {connection_id}");

        let _ = self.send(&connection_id, &Frame::welcome());
        connection_id
    }

    /// Apply one inbound text frame from `connection_id`.
    pub fn handle_message(&self, connection_id: &ConnectionId, text: &str) -> Result<(), Error> {
        let inbound = match Inbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Ignoring malformed cable command from {connection_id}: {e}");
                return Err(e);
            }
        };

        match inbound {
            Inbound::Command(Command::Subscribe { identifier }) => {
                match self.subscribe(connection_id, &identifier) {
                    Ok(_) => Ok(()),
                    Err(e) if e.error_kind == ErrorKind::UnknownConnection => Err(e),
                    Err(e) => {
                        warn!("Rejecting subscription from {connection_id}: {e}");
                        let _ = self.send(connection_id, &Frame::reject_subscription(identifier));
                        Err(e)
                    }
                }
            }
            Inbound::Command(Command::Unsubscribe { identifier }) => {
                let channel = channel_from_identifier(&identifier)?;
                self.unsubscribe(connection_id, &channel);
                Ok(())
            }
            Inbound::Command(Command::Message { identifier, .. }) => {
                debug!("Ignoring client message on {identifier} from {connection_id}");
                Ok(())
            }
            Inbound::Legacy(LegacyCommand::Subscribe { stream }) => {
                self.subscribe_stream(connection_id, &stream).map(|_| ())
            }
            Inbound::Legacy(LegacyCommand::Unsubscribe { stream }) => {
                self.unsubscribe(connection_id, &stream);
                Ok(())
            }
            Inbound::Legacy(LegacyCommand::Ping) => {
                let _ = self.send(connection_id, &Frame::pong());
                Ok(())
            }
        }
    }

    /// Subscribe with a client-supplied identifier and confirm it verbatim.
    ///
    /// Returns the channel the identifier names.
    pub fn subscribe(
        &self,
        connection_id: &ConnectionId,
        identifier: &str,
    ) -> Result<ChannelName, Error> {
        let channel = channel_from_identifier(identifier)?;
        self.register(connection_id, &channel, identifier.to_string())?;
        let _ = self.send(connection_id, &Frame::confirm_subscription(identifier));
        Ok(channel)
    }

    /// Subscribe to a stream by its plain name, as legacy clients do.
    ///
    /// Returns the identifier stored for (and confirmed to) the connection.
    pub fn subscribe_stream(
        &self,
        connection_id: &ConnectionId,
        stream: &str,
    ) -> Result<String, Error> {
        let identifier = identifier_for(stream);
        self.register(connection_id, stream, identifier.clone())?;
        let _ = self.send(connection_id, &Frame::confirm_subscription(identifier.clone()));
        Ok(identifier)
    }

    fn register(
        &self,
        connection_id: &ConnectionId,
        channel: &str,
        identifier: String,
    ) -> Result<(), Error> {
        let mut graph = self.graph();
        if !graph.connections.contains_key(connection_id) {
            return Err(cable_error(
                ErrorKind::UnknownConnection,
                &format!("connection {connection_id} is not registered"),
            ));
        }
        graph.insert(connection_id, channel, identifier);
        debug!("Connection {connection_id} subscribed to {channel}");
        Ok(())
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, connection_id: &ConnectionId, channel: &str) -> bool {
        let removed = self.graph().remove(connection_id, channel);
        if removed {
            debug!("Connection {connection_id} unsubscribed from {channel}");
        }
        removed
    }

    /// Remove a connection from every structure.
    ///
    /// Safe to call repeatedly and for connections that were never registered;
    /// returns whether anything was removed.
    pub fn cleanup(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.graph().remove_connection(connection_id);
        if removed {
            info!("Cleaned up cable connection {connection_id}");
        }
        removed
    }

    /// Send `html` to every subscriber of `channel`, each under its own identifier.
    ///
    /// A failed send cleans up that connection only. Returns the number of
    /// connections the frame was handed to.
    pub fn broadcast(&self, channel: &str, html: &str) -> usize {
        let deliveries: Vec<Delivery> = {
            let graph = self.graph();
            let Some(members) = graph.channels.get(channel) else {
                debug!("Broadcast to {channel} has no subscribers");
                return 0;
            };
            members
                .iter()
                .filter_map(|connection_id| {
                    let sink = graph.connections.get(connection_id)?;
                    let identifier = graph
                        .identifiers
                        .get(connection_id)
                        .and_then(|ids| ids.get(channel))
                        .cloned()
                        .unwrap_or_else(|| identifier_for(channel));
                    Some(Delivery {
                        connection_id: connection_id.clone(),
                        sink: Arc::clone(sink),
                        identifier,
                    })
                })
                .collect()
        };

        let mut delivered = 0;
        for delivery in deliveries {
            let frame = match Frame::message(delivery.identifier, html).to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize broadcast frame: {e}");
                    continue;
                }
            };
            match delivery.sink.send_frame(frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to deliver broadcast on {channel} to connection {}: {e}. Cleaning up.",
                        delivery.connection_id
                    );
                    self.cleanup(&delivery.connection_id);
                }
            }
        }

        debug!("Broadcast on {channel} delivered to {delivered} connection(s)");
        delivered
    }

    /// Broadcast a rendered `<turbo-stream>` element.
    pub fn broadcast_action(
        &self,
        channel: &str,
        action: StreamAction,
        target: &str,
        html: &str,
    ) -> usize {
        self.broadcast(channel, &turbo_stream::render(action, target, html))
    }

    /// Send a heartbeat `ping` to every connection, cleaning up the ones that fail.
    pub fn ping_all(&self, unix_seconds: i64) -> usize {
        let targets: Vec<ConnectionId> = self.graph().connections.keys().cloned().collect();
        let frame = Frame::ping(unix_seconds);
        targets
            .iter()
            .filter(|connection_id| self.send(connection_id, &frame).is_ok())
            .count()
    }

    /// Send one frame to one connection; on failure the connection is cleaned up.
    pub fn send(&self, connection_id: &ConnectionId, frame: &Frame) -> Result<(), SendError> {
        let sink = self
            .graph()
            .connections
            .get(connection_id)
            .map(Arc::clone)
            .ok_or_else(|| SendError(format!("connection {connection_id} is not registered")))?;

        let json = frame.to_json().map_err(|e| SendError(e.to_string()))?;
        sink.send_frame(json).inspect_err(|e| {
            warn!("Failed to send to connection {connection_id}: {e}. Cleaning up.");
            self.cleanup(connection_id);
        })
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.graph().connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.graph().connections.len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.graph().channels.get(channel).map_or(0, HashSet::len)
    }

    pub fn channel_count(&self) -> usize {
        self.graph().channels.len()
    }

    /// Channels `connection_id` is subscribed to, sorted.
    pub fn channels_for(&self, connection_id: &ConnectionId) -> Vec<ChannelName> {
        let mut channels: Vec<ChannelName> = self
            .graph()
            .subscriptions
            .get(connection_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// The identifier `connection_id` subscribed to `channel` with.
    pub fn identifier(&self, connection_id: &ConnectionId, channel: &str) -> Option<String> {
        self.graph()
            .identifiers
            .get(connection_id)
            .and_then(|ids| ids.get(channel))
            .cloned()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
