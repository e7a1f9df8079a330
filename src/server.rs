//! RelayServer Actor implementation
//!
//! The connection lifecycle manager. It owns every piece of mutable state:
//! live connections, the user registry, per-user groups and call phases.
//! Handlers reach it only through `ServerCommand`s, so the command channel
//! is the single serialization point for register, relay and disconnect.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::call::CallTracker;
use crate::connection::Connection;
use crate::error::{AppError, SendError};
use crate::message::{Envelope, ServerEvent};
use crate::registry::Registry;
use crate::router::{self, Delivery};
use crate::types::{ConnectionId, UserId};

/// Commands sent from handlers to the RelayServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// WebSocket handshake completed
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    },
    /// Bind the connection to a user id
    Register {
        connection_id: ConnectionId,
        user_id: UserId,
    },
    /// Forward an envelope to its destination user
    Relay {
        connection_id: ConnectionId,
        envelope: Envelope,
    },
    /// Transport closed
    Disconnect {
        connection_id: ConnectionId,
    },
}

/// Call phase change implied by a relayed envelope
enum CallUpdate {
    Start { caller: UserId, callee: UserId },
    Answer { answerer: UserId, caller: UserId },
    End { from: UserId, to: UserId },
}

/// The main RelayServer actor
pub struct RelayServer {
    /// All live connections: ConnectionId -> Connection
    connections: HashMap<ConnectionId, Connection>,
    /// Routable users: UserId <-> ConnectionId
    registry: Registry,
    /// Per-user broadcast groups joined on register
    groups: HashMap<UserId, HashSet<ConnectionId>>,
    /// Phase of each call between two users
    calls: CallTracker,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl RelayServer {
    /// Create a new RelayServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            connections: HashMap::new(),
            registry: Registry::new(),
            groups: HashMap::new(),
            calls: CallTracker::new(),
            receiver,
        }
    }

    /// Run the RelayServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("RelayServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("RelayServer shutting down");
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn calls(&self) -> &CallTracker {
        &self.calls
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections that joined the group named after `user_id`
    pub fn group_members(&self, user_id: &UserId) -> Option<&HashSet<ConnectionId>> {
        self.groups.get(user_id)
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                connection_id,
                sender,
            } => {
                self.handle_connect(connection_id, sender);
            }
            ServerCommand::Register {
                connection_id,
                user_id,
            } => {
                self.handle_register(connection_id, user_id);
            }
            ServerCommand::Relay {
                connection_id,
                envelope,
            } => {
                self.handle_relay(connection_id, envelope);
            }
            ServerCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id);
            }
        }
    }

    /// Handle new connection: allocate it unbound
    fn handle_connect(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<ServerEvent>) {
        info!("Connection {} opened", connection_id);
        let connection = Connection::new(connection_id, sender);
        self.connections.insert(connection_id, connection);
        debug!(
            "Total connections: {}, Registered users: {}",
            self.connections.len(),
            self.registry.len()
        );
    }

    /// Handle `register`: last registration wins for both user and connection
    fn handle_register(&mut self, connection_id: ConnectionId, user_id: UserId) {
        if !user_id.is_valid() {
            warn!(
                "Ignoring register from {}: {}",
                connection_id,
                AppError::InvalidUserId
            );
            return;
        }

        let Some(connection) = self.connections.get_mut(&connection_id) else {
            debug!("Register from unknown connection {}", connection_id);
            return;
        };

        // A connection belongs to one user group at a time
        let previous = connection
            .user_id
            .take()
            .filter(|previous| *previous != user_id);
        connection.bind(user_id.clone());

        if let Some(previous) = previous {
            leave_group(&mut self.groups, &previous, connection_id);

            // Moving off a user id this connection owned takes its calls down
            if self.registry.get(&previous) == Some(connection_id) {
                self.end_calls_for(&previous, connection_id);
            }
        }

        if let Some(displaced) = self.registry.put(user_id.clone(), connection_id) {
            info!(
                "User '{}' re-registered on {}; {} is no longer addressable",
                user_id, connection_id, displaced
            );
        } else {
            info!("User '{}' registered on {}", user_id, connection_id);
        }

        self.groups
            .entry(user_id)
            .or_default()
            .insert(connection_id);
    }

    /// Handle a relayable envelope
    fn handle_relay(&mut self, connection_id: ConnectionId, envelope: Envelope) {
        if !self.connections.contains_key(&connection_id) {
            debug!(
                "Dropping {} from closed connection {}",
                envelope.kind(),
                connection_id
            );
            return;
        }

        let update = self.call_update(connection_id, &envelope);

        let Some(Delivery { target, event }) = router::route(&self.registry, connection_id, envelope)
        else {
            return;
        };

        if let Some(update) = update {
            self.apply_call_update(update);
        }

        self.deliver(target, event);
    }

    /// Handle transport closure
    ///
    /// Idempotent: a second call, or one for an unknown id, is a no-op.
    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.remove(&connection_id) else {
            debug!("Connection {} already cleaned up", connection_id);
            return;
        };

        info!("Connection {} closed", connection_id);

        if let Some(user_id) = &connection.user_id {
            leave_group(&mut self.groups, user_id, connection_id);
        }

        // Only the current owner of a user id takes its calls down with it
        if let Some(user_id) = self.registry.remove_by_conn(connection_id) {
            info!("User '{}' unregistered", user_id);
            self.end_calls_for(&user_id, connection_id);
        }

        debug!(
            "Total connections: {}, Registered users: {}",
            self.connections.len(),
            self.registry.len()
        );
    }

    /// End every call `user_id` is in and tell the reachable peers
    fn end_calls_for(&mut self, user_id: &UserId, connection_id: ConnectionId) {
        for peer in self.calls.end_all_for(user_id) {
            if let Some(target) = self.registry.get(&peer) {
                self.deliver(
                    target,
                    ServerEvent::CallEnded {
                        from: connection_id.to_string(),
                    },
                );
            }
        }
    }

    /// Hand an event to a resolved connection without waiting on it
    fn deliver(&mut self, target: ConnectionId, event: ServerEvent) {
        let Some(connection) = self.connections.get(&target) else {
            error!("Registry points at unknown connection {}", target);
            self.registry.remove_by_conn(target);
            return;
        };

        match connection.deliver(event) {
            Ok(()) => {}
            Err(SendError::QueueFull) => {
                warn!("Dropping event for {}: {}", target, SendError::QueueFull);
            }
            Err(SendError::ChannelClosed) => {
                debug!("Connection {} is gone, cleaning up", target);
                self.handle_disconnect(target);
            }
        }
    }

    fn call_update(&self, connection_id: ConnectionId, envelope: &Envelope) -> Option<CallUpdate> {
        // Calls are keyed by the sender's registered id, never the asserted `from`
        let sender = self.registry.user_of(connection_id).cloned();
        match envelope {
            Envelope::CallStart(c) => sender.map(|caller| CallUpdate::Start {
                caller,
                callee: c.to.clone(),
            }),
            Envelope::Answer(p) => sender.map(|answerer| CallUpdate::Answer {
                answerer,
                caller: p.to.clone(),
            }),
            Envelope::EndCall(p) => sender.map(|from| CallUpdate::End {
                from,
                to: p.to.clone(),
            }),
            _ => None,
        }
    }

    fn apply_call_update(&mut self, update: CallUpdate) {
        match update {
            CallUpdate::Start { caller, callee } => self.calls.start(&caller, &callee),
            CallUpdate::Answer { answerer, caller } => self.calls.answer(&answerer, &caller),
            CallUpdate::End { from, to } => {
                self.calls.end(&from, &to);
            }
        }
    }
}

fn leave_group(
    groups: &mut HashMap<UserId, HashSet<ConnectionId>>,
    group: &UserId,
    connection_id: ConnectionId,
) {
    if let Some(members) = groups.get_mut(group) {
        members.remove(&connection_id);
        if members.is_empty() {
            groups.remove(group);
        }
    }
}
