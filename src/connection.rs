//! Connection struct definition
//!
//! Represents one live WebSocket and the channel feeding its write task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerEvent;
use crate::types::{ConnectionId, UserId};

/// Live connection information
///
/// Owned exclusively by the `RelayServer` actor.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Bound user (None before `register`)
    pub user_id: Option<UserId>,
    /// Relay → Client event channel
    pub sender: mpsc::Sender<ServerEvent>,
}

impl Connection {
    /// Create a new unbound connection with the given ID and sender channel
    pub fn new(id: ConnectionId, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            user_id: None,
            sender,
        }
    }

    /// Hand an event to this connection's write task
    ///
    /// Never waits: a full queue drops the event, so one slow receiver
    /// cannot stall the actor.
    pub fn deliver(&self, event: ServerEvent) -> Result<(), SendError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    pub fn is_registered(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn bind(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }
}
