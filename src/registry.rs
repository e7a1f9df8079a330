//! Connection registry
//!
//! The authoritative mapping from user id to the single active connection.
//! Pure state: all access is serialized by the `RelayServer` actor, so no
//! locking happens here.

use std::collections::HashMap;

use tracing::error;

use crate::types::{ConnectionId, UserId};

/// Bidirectional user ↔ connection map
///
/// Invariants:
/// - at most one connection per user, and one user per connection
/// - `by_user` and `by_conn` always describe the same set of pairs
#[derive(Debug, Default)]
pub struct Registry {
    by_user: HashMap<UserId, ConnectionId>,
    by_conn: HashMap<ConnectionId, UserId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to `conn_id`
    ///
    /// Last registration wins in both directions: a previous connection for
    /// this user stops being addressable, and a previous user bound to this
    /// connection loses its entry. The displaced connection, if any, is
    /// returned; it is not notified.
    pub fn put(&mut self, user_id: UserId, conn_id: ConnectionId) -> Option<ConnectionId> {
        if let Some(old_user) = self.by_conn.remove(&conn_id) {
            if old_user != user_id {
                self.by_user.remove(&old_user);
            }
        }

        let displaced = self
            .by_user
            .insert(user_id.clone(), conn_id)
            .filter(|prev| *prev != conn_id);

        if let Some(prev) = displaced {
            self.by_conn.remove(&prev);
        }
        self.by_conn.insert(conn_id, user_id);

        displaced
    }

    /// Resolve a user to its live connection
    pub fn get(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.by_user.get(user_id).copied()
    }

    /// Reverse lookup: which user is bound to this connection
    pub fn user_of(&self, conn_id: ConnectionId) -> Option<&UserId> {
        self.by_conn.get(&conn_id)
    }

    /// Remove the entry bound to `conn_id`, if any
    ///
    /// Idempotent. Returns the user that was unbound.
    pub fn remove_by_conn(&mut self, conn_id: ConnectionId) -> Option<UserId> {
        let user_id = self.by_conn.remove(&conn_id)?;

        match self.by_user.get(&user_id) {
            Some(bound) if *bound == conn_id => {
                self.by_user.remove(&user_id);
                Some(user_id)
            }
            other => {
                error!(
                    "Registry inconsistency: connection {} mapped to '{}' but user maps to {:?}",
                    conn_id, user_id, other
                );
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}
