//! Call state tracking
//!
//! Follows each call between two users through Ringing → Connected → Ended.
//! Tracking is observational only: the router relays signaling regardless
//! of phase, this just keeps the picture needed to end calls on disconnect.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::types::UserId;

/// Phase of a live call
///
/// `Ended` calls are removed rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Ringing,
    Connected,
}

/// Unordered pair of participants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey(UserId, UserId);

impl CallKey {
    fn new(a: &UserId, b: &UserId) -> Self {
        if a.as_str() <= b.as_str() {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    fn involves(&self, user: &UserId) -> bool {
        &self.0 == user || &self.1 == user
    }

    fn peer_of(&self, user: &UserId) -> &UserId {
        if &self.0 == user {
            &self.1
        } else {
            &self.0
        }
    }
}

#[derive(Debug, Default)]
pub struct CallTracker {
    calls: HashMap<CallKey, CallPhase>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `start_call` rings the callee; a repeated start re-rings
    pub fn start(&mut self, caller: &UserId, callee: &UserId) {
        self.calls.insert(CallKey::new(caller, callee), CallPhase::Ringing);
        info!("Call {} -> {} ringing", caller, callee);
    }

    /// `answer` connects a ringing call
    pub fn answer(&mut self, answerer: &UserId, caller: &UserId) {
        match self.calls.get_mut(&CallKey::new(answerer, caller)) {
            Some(phase) if *phase == CallPhase::Ringing => {
                *phase = CallPhase::Connected;
                info!("Call {} <-> {} connected", caller, answerer);
            }
            Some(_) => {
                debug!("Renegotiation answer between {} and {}", answerer, caller);
            }
            None => {
                debug!("Answer from {} to {} with no ringing call", answerer, caller);
            }
        }
    }

    /// Explicit hang-up; returns whether a call existed
    pub fn end(&mut self, a: &UserId, b: &UserId) -> bool {
        let ended = self.calls.remove(&CallKey::new(a, b)).is_some();
        if ended {
            info!("Call {} <-> {} ended", a, b);
        }
        ended
    }

    /// End every call `user` takes part in, returning the remote peers
    pub fn end_all_for(&mut self, user: &UserId) -> Vec<UserId> {
        let mut peers = Vec::new();
        self.calls.retain(|key, _| {
            if key.involves(user) {
                peers.push(key.peer_of(user).clone());
                false
            } else {
                true
            }
        });
        if !peers.is_empty() {
            info!("Ended {} call(s) for departed user {}", peers.len(), user);
        }
        peers
    }

    pub fn phase(&self, a: &UserId, b: &UserId) -> Option<CallPhase> {
        self.calls.get(&CallKey::new(a, b)).copied()
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }
}
