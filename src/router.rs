//! Event router
//!
//! Stateless dispatch: validate an envelope, resolve its destination in the
//! registry and build the outbound event. Delivery itself happens in the
//! actor, after routing, so no registry access overlaps a send.

use tracing::{debug, warn};

use crate::message::{Envelope, ServerEvent};
use crate::registry::Registry;
use crate::types::ConnectionId;

/// A resolved outbound event
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub target: ConnectionId,
    pub event: ServerEvent,
}

/// Route one envelope from `sender`
///
/// Returns `None` when the envelope is malformed or its destination is not
/// registered. Both cases are silent drops: nothing is buffered, retried or
/// reported to the sender.
pub fn route(registry: &Registry, sender: ConnectionId, envelope: Envelope) -> Option<Delivery> {
    if let Err(e) = envelope.validate() {
        warn!("Dropping {} from {}: {}", envelope.kind(), sender, e);
        return None;
    }

    let Some(target) = registry.get(envelope.to()) else {
        debug!(
            "Dropping {} from {}: '{}' is not connected",
            envelope.kind(),
            sender,
            envelope.to()
        );
        return None;
    };

    let event = outbound_event(sender, envelope);
    Some(Delivery { target, event })
}

/// Attach sender identity and strip the destination
///
/// Only chat keeps the asserted `from`; every other event is stamped with
/// the sender's connection id.
fn outbound_event(sender: ConnectionId, envelope: Envelope) -> ServerEvent {
    let from = sender.to_string();
    match envelope {
        Envelope::Chat(m) => ServerEvent::ReceiveMessage {
            from: m.from,
            text: m.text,
            time: m.time,
        },
        Envelope::CallStart(c) => ServerEvent::IncomingCall {
            from,
            call_type: c.call_type,
            caller_name: c.caller_name,
        },
        Envelope::Offer(p) => ServerEvent::Offer { from, sdp: p.sdp },
        Envelope::Answer(p) => ServerEvent::Answer { from, sdp: p.sdp },
        Envelope::IceCandidate(p) => ServerEvent::IceCandidate {
            from,
            candidate: p.candidate,
        },
        Envelope::EndCall(_) => ServerEvent::CallEnded { from },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CallStart, ChatMessage, EndCallPayload, IceCandidatePayload, SdpPayload};
    use crate::types::UserId;
    use serde_json::json;

    fn registry_with(pairs: &[(&str, ConnectionId)]) -> Registry {
        let mut registry = Registry::new();
        for (user, conn) in pairs {
            registry.put(UserId::new(*user), *conn);
        }
        registry
    }

    #[test]
    fn test_chat_uses_asserted_from() {
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let registry = registry_with(&[("alice", alice), ("bob", bob)]);

        let delivery = route(
            &registry,
            alice,
            Envelope::Chat(ChatMessage {
                from: UserId::new("alice"),
                to: UserId::new("bob"),
                text: "hi".to_string(),
                time: json!(1700000000),
            }),
        )
        .unwrap();

        assert_eq!(
            delivery,
            Delivery {
                target: bob,
                event: ServerEvent::ReceiveMessage {
                    from: UserId::new("alice"),
                    text: "hi".to_string(),
                    time: json!(1700000000),
                },
            }
        );
    }

    #[test]
    fn test_call_start_uses_sender_connection_id() {
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let registry = registry_with(&[("alice", alice), ("bob", bob)]);

        let delivery = route(
            &registry,
            alice,
            Envelope::CallStart(CallStart {
                from: UserId::new("alice"),
                to: UserId::new("bob"),
                call_type: "video".to_string(),
                caller_name: "Alice".to_string(),
            }),
        )
        .unwrap();

        assert_eq!(delivery.target, bob);
        assert_eq!(
            delivery.event,
            ServerEvent::IncomingCall {
                from: alice.to_string(),
                call_type: "video".to_string(),
                caller_name: "Alice".to_string(),
            }
        );
    }

    #[test]
    fn test_signaling_uses_sender_connection_id() {
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let registry = registry_with(&[("alice", alice), ("bob", bob)]);
        let sdp = json!({"type": "offer", "sdp": "v=0"});
        let candidate = json!({"candidate": "candidate:0 1 UDP 2122252543 10.0.0.1 5000 typ host"});

        let offer = route(
            &registry,
            alice,
            Envelope::Offer(SdpPayload {
                to: UserId::new("bob"),
                sdp: sdp.clone(),
            }),
        )
        .unwrap();
        assert_eq!(offer.target, bob);
        assert_eq!(
            offer.event,
            ServerEvent::Offer {
                from: alice.to_string(),
                sdp: sdp.clone(),
            }
        );

        let answer = route(
            &registry,
            bob,
            Envelope::Answer(SdpPayload {
                to: UserId::new("alice"),
                sdp: sdp.clone(),
            }),
        )
        .unwrap();
        assert_eq!(answer.target, alice);
        assert_eq!(
            answer.event,
            ServerEvent::Answer {
                from: bob.to_string(),
                sdp,
            }
        );

        let ice = route(
            &registry,
            alice,
            Envelope::IceCandidate(IceCandidatePayload {
                to: UserId::new("bob"),
                candidate: candidate.clone(),
            }),
        )
        .unwrap();
        assert_eq!(
            ice.event,
            ServerEvent::IceCandidate {
                from: alice.to_string(),
                candidate,
            }
        );

        let end = route(
            &registry,
            alice,
            Envelope::EndCall(EndCallPayload {
                to: UserId::new("bob"),
            }),
        )
        .unwrap();
        assert_eq!(
            end.event,
            ServerEvent::CallEnded {
                from: alice.to_string(),
            }
        );
    }

    #[test]
    fn test_unreachable_destination_dropped() {
        let alice = ConnectionId::new();
        let registry = registry_with(&[("alice", alice)]);

        let delivery = route(
            &registry,
            alice,
            Envelope::Offer(SdpPayload {
                to: UserId::new("carol"),
                sdp: json!("v=0"),
            }),
        );

        assert!(delivery.is_none());
        assert_eq!(registry.get(&UserId::new("alice")), Some(alice));
    }

    #[test]
    fn test_malformed_envelope_dropped() {
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let registry = registry_with(&[("alice", alice), ("bob", bob)]);

        let delivery = route(
            &registry,
            alice,
            Envelope::IceCandidate(IceCandidatePayload {
                to: UserId::new("bob"),
                candidate: serde_json::Value::Null,
            }),
        );

        assert!(delivery.is_none());
    }
}
