//! Message protocol definitions
//!
//! JSON text frames shaped like socket.io emits: `{"event": ..., "data": ...}`.
//! Serde's adjacently tagged enums give type-safe parsing; adjacent tagging
//! is needed because `start_call` carries its own `type` field.
//!
//! `sdp`, `candidate` and `time` are opaque to the relay and kept as raw
//! JSON values so they are forwarded byte-for-byte in meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::types::UserId;

/// Client → Relay event
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this connection to a user id
    Register(UserId),
    /// Chat text for another user
    SendMessage(ChatMessage),
    /// Ask another user to start a call
    StartCall(CallStart),
    /// WebRTC SDP offer
    Offer(SdpPayload),
    /// WebRTC SDP answer
    Answer(SdpPayload),
    /// WebRTC ICE candidate
    #[serde(rename = "ice-candidate")]
    IceCandidate(IceCandidatePayload),
    /// Hang up a call with another user
    EndCall(EndCallPayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub from: UserId,
    pub to: UserId,
    pub text: String,
    #[serde(default)]
    pub time: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStart {
    pub from: UserId,
    pub to: UserId,
    #[serde(rename = "type")]
    pub call_type: String,
    pub caller_name: String,
}

/// Offer and answer share a shape
#[derive(Debug, Clone, Deserialize)]
pub struct SdpPayload {
    pub to: UserId,
    #[serde(default)]
    pub sdp: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IceCandidatePayload {
    pub to: UserId,
    #[serde(default)]
    pub candidate: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndCallPayload {
    pub to: UserId,
}

/// One relayable message instance, never persisted
#[derive(Debug, Clone)]
pub enum Envelope {
    Chat(ChatMessage),
    CallStart(CallStart),
    Offer(SdpPayload),
    Answer(SdpPayload),
    IceCandidate(IceCandidatePayload),
    EndCall(EndCallPayload),
}

impl Envelope {
    /// Destination user
    pub fn to(&self) -> &UserId {
        match self {
            Envelope::Chat(m) => &m.to,
            Envelope::CallStart(c) => &c.to,
            Envelope::Offer(p) | Envelope::Answer(p) => &p.to,
            Envelope::IceCandidate(p) => &p.to,
            Envelope::EndCall(p) => &p.to,
        }
    }

    /// Inbound event name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Chat(_) => "send_message",
            Envelope::CallStart(_) => "start_call",
            Envelope::Offer(_) => "offer",
            Envelope::Answer(_) => "answer",
            Envelope::IceCandidate(_) => "ice-candidate",
            Envelope::EndCall(_) => "end_call",
        }
    }

    /// Minimal presence check on required fields
    ///
    /// Payload contents are never interpreted beyond this.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.to().is_valid() {
            return Err(AppError::MissingField("to"));
        }
        match self {
            Envelope::Chat(m) => {
                if !m.from.is_valid() {
                    return Err(AppError::MissingField("from"));
                }
                if m.time.is_null() {
                    return Err(AppError::MissingField("time"));
                }
            }
            Envelope::CallStart(c) => {
                if !c.from.is_valid() {
                    return Err(AppError::MissingField("from"));
                }
            }
            Envelope::Offer(p) | Envelope::Answer(p) => {
                if p.sdp.is_null() {
                    return Err(AppError::MissingField("sdp"));
                }
            }
            Envelope::IceCandidate(p) => {
                if p.candidate.is_null() {
                    return Err(AppError::MissingField("candidate"));
                }
            }
            Envelope::EndCall(_) => {}
        }
        Ok(())
    }
}

/// Relay → Client event
///
/// `from` is the asserted user id for chat, and the sender's connection id
/// for call start, WebRTC signaling and hang-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake done, connection id issued
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    ReceiveMessage {
        from: UserId,
        text: String,
        time: Value,
    },
    IncomingCall {
        from: String,
        #[serde(rename = "type")]
        call_type: String,
        #[serde(rename = "callerName")]
        caller_name: String,
    },
    Offer {
        from: String,
        sdp: Value,
    },
    Answer {
        from: String,
        sdp: Value,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        from: String,
        candidate: Value,
    },
    /// The peer hung up or went away
    CallEnded {
        from: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<ClientEvent, serde_json::Error> {
        serde_json::from_value(value)
    }

    fn envelope(value: Value) -> Envelope {
        match parse(value).unwrap() {
            ClientEvent::Register(_) => panic!("register is not relayable"),
            ClientEvent::SendMessage(m) => Envelope::Chat(m),
            ClientEvent::StartCall(c) => Envelope::CallStart(c),
            ClientEvent::Offer(p) => Envelope::Offer(p),
            ClientEvent::Answer(p) => Envelope::Answer(p),
            ClientEvent::IceCandidate(p) => Envelope::IceCandidate(p),
            ClientEvent::EndCall(p) => Envelope::EndCall(p),
        }
    }

    #[test]
    fn test_register_deserialize() {
        let json = r#"{"event": "register", "data": "alice"}"#;
        let msg: ClientEvent = serde_json::from_str(json).unwrap();
        match msg {
            ClientEvent::Register(user_id) => assert_eq!(user_id, UserId::new("alice")),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_register_rejects_non_string_user_id() {
        assert!(parse(json!({"event": "register", "data": 42})).is_err());
        assert!(parse(json!({"event": "register", "data": {"userId": "alice"}})).is_err());
        assert!(parse(json!({"event": "register"})).is_err());
    }

    #[test]
    fn test_start_call_keeps_type_field() {
        let msg = parse(json!({
            "event": "start_call",
            "data": {"from": "alice", "to": "bob", "type": "video", "callerName": "Alice"}
        }))
        .unwrap();
        match msg {
            ClientEvent::StartCall(c) => {
                assert_eq!(c.call_type, "video");
                assert_eq!(c.caller_name, "Alice");
                assert_eq!(c.to, UserId::new("bob"));
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_ice_candidate_event_name() {
        let msg = parse(json!({
            "event": "ice-candidate",
            "data": {"to": "bob", "candidate": {"candidate": "candidate:1 1 udp", "sdpMid": "0"}}
        }))
        .unwrap();
        assert!(matches!(msg, ClientEvent::IceCandidate(_)));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(parse(json!({"event": "typing", "data": {"to": "bob"}})).is_err());
    }

    #[test]
    fn test_validate_missing_fields() {
        let offer = envelope(json!({"event": "offer", "data": {"to": "bob"}}));
        assert!(matches!(offer.validate(), Err(AppError::MissingField("sdp"))));

        let chat = envelope(json!({
            "event": "send_message",
            "data": {"from": "alice", "to": "", "text": "hi", "time": 1}
        }));
        assert!(matches!(chat.validate(), Err(AppError::MissingField("to"))));

        let chat = envelope(json!({
            "event": "send_message",
            "data": {"from": "alice", "to": "bob", "text": "hi"}
        }));
        assert!(matches!(chat.validate(), Err(AppError::MissingField("time"))));
    }

    #[test]
    fn test_validate_accepts_complete_envelope() {
        let answer = envelope(json!({
            "event": "answer",
            "data": {"to": "alice", "sdp": {"type": "answer", "sdp": "v=0"}}
        }));
        assert!(answer.validate().is_ok());
        assert_eq!(answer.kind(), "answer");
        assert_eq!(answer.to(), &UserId::new("alice"));
    }

    #[test]
    fn test_server_event_wire_format() {
        let cases = vec![
            (
                ServerEvent::Connected {
                    connection_id: "c-1".to_string(),
                },
                json!({"event": "connected", "data": {"connectionId": "c-1"}}),
            ),
            (
                ServerEvent::ReceiveMessage {
                    from: UserId::new("alice"),
                    text: "hi".to_string(),
                    time: json!(1700000000),
                },
                json!({
                    "event": "receive_message",
                    "data": {"from": "alice", "text": "hi", "time": 1700000000}
                }),
            ),
            (
                ServerEvent::IncomingCall {
                    from: "c-1".to_string(),
                    call_type: "audio".to_string(),
                    caller_name: "Alice".to_string(),
                },
                json!({
                    "event": "incoming_call",
                    "data": {"from": "c-1", "type": "audio", "callerName": "Alice"}
                }),
            ),
            (
                ServerEvent::Offer {
                    from: "c-1".to_string(),
                    sdp: json!({"type": "offer", "sdp": "v=0"}),
                },
                json!({
                    "event": "offer",
                    "data": {"from": "c-1", "sdp": {"type": "offer", "sdp": "v=0"}}
                }),
            ),
            (
                ServerEvent::Answer {
                    from: "c-2".to_string(),
                    sdp: json!("v=0"),
                },
                json!({"event": "answer", "data": {"from": "c-2", "sdp": "v=0"}}),
            ),
            (
                ServerEvent::IceCandidate {
                    from: "c-1".to_string(),
                    candidate: json!({"candidate": "candidate:1", "sdpMid": "0"}),
                },
                json!({
                    "event": "ice-candidate",
                    "data": {"from": "c-1", "candidate": {"candidate": "candidate:1", "sdpMid": "0"}}
                }),
            ),
            (
                ServerEvent::CallEnded {
                    from: "c-2".to_string(),
                },
                json!({"event": "call_ended", "data": {"from": "c-2"}}),
            ),
        ];

        for (event, expected) in cases {
            assert_eq!(serde_json::to_value(&event).unwrap(), expected);
        }
    }
}
