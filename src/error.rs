//! Error types for the relay
//!
//! Defines application-level errors and envelope delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Fatal errors end the connection. Payload errors are only logged:
/// the relay never reports them back to the sender.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A required envelope field is absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// `register` carried an empty user id
    #[error("Invalid user id")]
    InvalidUserId,
}

/// Envelope delivery errors
///
/// Occurs when handing an outbound event to a connection's write task.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound queue is full
    #[error("Outbound queue full")]
    QueueFull,
}
