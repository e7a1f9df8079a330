//! WebSocket Signaling Relay Library
//!
//! Tracks which user owns which live WebSocket and forwards typed events
//! (chat text, call start, SDP offers/answers, ICE candidates) between
//! users without persisting anything.
//!
//! # Features
//! - `register` binds a connection to a user id (last registration wins)
//! - 1:1 chat relay
//! - WebRTC call signaling relay
//! - Call phase tracking, with `call_ended` sent when a participant leaves
//! - Race-free cleanup on disconnect
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RelayServer` is the central actor owning the registry and connections
//! - Each connection has a `handler` task communicating with the relay
//! - No locks needed - all state access goes through message passing
//! - Delivery never waits on a receiver: a full outbound queue drops the event
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use signal_relay::{handle_connection, RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RelayConfig::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
//!
//!     tokio::spawn(RelayServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx, config.outbound_buffer));
//!     }
//! }
//! ```

pub mod call;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use call::{CallPhase, CallTracker};
pub use config::RelayConfig;
pub use connection::Connection;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ClientEvent, Envelope, ServerEvent};
pub use registry::Registry;
pub use router::{route, Delivery};
pub use server::{RelayServer, ServerCommand};
pub use types::{ConnectionId, UserId};
