//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! event parsing, and bidirectional communication with the RelayServer.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientEvent, Envelope, ServerEvent};
use crate::server::ServerCommand;
use crate::types::ConnectionId;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers the connection with the
/// relay actor and pumps events both ways until either side closes.
/// `Disconnect` is sent exactly once on the way out.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    outbound_buffer: usize,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = ConnectionId::new();
    info!("Connection {} established from {}", connection_id, peer_addr);

    // Channel for relay -> client events
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(outbound_buffer);

    if cmd_tx
        .send(ServerCommand::Connect {
            connection_id,
            sender: event_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to open connection {} - relay closed", connection_id);
        return Err(AppError::ChannelSend);
    }

    // Tell the client its id; signaling peers see it as `from`
    let connected = ServerEvent::Connected {
        connection_id: connection_id.to_string(),
    };
    let json = serde_json::to_string(&connected)?;
    if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
        let _ = cmd_tx.send(ServerCommand::Disconnect { connection_id }).await;
        return Err(e.into());
    }

    let cmd_tx_read = cmd_tx.clone();

    // Read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        let cmd = client_event_to_command(connection_id, event);
                        if cmd_tx_read.send(cmd).await.is_err() {
                            debug!("Relay closed, ending read task for {}", connection_id);
                            break;
                        }
                    }
                    Err(e) => {
                        let e = AppError::from(e);
                        warn!("Dropping malformed event from {}: {}", connection_id, e);
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", connection_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", connection_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", connection_id);
                }
                Ok(_) => {
                    // Binary and raw frames carry no events
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", connection_id);
    });

    // Write task (ServerEvent -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                }
            }
        }
        debug!("Write task ended for connection");

        let _ = ws_sender.close().await;
    });

    let read_abort = read_task.abort_handle();
    let write_abort = write_task.abort_handle();

    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", connection_id);
            write_abort.abort();
        }
        _ = write_task => {
            debug!("Write task completed for {}", connection_id);
            read_abort.abort();
        }
    }

    let _ = cmd_tx
        .send(ServerCommand::Disconnect { connection_id })
        .await;

    info!("Connection {} disconnected", connection_id);

    Ok(())
}

/// Convert a parsed client event to a relay command
fn client_event_to_command(connection_id: ConnectionId, event: ClientEvent) -> ServerCommand {
    let envelope = match event {
        ClientEvent::Register(user_id) => {
            return ServerCommand::Register {
                connection_id,
                user_id,
            }
        }
        ClientEvent::SendMessage(m) => Envelope::Chat(m),
        ClientEvent::StartCall(c) => Envelope::CallStart(c),
        ClientEvent::Offer(p) => Envelope::Offer(p),
        ClientEvent::Answer(p) => Envelope::Answer(p),
        ClientEvent::IceCandidate(p) => Envelope::IceCandidate(p),
        ClientEvent::EndCall(p) => Envelope::EndCall(p),
    };
    ServerCommand::Relay {
        connection_id,
        envelope,
    }
}
