//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! message parsing, and bidirectional communication with the RelayHub.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::directory::{PresenceWriter, UserDirectory};
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::{HubCommand, RelayHub};
use crate::types::ClientId;

/// Start the RelayHub actor and return its command channel
pub fn spawn_hub(config: &Config, directory: Arc<dyn UserDirectory>) -> mpsc::Sender<HubCommand> {
    let presence = PresenceWriter::spawn(directory, config.persist_queue, config.persist_timeout);
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    tokio::spawn(RelayHub::new(cmd_rx, presence).run());
    cmd_tx
}

/// Accept connections forever, one handler task per connection
pub async fn serve(listener: TcpListener, config: Config, directory: Arc<dyn UserDirectory>) {
    let cmd_tx = spawn_hub(&config, directory);
    info!("RelayHub actor started");

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let client_buffer = config.client_buffer;

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, client_buffer).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle. Exactly one `Disconnect` is
/// sent to the hub once the session has been registered.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<HubCommand>,
    client_buffer: usize,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    // Channel for hub -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(client_buffer);

    // Queue the greeting before registering so it is always first
    msg_tx
        .try_send(ServerMessage::Connected {
            client_id: client_id.to_string(),
        })
        .map_err(|_| AppError::ChannelSend)?;

    if cmd_tx
        .send(HubCommand::Connect {
            client_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - hub closed", client_id);
        return Err(AppError::ChannelSend);
    }

    let cmd_tx_read = cmd_tx.clone();

    // Read task (WebSocket -> HubCommand)
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let cmd = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => client_message_to_command(client_id, client_msg),
                        Err(e) => {
                            warn!("Invalid JSON from {}: {}", client_id, e);
                            HubCommand::Malformed { client_id, error: e }
                        }
                    };
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Hub closed, ending read task for {}", client_id);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", client_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", client_id);
                }
                Ok(_) => {
                    // Binary or raw frames - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Write task (ServerMessage -> WebSocket)
    // Ends when the hub drops the sender (logout or disconnect).
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for {}", client_id);

        let _ = ws_sender.close().await;
    });

    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }

    let _ = cmd_tx.send(HubCommand::Disconnect { client_id }).await;

    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Convert a ClientMessage to a HubCommand
fn client_message_to_command(client_id: ClientId, msg: ClientMessage) -> HubCommand {
    match msg {
        ClientMessage::Join { user_id } => HubCommand::Join { client_id, user_id },
        ClientMessage::Send { to, message } => HubCommand::Send {
            client_id,
            to,
            message,
        },
        ClientMessage::Logout { user_id } => HubCommand::Logout { client_id, user_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::UserId;

    #[test]
    fn test_client_message_to_command() {
        let client_id = ClientId::new();
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"send","to":"bob","message":"hi"}"#).unwrap();

        match client_message_to_command(client_id, msg) {
            HubCommand::Send { client_id: id, to, message } => {
                assert_eq!(id, client_id);
                assert_eq!(to, UserId::from("bob"));
                assert_eq!(message, serde_json::json!("hi"));
            }
            other => panic!("Wrong command: {:?}", other),
        }
    }
}
