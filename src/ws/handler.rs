//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::lobby::{LobbyHandle, PlayerConnection, PlayerId};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.lobby))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, lobby: LobbyHandle) {
    let (ws_sink, ws_stream) = socket.split();
    let (connection, outbound_rx) = PlayerConnection::new();

    let player_id = match lobby.connect(connection).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "Failed to register connection");
            return;
        }
    };

    info!(player_id = %player_id, "New WebSocket connection");

    // Writer task: lobby messages -> WebSocket
    let writer_handle = tokio::spawn(write_loop(player_id, ws_sink, outbound_rx));

    read_loop(player_id, ws_stream, &lobby).await;

    // Close the outbound side first so the lobby sees the connection as closed
    writer_handle.abort();
    let _ = writer_handle.await;

    if let Err(e) = lobby.disconnect(player_id).await {
        warn!(player_id = %player_id, error = %e, "Failed to report disconnect");
    }

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> lobby
async fn read_loop(player_id: PlayerId, mut ws_stream: SplitStream<WebSocket>, lobby: &LobbyHandle) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(msg) => {
                    if lobby.message(player_id, msg).await.is_err() {
                        debug!(player_id = %player_id, "Lobby closed");
                        break;
                    }
                }
                Err(e) => {
                    warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

async fn write_loop(
    player_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerMsg>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), SendError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("socket closed: {0}")]
    Socket(#[from] axum::Error),
}
