use axum::extract::{
    State,
    ws::{self, WebSocket, WebSocketUpgrade},
};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::PlayerId;
use crate::realtime::{ClientMessage, ConnectionId, ServerMessage, client_message_from_ws_text};
use crate::state::AppState;

pub async fn ws_handler(
    ws_upgrade: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    tracing::info!("WebSocket: connection attempt");
    ws_upgrade.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn reject(ws_sender: &mut SplitSink<WebSocket, ws::Message>, message: String) {
    if let Ok(ws_msg) = ServerMessage::error(message).to_ws_text() {
        let _ = ws_sender.send(ws_msg).await;
    }
    let _ = ws_sender.close().await;
}

/// Reads the opening `JoinRoom` frame.
async fn await_join(
    ws_receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Result<(String, PlayerId), Option<String>> {
    let text = match ws_receiver.next().await {
        Some(Ok(ws::Message::Text(text))) => text,
        Some(Ok(other)) => {
            tracing::warn!(message = ?other, "WebSocket: non-text opening frame");
            return Err(Some(
                "Initial message must be a text JoinRoom message".to_string(),
            ));
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "WebSocket: error receiving opening frame");
            return Err(None);
        }
        None => {
            tracing::info!("WebSocket: client left before joining");
            return Err(None);
        }
    };

    match client_message_from_ws_text(&text) {
        Ok(ClientMessage::JoinRoom { game_id, player_id }) => Ok((game_id, player_id)),
        Ok(other) => {
            tracing::warn!(message = ?other, "WebSocket: opening frame was not JoinRoom");
            Err(Some(
                "Invalid initial message type. Expected JoinRoom.".to_string(),
            ))
        }
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket: malformed opening frame");
            Err(Some(format!("Invalid initial message format: {}", e)))
        }
    }
}

async fn handle_client_message(
    app_state: &AppState,
    connection_id: ConnectionId,
    game_id: &str,
    player_id: PlayerId,
    message: ClientMessage,
) -> bool {
    let dispatcher = &app_state.dispatcher;
    match message {
        ClientMessage::CastVote { target_player_id } => {
            match app_state
                .engine
                .cast_vote(game_id, player_id, target_player_id)
                .await
            {
                Ok(_) => {
                    dispatcher.broadcast(game_id).await;
                }
                Err(err) => dispatcher.send_error_to(connection_id, err.to_string()).await,
            }
        }
        ClientMessage::Protect { target_player_id } => {
            match app_state
                .engine
                .protect_player(game_id, player_id, target_player_id)
                .await
            {
                Ok(()) => {
                    dispatcher.broadcast(game_id).await;
                }
                Err(err) => dispatcher.send_error_to(connection_id, err.to_string()).await,
            }
        }
        ClientMessage::RequestState => {
            dispatcher.send_state_to(connection_id).await;
        }
        ClientMessage::JoinRoom { .. } => {
            dispatcher
                .send_error_to(connection_id, "Already joined a game on this connection")
                .await;
        }
        ClientMessage::LeaveRoom => {
            tracing::info!(connection.id = %connection_id, game.id = %game_id, player.id = %player_id, "Client left room");
            return false;
        }
    }
    true
}

#[tracing::instrument(skip(socket, app_state))]
pub async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (game_id, player_id) = match await_join(&mut ws_receiver).await {
        Ok(joined) => joined,
        Err(Some(reason)) => {
            reject(&mut ws_sender, reason).await;
            return;
        }
        Err(None) => {
            let _ = ws_sender.close().await;
            return;
        }
    };

    let connection_id: ConnectionId = Uuid::new_v4();
    let (to_client_tx, mut to_client_rx) =
        mpsc::channel::<ServerMessage>(app_state.client_buffer);

    if let Err(err) = app_state
        .dispatcher
        .join(connection_id, &game_id, player_id, to_client_tx)
        .await
    {
        tracing::info!(game.id = %game_id, player.id = %player_id, error = %err, "WebSocket: join refused");
        reject(&mut ws_sender, err.to_string()).await;
        return;
    }
    tracing::info!(connection.id = %connection_id, game.id = %game_id, player.id = %player_id, "WebSocket: joined room");

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = to_client_rx.recv().await {
            let ws_msg = match message.to_ws_text() {
                Ok(ws_msg) => ws_msg,
                Err(e) => {
                    tracing::error!(connection.id = %connection_id, error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if ws_sender.send(ws_msg).await.is_err() {
                tracing::info!(connection.id = %connection_id, "WebSocket send failed, client likely gone");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let recv_state = app_state.clone();
    let recv_game_id = game_id.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            match ws_receiver.next().await {
                Some(Ok(ws::Message::Text(text))) => match client_message_from_ws_text(&text) {
                    Ok(message) => {
                        let keep_going = handle_client_message(
                            &recv_state,
                            connection_id,
                            &recv_game_id,
                            player_id,
                            message,
                        )
                        .await;
                        if !keep_going {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(connection.id = %connection_id, error = %e, "Unparseable client frame");
                        recv_state
                            .dispatcher
                            .send_error_to(connection_id, format!("Invalid message: {}", e))
                            .await;
                    }
                },
                Some(Ok(ws::Message::Close(_))) => {
                    tracing::info!(connection.id = %connection_id, "WebSocket closed by client");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(connection.id = %connection_id, error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    app_state.dispatcher.handle_disconnect(connection_id).await;
    tracing::info!(connection.id = %connection_id, game.id = %game_id, player.id = %player_id, "WebSocket: disconnected");
}
