use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use buzzline_core::error::RoomError;
use buzzline_core::room::Room;
use buzzline_core::snapshot::{RoomSnapshot, SnapshotRole, build_snapshot};
use buzzline_core::time::now_ms;

use crate::commands;
use crate::connections::{CONNECTION_BUFFER, ConnectionRole, FrameSender};
use crate::state::AppState;

/// Messages a client may send. A connection must register exactly once
/// before anything else.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Register {
        role: ConnectionRole,
        #[serde(default)]
        host_secret: Option<String>,
        #[serde(default)]
        player_id: Option<String>,
    },
    Buzz,
}

/// Messages the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Registered {
        role: ConnectionRole,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
    },
    State {
        payload: RoomSnapshot,
    },
    Error {
        message: String,
    },
}

/// Serialize an error frame. Built from a `json!` value so it cannot fail.
pub(crate) fn error_frame(message: &str) -> String {
    serde_json::json!({ "type": "error", "message": message }).to_string()
}

/// Role-aware state frames for a broadcast: one for hosts, one for players.
pub(crate) fn state_frames(room: &Room) -> Option<(String, String)> {
    let host = ServerFrame::State {
        payload: build_snapshot(room, SnapshotRole::Host),
    };
    let player = ServerFrame::State {
        payload: build_snapshot(room, SnapshotRole::Player),
    };
    match (serde_json::to_string(&host), serde_json::to_string(&player)) {
        (Ok(host_frame), Ok(player_frame)) => Some((host_frame, player_frame)),
        _ => {
            tracing::error!(room = %room.code, "Failed to encode state frames");
            None
        },
    }
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_code))
}

struct Registration {
    connection_id: u64,
    role: ConnectionRole,
    player_id: Option<String>,
}

async fn handle_socket(socket: WebSocket, state: AppState, room_code: String) {
    let (ws_sender, mut ws_receiver) = socket.split();

    // All outbound traffic goes through a bounded channel so broadcasts
    // never write to the socket under a room lock.
    let (tx, rx) = mpsc::channel::<String>(CONNECTION_BUFFER);
    spawn_writer(ws_sender, rx);

    let mut registration: Option<Registration> = None;

    while let Some(Ok(message)) = ws_receiver.next().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let frame = match serde_json::from_str::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(_) => {
                send_frame(&tx, error_frame("Invalid message")).await;
                continue;
            },
        };

        match frame {
            ClientFrame::Register { .. } if registration.is_some() => {
                send_frame(&tx, error_frame("Already registered")).await;
            },
            ClientFrame::Register {
                role,
                host_secret,
                player_id,
            } => match register(&state, &room_code, role, host_secret, player_id, &tx).await {
                Ok(reg) => registration = Some(reg),
                Err(e) => {
                    send_frame(&tx, error_frame(&e.to_string())).await;
                    break;
                },
            },
            ClientFrame::Buzz => match &registration {
                None => send_frame(&tx, error_frame("Register first")).await,
                Some(reg) => match (reg.role, reg.player_id.as_deref()) {
                    (ConnectionRole::Player, Some(player_id)) => {
                        if let Err(e) = commands::buzz(&state, &room_code, player_id).await {
                            send_frame(&tx, error_frame(&e.to_string())).await;
                        }
                    },
                    _ => send_frame(&tx, error_frame("Only players can buzz")).await,
                },
            },
        }
    }

    // Disconnect drops only the connection; the player record stays. The
    // room goes away once it has neither players nor connections.
    if let Some(reg) = registration
        && let Ok(entry) = state.registry.get(&room_code).await
    {
        entry.connections.lock().await.remove(reg.connection_id);
        state.registry.remove_if_empty(&room_code).await;
        tracing::debug!(room = %room_code, role = ?reg.role, "Connection closed");
    }
}

/// Authenticate and attach a connection: hosts by secret, players by a known
/// player id. On success the connection receives `registered` followed by an
/// initial role-aware `state` frame.
async fn register(
    state: &AppState,
    room_code: &str,
    role: ConnectionRole,
    host_secret: Option<String>,
    player_id: Option<String>,
    tx: &FrameSender,
) -> Result<Registration, RoomError> {
    let entry = state.registry.get(room_code).await?;

    // The attach and the first two frames happen under the room lock, so no
    // concurrent transition can slip a broadcast in front of `registered`
    // or between the initial snapshot and the attach. The channel is fresh,
    // so `try_send` cannot find it full.
    let connection_id = {
        let mut room = entry.room.lock().await;
        let snapshot_role = match role {
            ConnectionRole::Host => {
                let secret = host_secret
                    .as_deref()
                    .ok_or_else(|| RoomError::Validation("hostSecret is required".into()))?;
                room.verify_host_secret(secret)?;
                SnapshotRole::Host
            },
            ConnectionRole::Player => {
                let id = player_id
                    .as_deref()
                    .ok_or_else(|| RoomError::Validation("playerId is required".into()))?;
                room.player(id)?;
                SnapshotRole::Player
            },
        };
        room.clear_expired_share(now_ms());

        let connection_id = entry
            .connections
            .lock()
            .await
            .add(role, player_id.clone(), tx.clone());

        if let Ok(frame) = serde_json::to_string(&ServerFrame::Registered {
            role,
            player_id: player_id.clone(),
        }) {
            let _ = tx.try_send(frame);
        }
        if let Ok(frame) = serde_json::to_string(&ServerFrame::State {
            payload: build_snapshot(&room, snapshot_role),
        }) {
            let _ = tx.try_send(frame);
        }
        connection_id
    };

    tracing::info!(room = %room_code, role = ?role, "Connection registered");
    Ok(Registration {
        connection_id,
        role,
        player_id,
    })
}

async fn send_frame(tx: &FrameSender, frame: String) {
    let _ = tx.send(frame).await;
}

fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<String>) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        // Channel closed: the room dropped this connection or was destroyed.
        let _ = ws_sender.send(Message::Close(None)).await;
    });
}
