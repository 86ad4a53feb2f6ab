//! Voice relay WebSocket handler.
//!
//! Bridges one browser client socket to one dialogue-service socket. The
//! handler owns both sides for the session's lifetime: it opens the outbound
//! connection, runs the protocol handshake, gates client audio on handshake
//! completion, forwards service frames back untouched, and drives the orderly
//! teardown of whichever side outlives the other.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use super::messages::{VoiceIncomingMessage, VoiceMessageRoute, VoiceOutgoingMessage};
use crate::core::dialog::DialogClient;
use crate::state::AppState;

/// Channel buffer size for the client-socket sender task.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Close code sent when the mandatory `sessionId` query parameter is absent.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// How often the idle check wakes up.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Query parameters of the relay endpoint.
#[derive(Debug, Deserialize)]
pub struct VoiceQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Voice relay WebSocket handler.
///
/// `GET /api/voice/realtime?sessionId=...` — upgrades to WebSocket and pairs
/// the client with a fresh dialogue-service connection. A missing session id
/// is a policy violation: the socket is closed with code 1008 right after the
/// upgrade completes.
pub async fn voice_realtime_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<VoiceQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let session_id = query.session_id.filter(|sid| !sid.is_empty());
    info!(session_id = ?session_id, "voice relay connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            match session_id {
                Some(sid) => handle_voice_socket(socket, state, sid).await,
                None => reject_missing_session(socket).await,
            }
        })
}

/// Close an upgraded socket that arrived without a session id.
async fn reject_missing_session(mut socket: WebSocket) {
    warn!("rejecting voice relay connection without session id");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: "missing session id".into(),
        })))
        .await;
}

/// Run one relay session to completion.
async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>, session_id: String) {
    info!(%session_id, "voice relay connection established");
    state.calls.mark_active(&session_id);

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<VoiceMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task: the single writer to the client socket.
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, VoiceMessageRoute::Close);

            let result = match route {
                VoiceMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("failed to serialize outgoing message: {e}");
                        continue;
                    }
                },
                VoiceMessageRoute::Raw(data) => sender.send(Message::Binary(data)).await,
                VoiceMessageRoute::Close => sender.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                debug!("client socket send failed: {e}");
                break;
            }
            if should_close {
                break;
            }
        }
    });

    let dialog = Arc::new(DialogClient::new(
        state.config.dialog.clone(),
        session_id.clone(),
    ));

    // Service frames go back to the client untouched; decoding inside the
    // dialogue client is observational only.
    let tx = message_tx.clone();
    dialog
        .on_frame(Arc::new(move |raw, _parsed| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(VoiceMessageRoute::Raw(raw)).await;
            })
        }))
        .await;

    let tx = message_tx.clone();
    dialog
        .on_error(Arc::new(move |error| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx
                    .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::Error {
                        error: format!("dialogue service error: {error}"),
                    }))
                    .await;
            })
        }))
        .await;

    let tx = message_tx.clone();
    dialog
        .on_closed(Arc::new(move || {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx
                    .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::End))
                    .await;
            })
        }))
        .await;

    // Connect and run the handshake concurrently with the client loop, so
    // audio arriving mid-handshake is judged against the gate at arrival
    // time (and dropped), not buffered behind the handshake. On failure the
    // client gets an explicit error and the session never becomes ready.
    let handshake_task = {
        let dialog = dialog.clone();
        let message_tx = message_tx.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            match dialog.connect().await {
                Ok(()) => {
                    let _ = message_tx
                        .send(VoiceMessageRoute::Outgoing(
                            VoiceOutgoingMessage::Connected { session_id },
                        ))
                        .await;
                }
                Err(e) => {
                    warn!(%session_id, "dialogue session initialization failed: {e}");
                    let _ = message_tx
                        .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::Error {
                            error: format!("failed to reach dialogue service: {e}"),
                        }))
                        .await;
                }
            }
        })
    };

    let idle_timeout = Duration::from_secs(state.config.idle_timeout_secs);
    let mut last_activity = Instant::now();
    let mut client_errored = false;

    loop {
        select! {
            msg = receiver.next() => {
                last_activity = Instant::now();

                match msg {
                    Some(Ok(msg)) => {
                        if !process_client_message(&session_id, msg, &dialog, &message_tx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(%session_id, "client socket error: {e}");
                        client_errored = true;
                        break;
                    }
                    None => {
                        info!(%session_id, "client closed the connection");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(IDLE_CHECK_INTERVAL) => {
                if last_activity.elapsed().as_secs() > idle_timeout.as_secs() {
                    warn!(
                        %session_id,
                        idle_secs = last_activity.elapsed().as_secs(),
                        "closing idle voice relay session"
                    );
                    let _ = message_tx
                        .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::Error {
                            error: "connection closed due to inactivity".to_string(),
                        }))
                        .await;
                    let _ = message_tx.send(VoiceMessageRoute::Close).await;
                    break;
                }
                debug!(%session_id, "voice relay session idle check");
            }
        }
    }

    // Teardown. A client transport error closes the service connection
    // immediately; every other exit runs the orderly finish sequence. A
    // handshake still in flight is cancelled so no orphan connection
    // survives the session.
    handshake_task.abort();
    if client_errored {
        dialog.abort().await;
    } else if dialog.is_connected() {
        dialog.shutdown().await;
    } else {
        dialog.abort().await;
    }

    state.calls.mark_ended(&session_id);
    sender_task.abort();
    info!(%session_id, "voice relay session terminated");
}

/// Handle one message from the client socket. Returns `false` when the
/// session should end.
async fn process_client_message(
    session_id: &str,
    msg: Message,
    dialog: &DialogClient,
    message_tx: &mpsc::Sender<VoiceMessageRoute>,
) -> bool {
    match msg {
        Message::Binary(data) => {
            // Audio captured before the handshake completes is dropped, not
            // buffered: replaying stale audio after `connected` would be
            // worse than losing it.
            if dialog.is_connected() && dialog.is_ready() {
                if let Err(e) = dialog.forward(data).await {
                    warn!(%session_id, "failed to forward audio frame: {e}");
                }
            } else {
                warn!(%session_id, "dialogue session not ready, dropping audio frame");
            }
            true
        }
        Message::Text(text) => {
            match serde_json::from_str::<VoiceIncomingMessage>(&text) {
                Ok(VoiceIncomingMessage::Ping) => {
                    let _ = message_tx
                        .send(VoiceMessageRoute::Outgoing(VoiceOutgoingMessage::Pong))
                        .await;
                }
                // Unknown control messages are ignored so newer clients keep
                // working against this server.
                Err(_) => {
                    debug!(%session_id, "ignoring unhandled control message");
                }
            }
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(%session_id, "client sent close frame");
            false
        }
    }
}
