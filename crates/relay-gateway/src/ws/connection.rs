use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use relay_core::config::{HANDSHAKE_TIMEOUT_MS, HEARTBEAT_INTERVAL_SECS, MAX_WS_PAYLOAD_BYTES};
use relay_core::types::{ConnId, UserId};
use relay_protocol::{
    frames::{EventFrame, InboundFrame, ResFrame},
    handshake::ConnectParams,
    methods::CONNECT,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::{dispatch, handshake};

/// WS connection state machine.
///
/// AwaitingConnect → Authenticated → (runs until close) → Closing.
/// Handshake must complete within HANDSHAKE_TIMEOUT_MS or the connection drops.
enum ConnState {
    AwaitingConnect,
    Authenticated(UserId),
    Closing,
}

/// Axum handler — upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// Per-connection task — lives for the entire WS session lifetime.
async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ConnId::new();
    info!(conn_id = %conn_id, "new WS connection");

    let (mut tx, mut rx) = socket.split();

    let mut conn_state = ConnState::AwaitingConnect;
    let mut event_rx: Option<tokio::sync::mpsc::Receiver<EventFrame>> = None;

    let handshake_deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(HANDSHAKE_TIMEOUT_MS);
    let mut handshake_timer = Box::pin(tokio::time::sleep_until(handshake_deadline));

    let mut tick_interval = tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_ref: &str = &text;
                        if text_ref.len() > MAX_WS_PAYLOAD_BYTES {
                            warn!(conn_id = %conn_id, size = text_ref.len(), "payload too large, dropping connection");
                            break;
                        }
                        let (new_state, new_rx) = process_message(&conn_id, text_ref, conn_state, &mut tx, &state).await;
                        conn_state = new_state;
                        if let Some(rx) = new_rx {
                            event_rx = Some(rx);
                        }
                        if matches!(conn_state, ConnState::Closing) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }

            // room events forwarded from the presence registry
            event = async {
                match event_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending::<Option<EventFrame>>().await,
                }
            } => {
                if let Some(frame) = event {
                    let json = serde_json::to_string(&frame).unwrap_or_default();
                    if tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                } else {
                    break;
                }
            }

            _ = tick_interval.tick() => {
                if matches!(conn_state, ConnState::Authenticated(_)) {
                    let tick = EventFrame::new("tick", serde_json::json!({ "ts": chrono::Utc::now().to_rfc3339() }));
                    let json = serde_json::to_string(&tick).unwrap_or_default();
                    if tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }

            _ = &mut handshake_timer => {
                if matches!(conn_state, ConnState::AwaitingConnect) {
                    warn!(conn_id = %conn_id, "handshake timeout, closing connection");
                    break;
                }
            }
        }
    }

    state.presence.detach(&conn_id);
    info!(conn_id = %conn_id, "WS connection closed");
}

/// Handle a single inbound text frame. Returns the new connection state and,
/// on a successful handshake, the event receiver the main loop should start
/// forwarding from.
async fn process_message(
    conn_id: &ConnId,
    text: &str,
    state: ConnState,
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    app: &Arc<AppState>,
) -> (ConnState, Option<tokio::sync::mpsc::Receiver<EventFrame>>) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "malformed frame, ignoring");
            return (state, None);
        }
    };

    match state {
        ConnState::AwaitingConnect => {
            let Some(req) = frame.as_req() else {
                return (ConnState::AwaitingConnect, None);
            };

            if req.method != CONNECT {
                let res = ResFrame::err(&req.id, "PROTOCOL_ERROR", "must authenticate first");
                let _ = send_json(tx, &res).await;
                return (ConnState::AwaitingConnect, None);
            }

            let params: ConnectParams = match req.params.and_then(|p| serde_json::from_value(p).ok()) {
                Some(p) => p,
                None => {
                    let res = ResFrame::err(&req.id, "PROTOCOL_ERROR", "invalid connect params");
                    let _ = send_json(tx, &res).await;
                    return (ConnState::Closing, None);
                }
            };

            match handshake::verify_auth(&params, &app.config) {
                Ok(user_id) => {
                    let (_sender, event_rx) = app.presence.attach(conn_id.clone(), user_id.clone());
                    auto_join_known_conversations(app, conn_id, &user_id);

                    let hello = handshake::hello_ok_payload(&user_id);
                    let res = ResFrame::ok(&req.id, hello);
                    let _ = send_json(tx, &res).await;
                    info!(conn_id = %conn_id, %user_id, "client authenticated");
                    (ConnState::Authenticated(user_id), Some(event_rx))
                }
                Err(reason) => {
                    warn!(conn_id = %conn_id, %reason, "auth failed");
                    let res = ResFrame::err(&req.id, "AUTH_INVALID", &reason);
                    let _ = send_json(tx, &res).await;
                    (ConnState::Closing, None)
                }
            }
        }

        ConnState::Authenticated(user_id) => {
            if let Some(req) = frame.as_req() {
                let res = dispatch::handle_req(app, conn_id, &user_id, &req.id, &req.method, req.params).await;
                let _ = send_json(tx, &res).await;
            }
            (ConnState::Authenticated(user_id), None)
        }

        ConnState::Closing => (ConnState::Closing, None),
    }
}

/// A freshly attached connection has no room memberships yet beyond its
/// private user room — join it to every conversation it already has history
/// in so `chat:new-message`/`chat:delivery` from other devices or the bot
/// pipeline reach it without an explicit client-side "join" call (the wire
/// protocol has none; membership is inferred from the message history).
fn auto_join_known_conversations(app: &Arc<AppState>, conn_id: &ConnId, user_id: &UserId) {
    match app.messages.recent_per_peer(user_id) {
        Ok(peers) => {
            for peer in peers {
                if let Err(err) = app.presence.join(conn_id, peer.conversation_id) {
                    warn!(conn_id = %conn_id, %err, "failed to auto-join known conversation");
                }
            }
        }
        Err(err) => warn!(conn_id = %conn_id, %err, "failed to list known conversations for auto-join"),
    }
}

/// Serialize and send a frame over the WS sink.
async fn send_json<T: serde::Serialize>(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).unwrap_or_default();
    tx.send(Message::Text(json.into())).await.map_err(axum::Error::new)
}
