use axum::extract::ws::{CloseFrame, Message, WebSocket};
use cohort_core::auth::SessionIdentity;
use cohort_core::error::CoreError;
use cohort_core::rooms::{self, RoomRegistry};
use cohort_core::{history, message, receipts, AppState};
use cohort_models::gateway::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::payload::{self, GROUP_ID_MISSING, INVALID_DATA};
use crate::session::Session;

const HEARTBEAT_ACK_MSG: &str = r#"{"op":11}"#;
const PING_INTERVAL: Duration = Duration::from_secs(20);
const WIRE_PREVIEW_CHARS: usize = 256;

fn wire_preview(payload: &str) -> &str {
    match payload.char_indices().nth(WIRE_PREVIEW_CHARS) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}

fn wire_log_in(session: &Session, payload: &str) {
    tracing::debug!(
        target: "wire",
        direction = "in",
        user_id = session.user_id(),
        connection_id = %session.connection_id,
        bytes = payload.len(),
        payload_preview = wire_preview(payload),
        "client_frame"
    );
}

fn wire_log_out(session: &Session, payload: &str, frame_type: &str, event_type: Option<&str>) {
    tracing::debug!(
        target: "wire",
        direction = "out",
        user_id = session.user_id(),
        connection_id = %session.connection_id,
        frame_type,
        event_type = ?event_type,
        bytes = payload.len(),
        payload_preview = wire_preview(payload),
        "server_frame"
    );
}

async fn send_text_logged(
    sender: &mut (impl SinkExt<Message> + Unpin),
    session: &Session,
    payload: String,
    frame_type: &str,
    event_type: Option<&str>,
) -> Result<(), ()> {
    wire_log_out(session, &payload, frame_type, event_type);
    sender
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

async fn send_close(sender: &mut (impl SinkExt<Message> + Unpin), code: u16, reason: &str) {
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}

/// Leaves every room the connection joined when dropped, whichever way the
/// session ends.
struct RoomCleanup {
    rooms: Arc<RoomRegistry>,
    connection_id: Uuid,
    user_id: i64,
}

impl Drop for RoomCleanup {
    fn drop(&mut self) {
        let left = self.rooms.disconnect(self.connection_id);
        if !left.is_empty() {
            tracing::debug!(
                user_id = self.user_id,
                connection_id = %self.connection_id,
                groups = ?left,
                "connection left rooms on disconnect"
            );
        }
    }
}

pub async fn handle_connection(socket: WebSocket, state: AppState, identity: SessionIdentity) {
    let (mut sender, receiver) = socket.split();

    let _slot = match state.connections.try_acquire(identity.user_id) {
        Ok(slot) => slot,
        Err(limit) => {
            let (code, reason) = limit.close_frame();
            tracing::warn!(user_id = identity.user_id, ?limit, "gateway connection refused");
            send_close(&mut sender, code, reason).await;
            return;
        }
    };

    let session = Session::new(identity);
    state.rooms.register(session.connection_id, session.user_id());
    let _cleanup = RoomCleanup {
        rooms: state.rooms.clone(),
        connection_id: session.connection_id,
        user_id: session.user_id(),
    };
    tracing::info!(
        user_id = session.user_id(),
        connection_id = %session.connection_id,
        active = state.connections.active(),
        "gateway connection opened"
    );

    let hello = GatewayMessage {
        op: OP_HELLO,
        t: None,
        d: Some(json!({
            "heartbeat_interval": state.config.heartbeat_interval_ms,
            "connection_id": session.connection_id,
            "user_id": session.user_id().to_string(),
        })),
        s: None,
        ack: None,
    };
    let hello = match serde_json::to_string(&hello) {
        Ok(hello) => hello,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode hello");
            return;
        }
    };
    if send_text_logged(&mut sender, &session, hello, "hello", None)
        .await
        .is_err()
    {
        return;
    }

    run_session(sender, receiver, session, state).await;
}

async fn run_session(
    mut sender: impl SinkExt<Message> + Unpin,
    mut receiver: impl StreamExt<Item = Result<Message, axum::Error>> + Unpin,
    mut session: Session,
    state: AppState,
) {
    let mut event_rx = state.event_bus.subscribe();
    let heartbeat_timeout = Duration::from_millis(state.config.heartbeat_timeout_ms);
    let mut ws_ping_interval = tokio::time::interval(PING_INTERVAL);
    ws_ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let heartbeat_sleep = tokio::time::sleep(heartbeat_timeout);
    tokio::pin!(heartbeat_sleep);

    let (disconnect_reason, heartbeat_timed_out) = loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        wire_log_in(&session, text.as_str());
                        match handle_client_frame(text.as_str(), &mut sender, &session, &state).await {
                            FrameOutcome::Continue => {}
                            FrameOutcome::Heartbeat => {
                                heartbeat_sleep.as_mut().reset(Instant::now() + heartbeat_timeout);
                            }
                            FrameOutcome::SendFailed => {
                                break ("websocket send error".to_string(), false);
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break (
                            match frame {
                                Some(frame) => format!(
                                    "client close frame (code={}, reason={})",
                                    frame.code, frame.reason
                                ),
                                None => "client close frame (no code/reason)".to_string(),
                            },
                            false,
                        );
                    }
                    Some(Err(err)) => {
                        break (format!("websocket receive error: {err}"), false);
                    }
                    None => {
                        break ("websocket stream ended".to_string(), false);
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !session.should_receive_event(&event, &state.rooms) {
                            continue;
                        }
                        let dispatch = GatewayMessage {
                            op: OP_DISPATCH,
                            t: Some(event.event_type.clone()),
                            d: Some(event.payload),
                            s: Some(session.next_sequence()),
                            ack: None,
                        };
                        let Ok(text) = serde_json::to_string(&dispatch) else {
                            continue;
                        };
                        if send_text_logged(
                            &mut sender,
                            &session,
                            text,
                            "dispatch",
                            Some(event.event_type.as_str()),
                        )
                        .await
                        .is_err()
                        {
                            break ("websocket send error".to_string(), false);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            user_id = session.user_id(),
                            connection_id = %session.connection_id,
                            skipped,
                            "gateway event stream lagged; forcing reconnect"
                        );
                        send_close(&mut sender, 1013, "Gateway fell behind; reconnect required").await;
                        break (format!("event stream lagged by {skipped} events"), false);
                    }
                    Err(RecvError::Closed) => {
                        break ("event stream closed".to_string(), false);
                    }
                }
            }
            () = &mut heartbeat_sleep => {
                break (
                    format!("heartbeat timeout after {}ms", heartbeat_timeout.as_millis()),
                    true,
                );
            }
            _ = ws_ping_interval.tick() => {
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break ("websocket ping send error".to_string(), false);
                }
            }
            _ = state.shutdown.notified() => {
                send_close(&mut sender, 1001, "Server shutting down").await;
                break ("server shutdown".to_string(), false);
            }
        }
    };

    if heartbeat_timed_out {
        tracing::warn!(
            user_id = session.user_id(),
            connection_id = %session.connection_id,
            reason = %disconnect_reason,
            "gateway connection closed"
        );
    } else {
        tracing::info!(
            user_id = session.user_id(),
            connection_id = %session.connection_id,
            reason = %disconnect_reason,
            "gateway connection closed"
        );
    }
}

enum FrameOutcome {
    Continue,
    Heartbeat,
    SendFailed,
}

async fn handle_client_frame(
    text: &str,
    sender: &mut (impl SinkExt<Message> + Unpin),
    session: &Session,
    state: &AppState,
) -> FrameOutcome {
    let Ok(raw) = serde_json::from_str::<Value>(text) else {
        return FrameOutcome::Continue;
    };
    let ack_id = raw.get("ack").and_then(Value::as_u64);
    let frame = match serde_json::from_value::<GatewayMessage>(raw) {
        Ok(frame) => frame,
        Err(_) => return send_ack(sender, session, ack_id, AckPayload::failed(INVALID_DATA)).await,
    };

    match frame.op {
        OP_HEARTBEAT => {
            if send_text_logged(sender, session, HEARTBEAT_ACK_MSG.to_string(), "heartbeat_ack", None)
                .await
                .is_err()
            {
                return FrameOutcome::SendFailed;
            }
            FrameOutcome::Heartbeat
        }
        OP_ACTION => {
            let event = frame.t.unwrap_or_default();
            let d = frame.d.unwrap_or(Value::Null);
            match handle_action(&event, &d, session, state).await {
                Some(reply) => send_ack(sender, session, ack_id, reply).await,
                None => FrameOutcome::Continue,
            }
        }
        _ => send_ack(sender, session, ack_id, AckPayload::failed(INVALID_DATA)).await,
    }
}

async fn send_ack(
    sender: &mut (impl SinkExt<Message> + Unpin),
    session: &Session,
    ack_id: Option<u64>,
    reply: AckPayload,
) -> FrameOutcome {
    let Some(ack_id) = ack_id else {
        return FrameOutcome::Continue;
    };
    let frame = GatewayMessage {
        op: OP_ACK,
        t: None,
        d: serde_json::to_value(&reply).ok(),
        s: None,
        ack: Some(ack_id),
    };
    let Ok(text) = serde_json::to_string(&frame) else {
        return FrameOutcome::Continue;
    };
    match send_text_logged(sender, session, text, "ack", None).await {
        Ok(()) => FrameOutcome::Continue,
        Err(()) => FrameOutcome::SendFailed,
    }
}

/// Run one client action. `None` means the action never replies.
async fn handle_action(
    event: &str,
    d: &Value,
    session: &Session,
    state: &AppState,
) -> Option<AckPayload> {
    let identity = &session.identity;
    let connection_id = session.connection_id;

    let reply = match event {
        ACTION_JOIN_GROUP => {
            let Some(group_id) = payload::group_id(d) else {
                return Some(AckPayload::failed(GROUP_ID_MISSING));
            };
            match rooms::join_group(state, identity, connection_id, group_id).await {
                Ok(page) => {
                    let data = page
                        .and_then(|page| serde_json::to_value(page).ok())
                        .unwrap_or(Value::Null);
                    AckPayload::ok("joined", data)
                }
                Err(err) => failure(event, session, err),
            }
        }
        ACTION_LEAVE_GROUP => {
            let Some(group_id) = payload::group_id(d) else {
                return Some(AckPayload::failed(GROUP_ID_MISSING));
            };
            rooms::leave_group(state, identity, connection_id, group_id);
            AckPayload::ok("left", Value::Null)
        }
        ACTION_SEND_MESSAGE => {
            let request = match payload::send_message(d) {
                Ok(request) => request,
                Err(reason) => return Some(AckPayload::failed(reason)),
            };
            match message::send_message(
                state,
                identity,
                request.group_id,
                request.body.as_deref(),
                &request.attachments,
            )
            .await
            {
                Ok(sent) => match serde_json::to_value(&sent) {
                    Ok(data) => AckPayload::ok("sent", data),
                    Err(e) => failure(event, session, CoreError::Internal(e.to_string())),
                },
                Err(err) => failure(event, session, err),
            }
        }
        ACTION_TYPING => {
            if let Some(group_id) = payload::group_id(d) {
                rooms::send_typing(state, identity, connection_id, group_id);
            }
            return None;
        }
        ACTION_READ_MESSAGES => {
            let (group_id, message_ids) = match payload::read_messages(d) {
                Ok(parsed) => parsed,
                Err(reason) => return Some(AckPayload::failed(reason)),
            };
            match receipts::mark_read(state, identity, group_id, &message_ids).await {
                Ok(_) => AckPayload::ok("marked as read", Value::Null),
                Err(err) => failure(event, session, err),
            }
        }
        ACTION_FETCH_MESSAGES => {
            let (group_id, params) = match payload::fetch_messages(d) {
                Ok(parsed) => parsed,
                Err(reason) => return Some(AckPayload::failed(reason)),
            };
            match history::fetch_history(state, identity, group_id, &params).await {
                Ok(page) => match serde_json::to_value(&page) {
                    Ok(data) => AckPayload::ok("fetched", data),
                    Err(e) => failure(event, session, CoreError::Internal(e.to_string())),
                },
                Err(err) => failure(event, session, err),
            }
        }
        _ => AckPayload::failed(INVALID_DATA),
    };
    Some(reply)
}

fn failure(event: &str, session: &Session, err: CoreError) -> AckPayload {
    if err.is_server_error() {
        tracing::error!(
            error = %err,
            event,
            user_id = session.user_id(),
            connection_id = %session.connection_id,
            "gateway action failed"
        );
    } else {
        tracing::debug!(error = %err, event, user_id = session.user_id(), "gateway action rejected");
    }
    AckPayload::failed(err.client_message())
}
