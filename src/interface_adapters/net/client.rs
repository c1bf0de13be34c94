use super::frames::{
    Inbound, LoopControl, NetError, classify, close_socket, forward_outbound,
    send_close_with_reason, send_message,
};
use crate::interface_adapters::protocol::{
    ClientMessage, ServerMessage, SessionOptions, pilot_name,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::conn_id;
use crate::use_cases::{AdmissionError, JoinTicket, Outbound, Outbox, SessionHandle, SessionKind};

use axum::{
    extract::{
        State,
        ws::{CloseFrame, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, info, info_span, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let limit = state.transport_max_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Separate connection id for correlating logs before a slot exists.
    let span = info_span!(
        "conn",
        conn_id = conn_id(),
        session_id = tracing::field::Empty,
        slot_id = tracing::field::Empty
    );
    serve_pilot(socket, state).instrument(span).await
}

async fn serve_pilot(mut socket: WebSocket, state: Arc<AppState>) {
    let mut ctx = match bootstrap_connection(&mut socket, &state).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeHandshake) => {
            info!("client disconnected before handshake");
            return;
        }
        Err(e) => {
            warn!(error = ?e, "handshake failed");
            return;
        }
    };

    let span = Span::current();
    span.record("session_id", &*ctx.ticket.session_id);
    span.record("slot_id", ctx.ticket.slot_id.0);
    info!(kind = ?ctx.handle.kind, "pilot connected");

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

struct ConnCtx {
    pub handle: SessionHandle,
    pub ticket: JoinTicket,
    // Messages the session addressed to this pilot.
    pub inbox: mpsc::Receiver<Arc<Outbound>>,
    pub max_frame_bytes: usize,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub last_ignored_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    match timeout(state.handshake_timeout, read_handshake(socket, state)).await {
        Ok(result) => result,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "handshake timeout").await;
            Err(NetError::HandshakeTimeout)
        }
    }
}

/// Waits for `start`, `create_room` or `join_room`.
///
/// Refusals (unknown room, room full, server busy) are reported with an `error` message and
/// the connection keeps waiting for another attempt.
async fn read_handshake(socket: &mut WebSocket, state: &AppState) -> Result<ConnCtx, NetError> {
    let mut msgs_in = 0u64;
    let mut bytes_in = 0u64;

    loop {
        let incoming = socket.recv().await;
        let message = match classify(incoming, state.max_frame_bytes) {
            Inbound::Message { message, bytes } => {
                msgs_in += 1;
                bytes_in += bytes as u64;
                message
            }
            Inbound::Skip => continue,
            Inbound::Closed => return Err(NetError::ClosedBeforeHandshake),
            Inbound::Reject { code, reason } => {
                let _ = send_close_with_reason(socket, code, reason).await;
                return Err(NetError::ProtocolViolation(reason));
            }
        };

        // A fresh queue per attempt; a refused attempt drops its sender with the reply.
        let (outbox, inbox) = mpsc::channel(state.outbox_capacity);
        let admitted = match message {
            ClientMessage::Start(options) => {
                open_session(state, options, SessionKind::Solo, outbox).await
            }
            ClientMessage::CreateRoom(options) => {
                open_session(state, options, SessionKind::Room, outbox).await
            }
            ClientMessage::JoinRoom {
                room_id,
                player_name,
            } => join_room(state, &room_id, pilot_name(player_name), outbox).await,
            ClientMessage::Ping => {
                send_message(socket, &ServerMessage::Pong).await?;
                continue;
            }
            ClientMessage::Input { .. } => {
                debug!("input before handshake ignored");
                continue;
            }
            ClientMessage::StartGame => {
                send_message(socket, &ServerMessage::error("not in a game room")).await?;
                continue;
            }
        };

        match admitted {
            Ok((handle, ticket)) => {
                return Ok(ConnCtx {
                    handle,
                    ticket,
                    inbox,
                    max_frame_bytes: state.max_frame_bytes,
                    msgs_in,
                    msgs_out: 0,
                    bytes_in,
                    bytes_out: 0,
                    last_ignored_log: Instant::now() - LOG_THROTTLE,
                    close_frame: None,
                });
            }
            Err(reason) => {
                info!(%reason, "handshake refused");
                send_message(socket, &ServerMessage::error(reason)).await?;
            }
        }
    }
}

async fn open_session(
    state: &AppState,
    options: SessionOptions,
    kind: SessionKind,
    outbox: Outbox,
) -> Result<(SessionHandle, JoinTicket), String> {
    let (config, name) = options.into_config(kind);
    state
        .registry
        .create_session(config, name, outbox)
        .await
        .map_err(|e| e.to_string())
}

async fn join_room(
    state: &AppState,
    room_id: &str,
    name: String,
    outbox: Outbox,
) -> Result<(SessionHandle, JoinTicket), String> {
    let handle = state
        .registry
        .get_session(room_id.trim())
        .await
        .ok_or(AdmissionError::NotFound)
        .map_err(|e| e.to_string())?;
    match handle.join(name, outbox).await {
        Ok(ticket) => Ok((handle, ticket)),
        Err(e) => Err(e.to_string()),
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let max_frame_bytes = ctx.max_frame_bytes;
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                let inbound = classify(incoming, max_frame_bytes);
                match handle_incoming_ws(socket, inbound, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing Session Message
            outbound = ctx.inbox.recv() => {
                match outbound {
                    Some(message) => {
                        match forward_outbound(&message, socket, &mut ctx.msgs_out, &mut ctx.bytes_out).await {
                            LoopControl::Continue => false,
                            LoopControl::Disconnect => true,
                        }
                    }
                    None => {
                        // The session ended or dropped this pilot for falling behind.
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::NORMAL,
                            reason: "session closed".into(),
                        });
                        true
                    }
                }
            }
        };

        if disconnect {
            close_socket(socket, ctx.close_frame.take()).await;
            break;
        }
    }

    disconnect_cleanup(ctx).await;

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    inbound: Inbound,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let message = match inbound {
        Inbound::Message { message, bytes } => {
            ctx.msgs_in += 1;
            ctx.bytes_in += bytes as u64;
            message
        }
        Inbound::Skip => return Ok(LoopControl::Continue),
        Inbound::Closed => {
            info!("websocket closed");
            return Ok(LoopControl::Disconnect);
        }
        Inbound::Reject { code, reason } => {
            ctx.close_frame = Some(CloseFrame {
                code,
                reason: reason.into(),
            });
            return Ok(LoopControl::Disconnect);
        }
    };

    match message {
        ClientMessage::Input { action } => {
            ctx.ticket.intent.apply(action.into());
        }
        ClientMessage::StartGame => {
            if !ctx.handle.start(ctx.ticket.slot_id).await {
                debug!("start_game after session ended");
            }
        }
        ClientMessage::Ping => {
            let bytes = send_message(socket, &ServerMessage::Pong).await?;
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
        }
        ClientMessage::Start(_) | ClientMessage::CreateRoom(_) | ClientMessage::JoinRoom { .. } => {
            if should_log(&mut ctx.last_ignored_log) {
                warn!("handshake repeated on an active connection");
            }
            send_message(socket, &ServerMessage::error("already in a game session")).await?;
        }
    }
    Ok(LoopControl::Continue)
}

async fn disconnect_cleanup(ctx: &ConnCtx) {
    ctx.handle.leave(ctx.ticket.slot_id).await;

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        "connection stats"
    );
    info!("pilot disconnected");
}
