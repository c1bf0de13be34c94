// Read-only observer sockets.

use super::frames::{
    Inbound, LoopControl, classify, close_socket, forward_outbound, send_close_with_reason,
    send_message,
};
use crate::interface_adapters::protocol::ServerMessage;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::conn_id;
use crate::use_cases::AdmissionError;

use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span};

/// Upgrades first and reports refusals over the socket, so browsers see the reason.
pub async fn spectate_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let limit = state.transport_max_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| {
            let span = info_span!("spectator", conn_id = conn_id(), %session_id);
            watch_session(socket, state, session_id).instrument(span)
        })
}

async fn watch_session(mut socket: WebSocket, state: Arc<AppState>, session_id: String) {
    let (outbox, mut inbox) = mpsc::channel(state.outbox_capacity);
    let admitted = match state.registry.get_session(&session_id).await {
        Some(handle) => match handle.spectate(outbox).await {
            Ok(spectator_id) => Ok((handle, spectator_id)),
            Err(e) => Err(e),
        },
        None => Err(AdmissionError::NotFound),
    };

    let (handle, spectator_id) = match admitted {
        Ok(admitted) => admitted,
        Err(reason) => {
            info!(%reason, "spectator refused");
            let _ = send_message(&mut socket, &ServerMessage::error(reason.to_string())).await;
            let _ =
                send_close_with_reason(&mut socket, close_code::NORMAL, "spectate refused").await;
            return;
        }
    };
    info!(spectator_id, "spectator connected");

    let mut msgs_out = 0u64;
    let mut bytes_out = 0u64;
    let mut close_frame: Option<CloseFrame> = None;

    loop {
        let disconnect = tokio::select! {
            incoming = socket.recv() => {
                match classify(incoming, state.max_frame_bytes) {
                    // Spectators have no controls; anything well-formed is ignored.
                    Inbound::Message { .. } | Inbound::Skip => false,
                    Inbound::Closed => true,
                    Inbound::Reject { code, reason } => {
                        close_frame = Some(CloseFrame { code, reason: reason.into() });
                        true
                    }
                }
            }

            outbound = inbox.recv() => {
                match outbound {
                    Some(message) => matches!(
                        forward_outbound(&message, &mut socket, &mut msgs_out, &mut bytes_out).await,
                        LoopControl::Disconnect
                    ),
                    None => {
                        close_frame = Some(CloseFrame {
                            code: close_code::NORMAL,
                            reason: "session closed".into(),
                        });
                        true
                    }
                }
            }
        };

        if disconnect {
            close_socket(&mut socket, close_frame.take()).await;
            break;
        }
    }

    handle.stop_watching(spectator_id).await;
    debug!(msgs_out, bytes_out, "spectator stats");
    info!(spectator_id, "spectator disconnected");
}
