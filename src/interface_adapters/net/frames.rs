// Frame-level helpers shared by pilot and spectator sockets.

use crate::interface_adapters::protocol::{ClientMessage, ServerMessage};
use crate::use_cases::Outbound;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::SinkExt;
use tracing::{debug, warn};

#[derive(Debug)]
pub(super) enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    HandshakeTimeout,
    ClosedBeforeHandshake,
    #[allow(dead_code)]
    ProtocolViolation(&'static str),
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub(super) enum LoopControl {
    Continue,
    Disconnect,
}

/// One classified read from the socket.
pub(super) enum Inbound {
    Message {
        message: ClientMessage,
        bytes: usize,
    },
    // Control frames with nothing to act on.
    Skip,
    // The frame breaks the protocol; close with this code and reason.
    Reject {
        code: u16,
        reason: &'static str,
    },
    Closed,
}

pub(super) fn classify(
    incoming: Option<Result<Message, axum::Error>>,
    max_frame_bytes: usize,
) -> Inbound {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            let bytes = text.len();
            if bytes > max_frame_bytes {
                warn!(bytes, limit = max_frame_bytes, "oversized client frame");
                return Inbound::Reject {
                    code: close_code::SIZE,
                    reason: "message too large",
                };
            }
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => Inbound::Message { message, bytes },
                Err(e) => {
                    warn!(bytes, error = %e, "failed to parse client message");
                    Inbound::Reject {
                        code: close_code::POLICY,
                        reason: "invalid message",
                    }
                }
            }
        }
        Some(Ok(Message::Binary(_))) => Inbound::Reject {
            code: close_code::UNSUPPORTED,
            reason: "binary messages not supported",
        },
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Inbound::Skip,
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Err(e)) => {
            debug!(error = %e, "websocket recv error");
            Inbound::Closed
        }
    }
}

pub(super) async fn send_message(
    socket: &mut WebSocket,
    msg: &ServerMessage,
) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

/// Writes one session message; a failed write ends the connection.
pub(super) async fn forward_outbound(
    outbound: &Outbound,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    match send_message(socket, &ServerMessage::from(outbound)).await {
        Ok(bytes) => {
            *msgs_out += 1;
            *bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send session message");
            LoopControl::Disconnect
        }
    }
}

pub(super) async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

/// Sends the pending close frame (if any) and closes the socket.
pub(super) async fn close_socket(socket: &mut WebSocket, frame: Option<CloseFrame>) {
    if let Some(frame) = frame {
        let _ = socket.send(Message::Close(Some(frame))).await;
    }
    if let Err(err) = socket.close().await.map_err(NetError::Ws) {
        debug!(error = ?err, "socket close error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> Option<Result<Message, axum::Error>> {
        Some(Ok(Message::Text(body.to_string().into())))
    }

    #[test]
    fn when_frame_is_valid_json_then_it_is_decoded() {
        match classify(text(r#"{"type":"ping"}"#), 4096) {
            Inbound::Message { message, bytes } => {
                assert!(matches!(message, ClientMessage::Ping));
                assert_eq!(bytes, 15);
            }
            _ => panic!("expected a decoded message"),
        }
    }

    #[test]
    fn when_frame_is_malformed_then_it_is_rejected_with_policy() {
        match classify(text("{nope"), 4096) {
            Inbound::Reject { code, .. } => assert_eq!(code, close_code::POLICY),
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn when_frame_exceeds_the_limit_then_it_is_rejected_before_parsing() {
        let body = format!(r#"{{"type":"ping","pad":"{}"}}"#, "x".repeat(64));
        match classify(text(&body), 32) {
            Inbound::Reject { code, .. } => assert_eq!(code, close_code::SIZE),
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn when_frame_is_binary_then_it_is_unsupported() {
        let incoming = Some(Ok(Message::Binary(vec![1u8, 2, 3].into())));
        match classify(incoming, 4096) {
            Inbound::Reject { code, .. } => assert_eq!(code, close_code::UNSUPPORTED),
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn when_peer_closes_then_the_read_reports_closed() {
        assert!(matches!(classify(None, 4096), Inbound::Closed));
        assert!(matches!(
            classify(Some(Ok(Message::Close(None))), 4096),
            Inbound::Closed
        ));
    }
}
