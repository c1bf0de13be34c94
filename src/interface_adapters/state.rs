use crate::use_cases::SessionRegistry;
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    // Live sessions plus the replay archive.
    pub registry: Arc<SessionRegistry>,
    // Capacity of each connection's outbound queue.
    pub outbox_capacity: usize,
    // How long a pilot socket may stay idle before its first start/create/join.
    pub handshake_timeout: Duration,
    // Largest inbound text frame accepted from a client.
    pub max_frame_bytes: usize,
    // Hard limit handed to the websocket codec, well above `max_frame_bytes`.
    pub transport_max_bytes: usize,
}
