use std::{env, net::IpAddr, time::Duration};

// Runtime/server constants (not gameplay tuning).

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn http_port() -> u16 {
    env_or("LANDER_SERVER_PORT", 8000)
}

pub fn bind_addr() -> IpAddr {
    env_or("LANDER_BIND_ADDR", IpAddr::from([127, 0, 0, 1]))
}

pub fn max_sessions() -> usize {
    env_or("MAX_SESSIONS", 256)
}

pub fn sweep_interval() -> Duration {
    Duration::from_secs(env_or("SWEEP_INTERVAL_SECS", 30).max(1))
}

pub fn waiting_room_ttl() -> Duration {
    Duration::from_secs(env_or("WAITING_ROOM_TTL_SECS", 600))
}

pub fn over_session_ttl() -> Duration {
    Duration::from_secs(env_or("OVER_SESSION_TTL_SECS", 60))
}

pub fn max_replays() -> usize {
    env_or("MAX_REPLAYS", 100)
}

pub const TICK_RATE: u32 = 60;
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_FRAME_BYTES: usize = 4096;
// Codec ceiling; frames between MAX_FRAME_BYTES and this get a 1009 close from the read loop.
pub const TRANSPORT_MAX_BYTES: usize = 64 * 1024;
// Per-connection outbound queue; a recipient this far behind is dropped.
pub const OUTBOX_CAPACITY: usize = 256;
pub const COMMAND_CAPACITY: usize = 64;
