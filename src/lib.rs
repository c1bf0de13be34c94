//! Server-authoritative lunar lander backend: sessions, rooms, spectators and replays.

pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::config::http_port;
pub use frameworks::server::run;
