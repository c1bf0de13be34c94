// WebSocket adapters split by pilot connections vs read-only spectators.

pub mod client;
mod frames;
pub mod spectator;

pub use client::ws_handler;
pub use spectator::spectate_handler;
