// Interface adapters: wire protocol, HTTP routes and WebSocket handling.

pub mod http;
pub mod net;
pub mod protocol;
pub mod state;
pub mod utils;
