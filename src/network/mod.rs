//! Network Layer
//!
//! WebSocket transport and JSON wire protocol. Connection tasks only
//! translate between frames and hub events; all session logic lives in `hub/`.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, DecodeError, ServerMessage, UserSummary};
pub use server::{GameServer, GameServerError, ServerConfig};
