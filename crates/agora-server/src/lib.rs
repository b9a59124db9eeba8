//! Agora Server - realtime voting and chat over one WebSocket endpoint
//!
//! Wires the core ledger and directory to the outside world: a
//! credential-gated WebSocket session per client, a broadcast hub that
//! fans committed votes out to everyone and chat to room members, and
//! the REST bootstrap API clients read before connecting.

pub mod config;
pub mod error;
pub mod http;
pub mod hub;
pub mod limiter;
pub mod rooms;
pub mod session;

pub use config::ServerConfig;
pub use error::ServerError;
pub use http::{router, AppState};
pub use hub::{BroadcastHub, ConnId};
pub use limiter::ChatLimiter;
pub use rooms::RoomRouter;
pub use session::Session;
