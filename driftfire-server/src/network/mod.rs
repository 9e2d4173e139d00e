//! Network Layer
//!
//! Wire protocol, session registry and the WebSocket relay server.

pub mod protocol;
pub mod registry;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, SessionId, SessionInfo};
pub use registry::{Outbox, RegistryConfig, SessionRegistry, DEFAULT_LABEL};
pub use server::{RelayServer, ServerConfig, ConfigError, RelayServerError, DEFAULT_PORT};
