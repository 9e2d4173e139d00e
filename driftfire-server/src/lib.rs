//! # Driftfire Relay Server
//!
//! Session registry and event relay for Driftfire multiplayer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DRIFTFIRE SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives shared with clients            │
//! │  ├── vec3.rs     - Wire vector and transform                 │
//! │  └── spawn.rs    - Spawn sphere sampling                     │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── protocol.rs - Tagged JSON message types                 │
//! │  ├── registry.rs - Session registry and fan-out              │
//! │  └── server.rs   - WebSocket relay server                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trust Model
//!
//! The server is a pure relay. Transforms and damage claims are forwarded
//! without validation; each client is authoritative over its own health
//! and applies only the damage addressed to its own session id.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod network;

// Re-export commonly used types
pub use core::vec3::{Transform, Vector3};
pub use core::spawn::SpawnSphere;
pub use network::protocol::{ClientMessage, ServerMessage, SessionId, SessionInfo};
pub use network::registry::SessionRegistry;
pub use network::server::{RelayServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
