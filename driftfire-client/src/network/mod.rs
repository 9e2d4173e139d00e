//! Network module - relay connection and state synchronization

pub mod config;
pub mod connection;
pub mod sync;

pub use config::{resolve_endpoint, ClientConfig, EndpointError};
pub use connection::{connect_with_retry, Connection, ConnectionError, ReconnectPolicy};
pub use sync::{SendCadence, ShotEffect, SyncManager, MAX_PENDING_EFFECTS};
