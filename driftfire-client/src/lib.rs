//! Driftfire client
//!
//! Keeps one player's view of the shared space in step with the relay:
//!
//! ```text
//! local input -> CombatResolver -> SyncManager -> relay
//! relay -> SyncManager -> RemoteEntities (interpolated)
//!                      -> HealthSystem (damage addressed to us)
//! ```
//!
//! The manager degrades to offline mode when the relay is unreachable, so
//! everything under [`game`] works with or without a server.

pub mod game;
pub mod network;

pub use game::{CombatResolver, HealthSystem, HitResult, Ray, RemoteEntities, WeaponSpec, WeaponSystem};
pub use network::{ClientConfig, SyncManager};
