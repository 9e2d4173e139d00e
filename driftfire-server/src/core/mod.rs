//! Core primitives shared by the relay and its clients.

pub mod vec3;
pub mod spawn;

// Re-export core types
pub use vec3::{Transform, Vector3};
pub use spawn::{SpawnSphere, DEFAULT_SPAWN_RADIUS};
