//! Game module - local player state and combat
//!
//! Nothing in here talks to the network. The sync manager feeds remote
//! entities and health; the combat resolver reads them.

pub mod combat;
pub mod health;
pub mod remote;
pub mod weapon;

pub use combat::{BodyHandle, CombatResolver, EmptyWorld, HitResult, Ray, WorldGeometry, WorldHit};
pub use health::{DamageOutcome, HealthConfig, HealthSystem, LifeState};
pub use remote::{RemoteEntities, RemoteEntity};
pub use weapon::{Weapon, WeaponSpec, WeaponSystem};
