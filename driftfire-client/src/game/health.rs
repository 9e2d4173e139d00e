//! Health state machine - damage, regeneration, death and respawn
//!
//! Health is owned by the local client only. Remote peers can request a
//! change by sending a damage event addressed to our session id; nothing
//! else writes here.

use std::time::Duration;

use driftfire::{SpawnSphere, Transform};
use rand::Rng;
use tracing::info;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthConfig {
    pub max: f32,
    /// Health regenerated per second once the delay has passed.
    pub regen_rate: f32,
    /// Time without damage before regeneration starts.
    pub regen_delay: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max: 100.0,
            regen_rate: 3.0,
            regen_delay: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
}

/// What a call to [`HealthSystem::apply_damage`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Already dead or the amount was not a number.
    Ignored,
    Wounded { remaining: f32 },
    Killed,
}

#[derive(Debug, Clone)]
pub struct HealthSystem {
    config: HealthConfig,
    current: f32,
    state: LifeState,
    since_damage: Duration,
}

impl Default for HealthSystem {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl HealthSystem {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            current: config.max,
            state: LifeState::Alive,
            since_damage: Duration::ZERO,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.config.max
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifeState::Alive
    }

    /// Apply incoming damage. Amounts come off the wire, so NaN and infinity
    /// are dropped and negatives count as zero.
    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        if self.state == LifeState::Dead || !amount.is_finite() {
            return DamageOutcome::Ignored;
        }

        let amount = amount.max(0.0);
        self.current = (self.current - amount).max(0.0);
        self.since_damage = Duration::ZERO;

        if self.current <= 0.0 {
            self.state = LifeState::Dead;
            info!("Local player died");
            DamageOutcome::Killed
        } else {
            DamageOutcome::Wounded { remaining: self.current }
        }
    }

    pub fn heal(&mut self, amount: f32) {
        if self.state == LifeState::Dead || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.current = (self.current + amount).min(self.config.max);
    }

    /// Advance the regeneration clock by `dt` of simulated time.
    pub fn update(&mut self, dt: Duration) {
        if self.state == LifeState::Dead {
            return;
        }

        self.since_damage = self.since_damage.saturating_add(dt);
        if self.since_damage >= self.config.regen_delay && self.current < self.config.max {
            self.heal(self.config.regen_rate * dt.as_secs_f32());
        }
    }

    /// Bring a dead player back at full health at a fresh spawn point.
    /// Returns `None` (and changes nothing) while alive.
    pub fn respawn<R: Rng + ?Sized>(&mut self, spawn: &SpawnSphere, rng: &mut R) -> Option<Transform> {
        if self.state == LifeState::Alive {
            return None;
        }

        self.current = self.config.max;
        self.state = LifeState::Alive;
        self.since_damage = Duration::ZERO;
        Some(spawn.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn with_health(current: f32) -> HealthSystem {
        let mut health = HealthSystem::default();
        health.apply_damage(100.0 - current);
        health
    }

    #[test]
    fn test_damage_to_zero_kills() {
        let mut health = with_health(30.0);
        assert_eq!(health.apply_damage(50.0), DamageOutcome::Killed);
        assert_eq!(health.current(), 0.0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_partial_damage_wounds() {
        let mut health = with_health(30.0);
        assert_eq!(health.apply_damage(10.0), DamageOutcome::Wounded { remaining: 20.0 });
        assert_eq!(health.current(), 20.0);
        assert!(health.is_alive());
    }

    #[test]
    fn test_damage_while_dead_is_noop() {
        let mut health = with_health(10.0);
        health.apply_damage(10.0);
        assert_eq!(health.apply_damage(5.0), DamageOutcome::Ignored);
        assert_eq!(health.current(), 0.0);
        assert_eq!(health.state(), LifeState::Dead);
    }

    #[test]
    fn test_untrusted_amounts() {
        let mut health = HealthSystem::default();
        assert_eq!(health.apply_damage(f32::NAN), DamageOutcome::Ignored);
        assert_eq!(health.apply_damage(f32::INFINITY), DamageOutcome::Ignored);
        assert_eq!(health.apply_damage(-40.0), DamageOutcome::Wounded { remaining: 100.0 });
        assert_eq!(health.current(), 100.0);
    }

    #[test]
    fn test_no_regen_before_delay() {
        let mut health = with_health(50.0);
        for _ in 0..49 {
            health.update(Duration::from_millis(100));
        }
        assert_eq!(health.current(), 50.0);
    }

    #[test]
    fn test_regen_after_delay_until_max() {
        let mut health = with_health(50.0);
        for _ in 0..50 {
            health.update(Duration::from_millis(100));
        }
        // The tick that crosses 5 s already regenerates.
        assert!((health.current() - 50.3).abs() < 1e-3);

        for _ in 0..10 {
            health.update(Duration::from_millis(100));
        }
        assert!((health.current() - 53.3).abs() < 1e-3);

        health.update(Duration::from_secs(60));
        assert_eq!(health.current(), 100.0);
    }

    #[test]
    fn test_damage_resets_regen_clock() {
        let mut health = with_health(50.0);
        for _ in 0..49 {
            health.update(Duration::from_millis(100));
        }
        // Hit at t = 4.9 s.
        health.apply_damage(10.0);

        for _ in 0..49 {
            health.update(Duration::from_millis(100));
        }
        assert_eq!(health.current(), 40.0);

        health.update(Duration::from_millis(100));
        assert!(health.current() > 40.0);
    }

    #[test]
    fn test_heal_capped_at_max() {
        let mut health = with_health(90.0);
        health.heal(50.0);
        assert_eq!(health.current(), 100.0);
    }

    #[test]
    fn test_respawn_from_dead() {
        let mut health = with_health(10.0);
        health.apply_damage(10.0);
        let mut rng = StdRng::seed_from_u64(5);
        let spawn = SpawnSphere::default();

        let transform = health.respawn(&spawn, &mut rng).unwrap();
        assert!(health.is_alive());
        assert_eq!(health.current(), 100.0);
        assert!(transform.position.length() <= spawn.radius + 1e-3);
    }

    #[test]
    fn test_respawn_while_alive_is_noop() {
        let mut health = with_health(60.0);
        let mut rng = StdRng::seed_from_u64(5);

        assert!(health.respawn(&SpawnSphere::default(), &mut rng).is_none());
        assert_eq!(health.current(), 60.0);
    }

    #[test]
    fn test_no_regen_while_dead() {
        let mut health = with_health(10.0);
        health.apply_damage(10.0);
        health.update(Duration::from_secs(30));
        assert_eq!(health.current(), 0.0);
    }
}
