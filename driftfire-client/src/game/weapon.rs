//! Weapons - fire rate, ammo and reload timing
//!
//! Every weapon owns its own cooldown; the combat resolver never rate
//! limits shots itself.

use std::time::Duration;

use tracing::debug;

// ============================================================================
// WEAPON PRESETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub magazine: u32,
    /// Spare rounds carried when the weapon is issued.
    pub reserve: u32,
    pub rounds_per_minute: u32,
    /// Damage per projectile.
    pub damage: f32,
    pub reload_time: Duration,
    /// Projectiles per trigger pull.
    pub pellets: u32,
    /// Max angular jitter per projectile, as a tangent-plane offset.
    pub spread: f32,
    /// Impulse applied to world bodies that are hit.
    pub impulse: f32,
}

impl WeaponSpec {
    pub const ASSAULT_RIFLE: Self = Self {
        name: "Assault Rifle",
        magazine: 30,
        reserve: 120,
        rounds_per_minute: 600,
        damage: 20.0,
        reload_time: Duration::from_millis(1500),
        pellets: 1,
        spread: 0.0,
        impulse: 50.0,
    };

    pub const SHOTGUN: Self = Self {
        name: "Shotgun",
        magazine: 8,
        reserve: 32,
        rounds_per_minute: 120,
        damage: 15.0,
        reload_time: Duration::from_millis(2000),
        pellets: 8,
        spread: 0.05,
        impulse: 30.0,
    };

    pub const SNIPER: Self = Self {
        name: "Sniper",
        magazine: 5,
        reserve: 25,
        rounds_per_minute: 60,
        damage: 50.0,
        reload_time: Duration::from_millis(2500),
        pellets: 1,
        spread: 0.0,
        impulse: 50.0,
    };

    /// Minimum time between shots.
    pub fn fire_interval(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.rounds_per_minute.max(1)))
    }
}

// ============================================================================
// WEAPON STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct Weapon {
    spec: WeaponSpec,
    ammo: u32,
    reserve: u32,
    cooldown: Duration,
    reload_remaining: Option<Duration>,
}

impl Weapon {
    pub fn new(spec: WeaponSpec) -> Self {
        Self {
            spec,
            ammo: spec.magazine,
            reserve: spec.reserve,
            cooldown: Duration::ZERO,
            reload_remaining: None,
        }
    }

    pub fn spec(&self) -> &WeaponSpec {
        &self.spec
    }

    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    pub fn reserve(&self) -> u32 {
        self.reserve
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_remaining.is_some()
    }

    pub fn can_fire(&self) -> bool {
        !self.is_reloading() && self.ammo > 0 && self.cooldown.is_zero()
    }

    /// Consume a round if the weapon is ready. An empty magazine starts a
    /// reload on its own.
    pub fn try_fire(&mut self) -> bool {
        if !self.can_fire() {
            return false;
        }

        self.ammo -= 1;
        self.cooldown = self.spec.fire_interval();
        if self.ammo == 0 {
            self.start_reload();
        }
        true
    }

    pub fn start_reload(&mut self) -> bool {
        if self.is_reloading() || self.ammo >= self.spec.magazine || self.reserve == 0 {
            return false;
        }
        debug!("Reloading {}", self.spec.name);
        self.reload_remaining = Some(self.spec.reload_time);
        true
    }

    pub fn update(&mut self, dt: Duration) {
        self.cooldown = self.cooldown.saturating_sub(dt);

        if let Some(remaining) = self.reload_remaining {
            let remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                self.finish_reload();
            } else {
                self.reload_remaining = Some(remaining);
            }
        }
    }

    fn finish_reload(&mut self) {
        let moved = (self.spec.magazine - self.ammo).min(self.reserve);
        self.ammo += moved;
        self.reserve -= moved;
        self.reload_remaining = None;
    }
}

// ============================================================================
// LOADOUT
// ============================================================================

/// The player's carried weapons and which one is drawn.
#[derive(Debug, Clone)]
pub struct WeaponSystem {
    weapons: Vec<Weapon>,
    current: usize,
}

impl Default for WeaponSystem {
    fn default() -> Self {
        Self::new(&[WeaponSpec::ASSAULT_RIFLE, WeaponSpec::SHOTGUN, WeaponSpec::SNIPER])
    }
}

impl WeaponSystem {
    pub fn new(specs: &[WeaponSpec]) -> Self {
        Self {
            weapons: specs.iter().copied().map(Weapon::new).collect(),
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.weapons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Weapon> {
        self.weapons.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Weapon> {
        self.weapons.get_mut(self.current)
    }

    pub fn switch_to(&mut self, index: usize) -> bool {
        if index >= self.weapons.len() || index == self.current {
            return false;
        }
        self.current = index;
        true
    }

    pub fn next(&mut self) {
        if !self.weapons.is_empty() {
            self.current = (self.current + 1) % self.weapons.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.weapons.is_empty() {
            self.current = (self.current + self.weapons.len() - 1) % self.weapons.len();
        }
    }

    pub fn reload(&mut self) -> bool {
        self.current_mut().map(Weapon::start_reload).unwrap_or(false)
    }

    /// Pull the trigger on the drawn weapon.
    pub fn try_fire(&mut self) -> Option<WeaponSpec> {
        let weapon = self.current_mut()?;
        weapon.try_fire().then(|| *weapon.spec())
    }

    /// Advance every weapon, so holstered reloads still complete.
    pub fn update(&mut self, dt: Duration) {
        for weapon in &mut self.weapons {
            weapon.update(dt);
        }
    }
}
