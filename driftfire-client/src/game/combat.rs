//! Combat resolution - hitscan against player proxies and world geometry
//!
//! Rules:
//! - Player proxies are tested before world geometry, so a player standing
//!   in front of an asteroid always takes the hit
//! - A shot reports at most one hit
//! - Multi-pellet weapons report the first player hit, but every pellet
//!   that lands on world geometry still pushes it
//!
//! Physics is an external collaborator reached through [`WorldGeometry`].

use driftfire::{SessionId, Transform};
use glam::Vec3;
use rand::Rng;

use super::remote::RemoteEntities;
use super::weapon::WeaponSpec;

/// Radius of the sphere standing in for a remote player's body.
pub const DEFAULT_PROXY_RADIUS: f32 = 1.5;

/// Hitscan range.
pub const DEFAULT_MAX_RANGE: f32 = 1000.0;

// ============================================================================
// RAYS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
}

impl Ray {
    /// `None` if `direction` has no usable length.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        origin.is_finite().then_some(Self { origin, direction })
    }

    /// Ray from a pose's position along its view direction.
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            origin: transform.position.into(),
            direction: forward(transform.rotation.x, transform.rotation.y),
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Same origin, direction nudged by up to `spread` in the plane
    /// perpendicular to it.
    pub fn jittered<R: Rng + ?Sized>(&self, spread: f32, rng: &mut R) -> Self {
        if spread <= 0.0 || !spread.is_finite() {
            return *self;
        }
        let (right, up) = self.direction.any_orthonormal_pair();
        let offset = right * rng.gen_range(-spread..=spread) + up * rng.gen_range(-spread..=spread);
        Self {
            origin: self.origin,
            direction: (self.direction + offset).normalize_or(self.direction),
        }
    }
}

/// View direction for a pitch/yaw pair. Zero rotation looks down -Z.
pub fn forward(pitch: f32, yaw: f32) -> Vec3 {
    let dir = Vec3::new(-yaw.sin() * pitch.cos(), pitch.sin(), -yaw.cos() * pitch.cos());
    dir.try_normalize().unwrap_or(Vec3::NEG_Z)
}

/// Distance along `ray` to the first point of a sphere, 0 when the ray
/// starts inside it.
///
/// Worked in f64: remote positions are untrusted and squaring a large but
/// finite f32 coordinate overflows.
pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    if !center.is_finite() || !radius.is_finite() {
        return None;
    }

    let to_center = center.as_dvec3() - ray.origin.as_dvec3();
    let along = to_center.dot(ray.direction.as_dvec3());
    let miss_sq = to_center.length_squared() - along * along;
    let radius_sq = f64::from(radius) * f64::from(radius);
    if !miss_sq.is_finite() || miss_sq > radius_sq {
        return None;
    }

    let half_chord = (radius_sq - miss_sq).sqrt();
    let near = along - half_chord;
    let far = along + half_chord;
    if !near.is_finite() || far < 0.0 {
        None
    } else {
        Some(near.max(0.0) as f32)
    }
}

// ============================================================================
// WORLD COLLABORATOR
// ============================================================================

/// Opaque handle to a physics body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldHit {
    pub body: BodyHandle,
    pub point: Vec3,
    /// Centre of mass of the body that was hit.
    pub body_center: Vec3,
    pub distance: f32,
}

/// The slice of a physics engine the resolver needs.
pub trait WorldGeometry {
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<WorldHit>;

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3, point: Vec3);
}

/// A world with nothing in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyWorld;

impl WorldGeometry for EmptyWorld {
    fn raycast(&self, _ray: &Ray, _max_distance: f32) -> Option<WorldHit> {
        None
    }

    fn apply_impulse(&mut self, _body: BodyHandle, _impulse: Vec3, _point: Vec3) {}
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HitResult {
    Player {
        victim: SessionId,
        damage: f32,
        distance: f32,
    },
    World(WorldHit),
}

impl HitResult {
    pub fn victim(&self) -> Option<&SessionId> {
        match self {
            Self::Player { victim, .. } => Some(victim),
            Self::World(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CombatResolver {
    pub proxy_radius: f32,
    pub max_range: f32,
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self {
            proxy_radius: DEFAULT_PROXY_RADIUS,
            max_range: DEFAULT_MAX_RANGE,
        }
    }
}

impl CombatResolver {
    /// Closest remote proxy along the ray, within range.
    pub fn nearest_player(&self, ray: &Ray, remotes: &RemoteEntities) -> Option<(SessionId, f32)> {
        remotes
            .iter()
            .filter(|entity| entity.current().position.is_finite())
            .filter_map(|entity| {
                let center: Vec3 = entity.current().position.into();
                ray_sphere(ray, center, self.proxy_radius)
                    .filter(|distance| *distance <= self.max_range)
                    .map(|distance| (entity.id().clone(), distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Cast a single ray: players first, then the world.
    pub fn resolve_shot<W: WorldGeometry + ?Sized>(
        &self,
        ray: &Ray,
        damage: f32,
        world: &W,
        remotes: &RemoteEntities,
    ) -> Option<HitResult> {
        if let Some((victim, distance)) = self.nearest_player(ray, remotes) {
            return Some(HitResult::Player { victim, damage, distance });
        }
        world.raycast(ray, self.max_range).map(HitResult::World)
    }

    /// Fire one trigger pull of `spec`.
    ///
    /// Every pellet is tested against players and against the world, and
    /// any body it reaches is pushed even if a player was hit first. The
    /// return value is what the networking layer cares about: the first
    /// player hit if there was one, otherwise the first world hit.
    pub fn fire<W, R>(
        &self,
        aim: &Ray,
        spec: &WeaponSpec,
        rng: &mut R,
        world: &mut W,
        remotes: &RemoteEntities,
    ) -> Option<HitResult>
    where
        W: WorldGeometry + ?Sized,
        R: Rng + ?Sized,
    {
        let mut first_player = None;
        let mut first_world = None;

        for _ in 0..spec.pellets.max(1) {
            let ray = aim.jittered(spec.spread, rng);

            if let Some((victim, distance)) = self.nearest_player(&ray, remotes) {
                first_player.get_or_insert(HitResult::Player {
                    victim,
                    damage: spec.damage,
                    distance,
                });
            }

            if let Some(hit) = world.raycast(&ray, self.max_range) {
                world.apply_impulse(hit.body, impulse_for(&hit, spec.impulse), hit.point);
                first_world.get_or_insert(hit);
            }
        }

        first_player.or(first_world.map(HitResult::World))
    }
}

/// Push a hit body away from its centre through the impact point.
pub fn impulse_for(hit: &WorldHit, strength: f32) -> Vec3 {
    (hit.point - hit.body_center).normalize_or_zero() * strength
}
