//! Spawn Distribution
//!
//! Random spawn points inside a sphere around the world origin.
//! Used by the registry for a session's first transform and by clients
//! when respawning after death.

use std::f32::consts::TAU;
use rand::Rng;

use super::vec3::{Transform, Vector3};

/// Default spawn sphere radius (world units).
pub const DEFAULT_SPAWN_RADIUS: f32 = 50.0;

/// Spawn region: a sphere of `radius` centred on the origin.
///
/// The distance from the centre is drawn uniformly in `[0, radius)` and the
/// direction uniformly over the sphere, so spawns cluster towards the middle
/// rather than filling the volume evenly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnSphere {
    /// Sphere radius.
    pub radius: f32,
}

impl Default for SpawnSphere {
    fn default() -> Self {
        Self { radius: DEFAULT_SPAWN_RADIUS }
    }
}

impl SpawnSphere {
    /// Create a spawn sphere. Negative or non-finite radii collapse to 0.
    pub fn new(radius: f32) -> Self {
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        Self { radius }
    }

    /// Sample a spawn position.
    pub fn sample_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector3 {
        let distance = rng.gen::<f32>() * self.radius;
        let theta = rng.gen::<f32>() * TAU;
        let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();

        Vector3::new(
            distance * phi.sin() * theta.cos(),
            distance * phi.sin() * theta.sin(),
            distance * phi.cos(),
        )
    }

    /// Sample a full spawn transform (zero rotation and roll).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Transform {
        Transform::at(self.sample_position(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_samples_stay_inside_sphere() {
        let sphere = SpawnSphere::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let p = sphere.sample_position(&mut rng);
            assert!(p.length() <= DEFAULT_SPAWN_RADIUS + 1e-3, "{:?} outside sphere", p);
        }
    }

    #[test]
    fn test_samples_vary() {
        let sphere = SpawnSphere::new(10.0);
        let mut rng = StdRng::seed_from_u64(99);

        let a = sphere.sample_position(&mut rng);
        let b = sphere.sample_position(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sample_has_no_rotation() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = SpawnSphere::default().sample(&mut rng);

        assert_eq!(t.rotation, Vector3::ZERO);
        assert_eq!(t.roll, 0.0);
    }

    #[test]
    fn test_degenerate_radius() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(SpawnSphere::new(-5.0).radius, 0.0);
        assert_eq!(SpawnSphere::new(f32::NAN).sample_position(&mut rng), Vector3::ZERO);
    }

    proptest::proptest! {
        #[test]
        fn prop_any_radius_any_seed_stays_inside(radius in 0.0f32..10_000.0, seed: u64) {
            let mut rng = StdRng::seed_from_u64(seed);
            let p = SpawnSphere::new(radius).sample_position(&mut rng);
            proptest::prop_assert!(p.is_finite());
            proptest::prop_assert!(p.length() <= radius * (1.0 + 1e-5) + 1e-4);
        }
    }
}
