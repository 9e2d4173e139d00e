//! Remote entities - interpolation proxies for other players
//!
//! One entry per non-local session. `target` is the latest relayed sample;
//! `current` is what gets rendered and hit-tested, and it closes a fixed
//! fraction of the gap every tick.

use std::collections::BTreeMap;
use std::f32::consts::{PI, TAU};

use driftfire::{SessionId, Transform, Vector3, network::DEFAULT_LABEL};

#[derive(Debug, Clone)]
pub struct RemoteEntity {
    id: SessionId,
    current: Transform,
    target: Transform,
    label: String,
    has_sample: bool,
}

impl RemoteEntity {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            current: Transform::IDENTITY,
            target: Transform::IDENTITY,
            label: DEFAULT_LABEL.to_string(),
            has_sample: false,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn current(&self) -> &Transform {
        &self.current
    }

    pub fn target(&self) -> &Transform {
        &self.target
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Record a new authoritative sample. The very first sample is applied
    /// directly so a new peer does not slide in from the origin.
    pub fn set_target(&mut self, target: Transform) {
        self.target = target;
        if !self.has_sample {
            self.current = target;
            self.has_sample = true;
        }
    }

    /// One interpolation step towards the target.
    pub fn step(&mut self, blend: f32) {
        self.current = blend_transform(&self.current, &self.target, blend);
    }
}

// ============================================================================
// COLLECTION
// ============================================================================

/// Remote entities keyed by session id. Insert and remove are the only
/// ways entries come and go.
#[derive(Debug, Default, Clone)]
pub struct RemoteEntities {
    entities: BTreeMap<SessionId, RemoteEntity>,
}

impl RemoteEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entity for `id`, creating it on first observation.
    pub fn observe(&mut self, id: SessionId) -> &mut RemoteEntity {
        self.entities
            .entry(id)
            .or_insert_with_key(|id| RemoteEntity::new(id.clone()))
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<RemoteEntity> {
        self.entities.remove(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SessionId> {
        self.entities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Move every entity `blend` of the way towards its target.
    ///
    /// Applied once per tick regardless of tick length, so convergence
    /// speed depends on frame rate.
    pub fn interpolate(&mut self, blend: f32) {
        for entity in self.entities.values_mut() {
            entity.step(blend);
        }
    }
}

// ============================================================================
// BLENDING
// ============================================================================

/// Blend `current` towards `target`: linear on position, shortest arc on
/// every rotation axis and on roll.
pub fn blend_transform(current: &Transform, target: &Transform, blend: f32) -> Transform {
    let blend = if blend.is_finite() { blend.clamp(0.0, 1.0) } else { 0.0 };

    Transform {
        position: Vector3::new(
            approach(current.position.x, target.position.x, blend),
            approach(current.position.y, target.position.y, blend),
            approach(current.position.z, target.position.z, blend),
        ),
        rotation: Vector3::new(
            approach_angle(current.rotation.x, target.rotation.x, blend),
            approach_angle(current.rotation.y, target.rotation.y, blend),
            approach_angle(current.rotation.z, target.rotation.z, blend),
        ),
        roll: approach_angle(current.roll, target.roll, blend),
    }
}

#[inline]
fn approach(current: f32, target: f32, blend: f32) -> f32 {
    current + (target - current) * blend
}

/// Signed difference `to - from` wrapped into `[-PI, PI)`.
#[inline]
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    (to - from + PI).rem_euclid(TAU) - PI
}

#[inline]
fn approach_angle(current: f32, target: f32, blend: f32) -> f32 {
    current + shortest_arc(current, target) * blend
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform::at(Vector3::new(x, y, z))
    }

    #[test]
    fn test_first_sample_snaps() {
        let mut entity = RemoteEntity::new(SessionId::new("player_2"));
        entity.set_target(at(10.0, 0.0, 0.0));
        assert_eq!(entity.current().position.x, 10.0);

        entity.set_target(at(20.0, 0.0, 0.0));
        assert_eq!(entity.current().position.x, 10.0);
        entity.step(0.2);
        assert!((entity.current().position.x - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotation_takes_short_way_round() {
        let mut current = Transform::IDENTITY;
        current.rotation.y = 3.0;
        let mut target = Transform::IDENTITY;
        target.rotation.y = -3.0;

        // 3.0 -> -3.0 is about 0.283 rad forward across PI, not 6 rad back.
        let next = blend_transform(&current, &target, 0.5);
        assert!(next.rotation.y > 3.0);
        assert!((shortest_arc(3.0, -3.0) - (TAU - 6.0)).abs() < 1e-5);
    }

    #[test]
    fn test_roll_blends() {
        let current = Transform::IDENTITY;
        let target = Transform { roll: 1.0, ..Transform::IDENTITY };
        let next = blend_transform(&current, &target, 0.2);
        assert!((next.roll - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_bad_blend_factor_is_inert() {
        let current = at(0.0, 0.0, 0.0);
        let target = at(5.0, 5.0, 5.0);
        assert_eq!(blend_transform(&current, &target, f32::NAN), current);
        assert_eq!(blend_transform(&current, &target, 3.0).position, target.position);
    }

    #[test]
    fn test_collection_lifecycle() {
        let mut remotes = RemoteEntities::new();
        let a = SessionId::new("player_1");
        let b = SessionId::new("player_2");

        remotes.observe(a.clone()).set_target(at(1.0, 0.0, 0.0));
        remotes.observe(b.clone());
        remotes.observe(a.clone());
        assert_eq!(remotes.len(), 2);

        assert!(remotes.remove(&a).is_some());
        assert!(remotes.remove(&a).is_none());
        assert_eq!(remotes.ids().collect::<Vec<_>>(), vec![&b]);

        remotes.clear();
        assert!(remotes.is_empty());
    }

    #[test]
    fn test_interpolate_moves_all() {
        let mut remotes = RemoteEntities::new();
        for (i, name) in ["player_1", "player_2"].iter().enumerate() {
            let entity = remotes.observe(SessionId::new(*name));
            entity.set_target(Transform::IDENTITY);
            entity.set_target(at(10.0 * (i as f32 + 1.0), 0.0, 0.0));
        }

        remotes.interpolate(0.2);
        let xs: Vec<f32> = remotes.iter().map(|e| e.current().position.x).collect();
        assert!((xs[0] - 2.0).abs() < 1e-5);
        assert!((xs[1] - 4.0).abs() < 1e-5);
    }

    fn coord() -> impl Strategy<Value = f32> {
        -1000.0f32..1000.0f32
    }

    proptest! {
        /// Distance to a fixed target never grows and ends up negligible.
        #[test]
        fn prop_interpolation_converges_monotonically(
            start in (coord(), coord(), coord()),
            goal in (coord(), coord(), coord()),
        ) {
            let mut current = at(start.0, start.1, start.2);
            let target = at(goal.0, goal.1, goal.2);

            let mut previous = current.position.distance(target.position);
            for _ in 0..200 {
                current = blend_transform(&current, &target, 0.2);
                let distance = current.position.distance(target.position);
                prop_assert!(distance <= previous, "{} > {}", distance, previous);
                previous = distance;
            }
            prop_assert!(previous < 1e-2, "still {} away", previous);
        }

        /// Wrapped differences always fall in [-PI, PI].
        #[test]
        fn prop_shortest_arc_is_bounded(from in -20.0f32..20.0, to in -20.0f32..20.0) {
            let arc = shortest_arc(from, to);
            prop_assert!(arc >= -PI - 1e-4 && arc <= PI + 1e-4);
        }
    }
}
