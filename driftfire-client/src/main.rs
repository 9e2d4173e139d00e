//! Driftfire Bot
//!
//! Headless client: flies a circle, shoots at the nearest player once a
//! second and respawns after dying. Useful for populating a relay.

use std::time::{Duration, Instant};

use anyhow::Context;
use glam::Vec3;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use driftfire::{SpawnSphere, Transform, Vector3};
use driftfire_client::game::{CombatResolver, EmptyWorld, Ray, WeaponSystem};
use driftfire_client::network::{ClientConfig, SyncManager};

const TICK_RATE: u64 = 60;
const ORBIT_RADIUS: f32 = 20.0;
/// Radians per second around the orbit.
const ORBIT_SPEED: f32 = 0.5;
const FIRE_PERIOD: Duration = Duration::from_secs(1);
const RESPAWN_DELAY: Duration = Duration::from_secs(3);

/// Position on the orbit and a yaw facing along it.
fn orbit(center: Vec3, angle: f32) -> Transform {
    let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * ORBIT_RADIUS;
    Transform {
        position: Vector3::from(center + offset),
        rotation: Vector3::new(0.0, -angle, 0.0),
        roll: 0.0,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    info!("Driftfire bot v{} targeting {}", env!("CARGO_PKG_VERSION"), config.endpoint);

    let mut sync = SyncManager::connect(config).await;
    let mut rng = StdRng::from_entropy();
    let resolver = CombatResolver::default();
    let spawn = SpawnSphere::default();
    let mut weapons = WeaponSystem::default();
    let mut world = EmptyWorld;

    let mut center = Vec3::ZERO;
    let mut angle = 0.0f32;
    let mut last_tick = Instant::now();
    let mut since_shot = Duration::ZERO;
    let mut dead_since: Option<Instant> = None;

    let mut ticker = tokio::time::interval(Duration::from_micros(1_000_000 / TICK_RATE));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, leaving");
                break;
            }
        }

        let now = Instant::now();
        let dt = now.saturating_duration_since(last_tick);
        last_tick = now;

        sync.health_mut().update(dt);
        weapons.update(dt);

        if !sync.health().is_alive() {
            let died = *dead_since.get_or_insert(now);
            if now.saturating_duration_since(died) >= RESPAWN_DELAY {
                if let Some(transform) = sync.health_mut().respawn(&spawn, &mut rng) {
                    info!("Respawned at {}", transform.position);
                    center = transform.position.into();
                    dead_since = None;
                }
            }
            sync.poll();
            sync.interpolate();
            continue;
        }

        angle += ORBIT_SPEED * dt.as_secs_f32();
        let local = orbit(center, angle);
        sync.tick(now, &local);

        for effect in sync.drain_effects() {
            debug!("{} fired from {}", effect.shooter, effect.position);
        }

        since_shot += dt;
        if since_shot < FIRE_PERIOD {
            continue;
        }

        let origin: Vec3 = local.position.into();
        let target = sync
            .remotes()
            .iter()
            .map(|remote| Vec3::from(remote.current().position))
            .min_by(|a, b| a.distance_squared(origin).total_cmp(&b.distance_squared(origin)));
        let Some(aim) = target.and_then(|target| Ray::new(origin, target - origin)) else {
            continue;
        };
        let Some(spec) = weapons.try_fire() else {
            continue;
        };

        since_shot = Duration::ZERO;
        let hit = resolver.fire(&aim, &spec, &mut rng, &mut world, sync.remotes());
        if let Some(victim) = hit.as_ref().and_then(|hit| hit.victim()) {
            info!("Hit {} for {}", victim, spec.damage);
        }
        sync.report_shot(&aim, hit.as_ref());
    }

    sync.close().await;
    Ok(())
}
