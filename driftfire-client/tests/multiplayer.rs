//! Integration tests for client/relay interaction
//!
//! Each test runs a real relay server on an ephemeral port and drives real
//! clients against it over WebSocket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use driftfire::{RelayServer, ServerConfig, SessionId, Transform, Vector3};
use driftfire_client::game::{CombatResolver, EmptyWorld, HitResult, Ray};
use driftfire_client::network::{ClientConfig, ReconnectPolicy, SyncManager};
use glam::Vec3;
use url::Url;

async fn start_relay() -> (Arc<RelayServer>, Url) {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let server = Arc::new(RelayServer::bind(config).await.expect("Failed to bind relay"));
    let url = Url::parse(&format!("ws://{}", server.local_addr().unwrap())).unwrap();
    let runner = server.clone();
    tokio::spawn(async move { runner.run().await });
    (server, url)
}

fn client_config(url: &Url) -> ClientConfig {
    ClientConfig::new(url.clone()).with_reconnect(ReconnectPolicy {
        max_attempts: 1,
        backoff: Duration::from_millis(10),
    })
}

/// Poll `sync` until `done` holds or two seconds pass.
async fn settle<F>(sync: &mut SyncManager, done: F) -> bool
where
    F: Fn(&SyncManager) -> bool,
{
    for _ in 0..200 {
        sync.poll();
        if done(sync) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn joined(url: &Url) -> SyncManager {
    let mut sync = SyncManager::connect(client_config(url)).await;
    assert!(sync.is_online());
    assert!(settle(&mut sync, |s| s.local_id().is_some()).await, "No identity assigned");
    sync
}

/// COMBAT OVER THE RELAY
mod combat_tests {
    use super::*;

    /// p1 shoots p2: only p2 loses health, and only by the weapon damage.
    #[tokio::test]
    async fn player_one_hits_player_two() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;
        let mut bravo = joined(&url).await;
        let bravo_id = bravo.local_id().cloned().unwrap();

        let alpha_pose = Transform::IDENTITY;
        let bravo_pose = Transform::at(Vector3::new(0.0, 0.0, -30.0));
        assert!(alpha.send_transform(Instant::now(), &alpha_pose));
        assert!(bravo.send_transform(Instant::now(), &bravo_pose));

        let seen = settle(&mut alpha, |s| {
            s.remotes()
                .get(&bravo_id)
                .map(|remote| remote.current().position == bravo_pose.position)
                .unwrap_or(false)
        })
        .await;
        assert!(seen, "Alpha never saw Bravo's transform");

        let aim = Ray::from_transform(&alpha_pose);
        let hit = CombatResolver::default().resolve_shot(&aim, 20.0, &EmptyWorld, alpha.remotes());
        match &hit {
            Some(HitResult::Player { victim, damage, .. }) => {
                assert_eq!(victim, &bravo_id);
                assert_eq!(*damage, 20.0);
            }
            other => panic!("Expected player hit, got {:?}", other),
        }
        assert!(alpha.report_shot(&aim, hit.as_ref()));

        assert!(settle(&mut bravo, |s| s.health().current() < 100.0).await);
        assert_eq!(bravo.health().current(), 80.0);

        // Bravo also sees the shot for effects.
        let effects = bravo.drain_effects();
        assert_eq!(effects.len(), 1);
        assert_eq!(Some(&effects[0].shooter), alpha.local_id());

        // Alpha gets the damage echo too but is not the victim.
        tokio::time::sleep(Duration::from_millis(100)).await;
        alpha.poll();
        assert_eq!(alpha.health().current(), 100.0);

        server.shutdown();
    }

    /// World-only shots produce a shot event but no damage claim.
    #[tokio::test]
    async fn miss_sends_no_damage() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;
        let mut bravo = joined(&url).await;

        let aim = Ray::new(Vec3::ZERO, Vec3::Y).unwrap();
        assert!(alpha.report_shot(&aim, None));

        tokio::time::sleep(Duration::from_millis(100)).await;
        bravo.poll();
        assert_eq!(bravo.drain_effects().len(), 1);
        assert_eq!(bravo.health().current(), 100.0);

        server.shutdown();
    }
}

/// SESSION LIFECYCLE
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_and_join_populate_remotes() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;
        let mut bravo = joined(&url).await;

        let alpha_id = alpha.local_id().cloned().unwrap();
        let bravo_id = bravo.local_id().cloned().unwrap();

        // Bravo learned about Alpha from the snapshot, Alpha from the join.
        assert!(settle(&mut bravo, |s| s.remotes().contains(&alpha_id)).await);
        assert!(settle(&mut alpha, |s| s.remotes().contains(&bravo_id)).await);
        assert_eq!(alpha.remotes().len(), 1);
        assert_eq!(bravo.remotes().len(), 1);

        server.shutdown();
    }

    #[tokio::test]
    async fn leave_removes_remote() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;
        let mut bravo = joined(&url).await;
        let bravo_id = bravo.local_id().cloned().unwrap();

        assert!(settle(&mut alpha, |s| s.remotes().contains(&bravo_id)).await);

        bravo.close().await;
        assert!(!bravo.is_online());

        assert!(settle(&mut alpha, |s| s.remotes().is_empty()).await);
        assert_eq!(server.connection_count().await, 1);

        server.shutdown();
    }

    #[tokio::test]
    async fn label_reaches_other_players() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;

        let mut bravo = SyncManager::connect(client_config(&url).with_label("Bravo")).await;
        assert!(settle(&mut bravo, |s| s.local_id().is_some()).await);
        let bravo_id = bravo.local_id().cloned().unwrap();

        let labelled = settle(&mut alpha, |s| {
            s.remotes()
                .get(&bravo_id)
                .map(|remote| remote.label() == "Bravo")
                .unwrap_or(false)
        })
        .await;
        assert!(labelled);

        server.shutdown();
    }

    #[tokio::test]
    async fn server_shutdown_drops_client_offline() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;
        let _bravo = joined(&url).await;
        assert!(settle(&mut alpha, |s| s.remotes().len() == 1).await);

        server.shutdown();

        assert!(settle(&mut alpha, |s| !s.is_online()).await);
        assert!(alpha.local_id().is_none());
        assert!(alpha.remotes().is_empty());
    }

    #[tokio::test]
    async fn reconnect_gets_fresh_identity() {
        let (server, url) = start_relay().await;
        let mut alpha = joined(&url).await;
        let first: SessionId = alpha.local_id().cloned().unwrap();

        alpha.reconnect().await.unwrap();
        assert!(settle(&mut alpha, |s| s.local_id().is_some()).await);
        assert_ne!(alpha.local_id(), Some(&first));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.connection_count().await, 1);

        server.shutdown();
    }
}

/// OFFLINE FALLBACK
mod offline_tests {
    use super::*;

    async fn dead_url() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("ws://{}", addr)).unwrap()
    }

    #[tokio::test]
    async fn unreachable_relay_falls_back_to_offline() {
        let url = dead_url().await;
        let mut sync = SyncManager::connect(client_config(&url)).await;

        assert!(!sync.is_online());
        assert!(sync.local_id().is_none());

        // Local simulation keeps working.
        sync.health_mut().apply_damage(30.0);
        assert_eq!(sync.health().current(), 70.0);
        sync.tick(Instant::now(), &Transform::IDENTITY);

        let aim = Ray::new(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!(!sync.report_shot(&aim, None));
    }

    #[tokio::test]
    async fn explicit_reconnect_reports_exhaustion() {
        let url = dead_url().await;
        let mut sync = SyncManager::connect(client_config(&url)).await;
        assert!(sync.reconnect().await.is_err());
        assert!(!sync.is_online());
    }
}
