//! Session Registry
//!
//! Authoritative set of connected sessions and their last-known transforms.
//! Owns id assignment and fan-out of relayed events.
//!
//! Every mutation and every broadcast runs under the registry lock, so a
//! broadcast never sees a session that is halfway through removal. Outboxes
//! are unbounded channels, so no relay ever waits on a slow peer while the
//! lock is held.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, trace};

use crate::core::spawn::SpawnSphere;
use crate::core::vec3::{Transform, Vector3};
use crate::network::protocol::{ServerMessage, SessionId, SessionInfo};

/// Label given to sessions that never set one.
pub const DEFAULT_LABEL: &str = "Player";

/// Default cap on label length (characters).
pub const DEFAULT_MAX_LABEL_LEN: usize = 32;

/// Outbound channel to one connection's writer task.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Registry-held state for one session.
#[derive(Debug)]
struct SessionEntry {
    transform: Transform,
    label: String,
    outbox: Outbox,
}

/// Which sessions a broadcast reaches.
#[derive(Debug, Clone, Copy)]
enum Audience<'a> {
    /// Every session.
    All,
    /// Every session except the given one.
    AllExcept(&'a SessionId),
}

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Spawn region for new sessions.
    pub spawn: SpawnSphere,
    /// Labels longer than this are truncated.
    pub max_label_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            spawn: SpawnSphere::default(),
            max_label_len: DEFAULT_MAX_LABEL_LEN,
        }
    }
}

/// Arena of live sessions indexed by id.
pub struct SessionRegistry {
    config: RegistryConfig,
    sessions: RwLock<BTreeMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
    rng: Mutex<StdRng>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Register a new connection.
    ///
    /// The new session gets its id and a full snapshot (itself included);
    /// everyone else is told it joined.
    pub async fn connect(&self, outbox: Outbox) -> SessionId {
        let id = SessionId::from_counter(self.next_id.fetch_add(1, Ordering::Relaxed));
        let transform = self.spawn_transform();

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), SessionEntry {
            transform,
            label: DEFAULT_LABEL.to_string(),
            outbox: outbox.clone(),
        });

        let _ = outbox.send(ServerMessage::IdentityAssigned { id: id.clone() });
        let _ = outbox.send(ServerMessage::SessionSnapshot {
            sessions: Self::collect_snapshot(&sessions),
        });

        Self::broadcast(
            &sessions,
            Audience::AllExcept(&id),
            ServerMessage::SessionJoined { id: id.clone() },
        );

        info!("Session {} connected, online: {}", id, sessions.len());
        id
    }

    /// Store a new transform for `id` and relay it to everyone else.
    ///
    /// Returns false (and relays nothing) if `id` is not registered.
    pub async fn update(&self, id: &SessionId, transform: Transform) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        entry.transform = transform;

        Self::broadcast(
            &sessions,
            Audience::AllExcept(id),
            ServerMessage::transform_update(id.clone(), &transform),
        );
        true
    }

    /// Relay a shot to everyone else. Registry state is unchanged.
    pub async fn shoot(&self, id: &SessionId, position: Vector3, direction: Vector3) -> bool {
        let sessions = self.sessions.read().await;
        if !sessions.contains_key(id) {
            return false;
        }

        Self::broadcast(
            &sessions,
            Audience::AllExcept(id),
            ServerMessage::ShotFired { id: id.clone(), position, direction },
        );
        true
    }

    /// Relay a damage claim to every session, attacker and victim included.
    ///
    /// The claim is not validated; only the victim's own client applies it.
    pub async fn damage(&self, attacker: &SessionId, victim: SessionId, amount: f32) -> bool {
        let sessions = self.sessions.read().await;
        if !sessions.contains_key(attacker) {
            return false;
        }

        debug!("Relaying damage {} -> {} ({})", attacker, victim, amount);
        Self::broadcast(
            &sessions,
            Audience::All,
            ServerMessage::DamageDealt {
                attacker_id: attacker.clone(),
                victim_id: victim,
                amount,
            },
        );
        true
    }

    /// Change the display label for `id` and relay it to everyone else.
    pub async fn relabel(&self, id: &SessionId, label: &str) -> bool {
        let label: String = label.trim().chars().take(self.config.max_label_len).collect();

        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        entry.label = label.clone();

        Self::broadcast(
            &sessions,
            Audience::AllExcept(id),
            ServerMessage::LabelChanged { id: id.clone(), new_label: label },
        );
        true
    }

    /// Remove `id` and tell the remaining sessions it left.
    pub async fn disconnect(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_none() {
            return false;
        }

        Self::broadcast(&sessions, Audience::All, ServerMessage::SessionLeft { id: id.clone() });

        info!("Session {} disconnected, online: {}", id, sessions.len());
        true
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True when no session is connected.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Snapshot of every live session, ordered by id.
    pub async fn snapshot(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        Self::collect_snapshot(&sessions)
    }

    /// Ids of every live session.
    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    fn spawn_transform(&self) -> Transform {
        match self.rng.lock() {
            Ok(mut rng) => self.config.spawn.sample(&mut *rng),
            Err(_) => Transform::IDENTITY,
        }
    }

    fn collect_snapshot(sessions: &BTreeMap<SessionId, SessionEntry>) -> Vec<SessionInfo> {
        sessions
            .iter()
            .map(|(id, entry)| SessionInfo {
                id: id.clone(),
                transform: entry.transform,
                label: entry.label.clone(),
            })
            .collect()
    }

    /// Send `message` to the audience. A closed outbox only loses this
    /// message; delivery to the others continues.
    fn broadcast(
        sessions: &BTreeMap<SessionId, SessionEntry>,
        audience: Audience<'_>,
        message: ServerMessage,
    ) {
        if cfg!(feature = "debug-tracing") {
            trace!("broadcast {} to {} sessions", message.kind(), sessions.len());
        }

        for (id, entry) in sessions {
            if let Audience::AllExcept(excluded) = audience {
                if id == excluded {
                    continue;
                }
            }
            if entry.outbox.send(message.clone()).is_err() {
                debug!("Skipping closed outbox for {}", id);
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
