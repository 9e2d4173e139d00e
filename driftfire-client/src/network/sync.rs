//! Synchronization manager - local transform out, remote state in
//!
//! Driven by a single game loop:
//! 1. `poll` drains whatever the reader task queued since the last tick
//! 2. the local transform goes out if the send cadence allows it
//! 3. every remote entity closes part of the gap to its latest sample
//!
//! Without a connection the manager is offline: nothing is sent, nothing
//! arrives, and local health and combat keep working.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use driftfire::{ClientMessage, ServerMessage, SessionId, Transform, Vector3};
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use super::connection::{connect_with_retry, Connection, ConnectionError};
use crate::game::combat::{HitResult, Ray};
use crate::game::health::{DamageOutcome, HealthSystem};
use crate::game::remote::RemoteEntities;

// ============================================================================
// SEND CADENCE
// ============================================================================

/// Soft ceiling on the outbound transform rate.
///
/// A tick sends only if strictly more than `interval` has passed since the
/// previous send. Slow ticks send every time; fast ticks coalesce.
#[derive(Debug, Clone, Copy)]
pub struct SendCadence {
    interval: Duration,
    last: Option<Instant>,
}

impl SendCadence {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether to send at `now`. Records the send when it says yes.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) <= self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// ============================================================================
// SYNC MANAGER
// ============================================================================

/// Shot effects kept between drains. The oldest are dropped past this.
pub const MAX_PENDING_EFFECTS: usize = 256;

pub enum Link {
    Online(Connection),
    Offline,
}

/// A relayed shot from another player, for effects only.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotEffect {
    pub shooter: SessionId,
    pub position: Vector3,
    pub direction: Vector3,
}

pub struct SyncManager {
    config: ClientConfig,
    link: Link,
    local_id: Option<SessionId>,
    remotes: RemoteEntities,
    health: HealthSystem,
    cadence: SendCadence,
    effects: VecDeque<ShotEffect>,
}

impl SyncManager {
    /// A manager that never touches the network.
    pub fn offline(config: ClientConfig) -> Self {
        let cadence = SendCadence::new(config.send_interval);
        Self {
            config,
            link: Link::Offline,
            local_id: None,
            remotes: RemoteEntities::new(),
            health: HealthSystem::default(),
            cadence,
            effects: VecDeque::with_capacity(MAX_PENDING_EFFECTS),
        }
    }

    /// Connect to the configured endpoint. Never fails: if every attempt
    /// is refused the manager stays offline.
    pub async fn connect(config: ClientConfig) -> Self {
        let mut manager = Self::offline(config);
        if let Err(e) = manager.reconnect().await {
            warn!("Relay unavailable, continuing offline: {}", e);
        }
        manager
    }

    /// Drop any current link and open a fresh one.
    ///
    /// On success the configured label is pushed once. On failure the
    /// manager is left offline.
    pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.close().await;

        info!("Connecting to {}", self.config.endpoint);
        let connection = connect_with_retry(&self.config.endpoint, &self.config.reconnect).await?;
        if let Some(label) = &self.config.label {
            connection.send(ClientMessage::LabelChanged { new_label: label.clone() })?;
        }

        self.link = Link::Online(connection);
        self.cadence.reset();
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        matches!(self.link, Link::Online(_))
    }

    /// Id the server assigned, once it has arrived.
    pub fn local_id(&self) -> Option<&SessionId> {
        self.local_id.as_ref()
    }

    pub fn remotes(&self) -> &RemoteEntities {
        &self.remotes
    }

    pub fn health(&self) -> &HealthSystem {
        &self.health
    }

    pub fn health_mut(&mut self) -> &mut HealthSystem {
        &mut self.health
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ========================================================================
    // PER-TICK
    // ========================================================================

    /// One game loop step.
    ///
    /// Relayed shots pile up until [`SyncManager::drain_effects`] is
    /// called, so callers that care about effects drain once per tick.
    pub fn tick(&mut self, now: Instant, local: &Transform) {
        self.poll();
        self.send_transform(now, local);
        self.interpolate();
    }

    /// Apply every queued inbound message. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match &mut self.link {
                Link::Online(connection) => connection.try_recv(),
                Link::Offline => break,
            };
            match next {
                Ok(Some(msg)) => {
                    self.ingest(msg);
                    handled += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Lost relay connection: {}", e);
                    self.go_offline();
                    break;
                }
            }
        }
        handled
    }

    /// Send the local transform if the cadence allows. Returns whether it
    /// went out.
    pub fn send_transform(&mut self, now: Instant, local: &Transform) -> bool {
        if !self.is_online() || !self.cadence.ready(now) {
            return false;
        }
        self.send(ClientMessage::transform_update(local))
    }

    pub fn interpolate(&mut self) {
        self.remotes.interpolate(self.config.blend);
    }

    // ========================================================================
    // INBOUND
    // ========================================================================

    fn is_local(&self, id: &SessionId) -> bool {
        self.local_id.as_ref() == Some(id)
    }

    /// Apply one server message to local state.
    pub fn ingest(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::IdentityAssigned { id } => {
                info!("Assigned session id {}", id);
                self.remotes.remove(&id);
                self.local_id = Some(id);
            }
            ServerMessage::SessionSnapshot { sessions } => {
                for session in sessions {
                    if self.is_local(&session.id) {
                        continue;
                    }
                    let entity = self.remotes.observe(session.id);
                    entity.set_target(session.transform);
                    entity.set_label(session.label);
                }
            }
            ServerMessage::SessionJoined { id } => {
                if !self.is_local(&id) {
                    debug!("{} joined", id);
                    self.remotes.observe(id);
                }
            }
            ServerMessage::SessionLeft { id } => {
                debug!("{} left", id);
                self.remotes.remove(&id);
            }
            ServerMessage::TransformUpdate { id, position, rotation, roll } => {
                if !self.is_local(&id) {
                    self.remotes
                        .observe(id)
                        .set_target(Transform { position, rotation, roll });
                }
            }
            ServerMessage::ShotFired { id, position, direction } => {
                if !self.is_local(&id) {
                    if self.effects.len() >= MAX_PENDING_EFFECTS {
                        self.effects.pop_front();
                    }
                    self.effects.push_back(ShotEffect { shooter: id, position, direction });
                }
            }
            ServerMessage::DamageDealt { attacker_id, victim_id, amount } => {
                if !self.is_local(&victim_id) {
                    return;
                }
                match self.health.apply_damage(amount) {
                    DamageOutcome::Killed => info!("Killed by {}", attacker_id),
                    DamageOutcome::Wounded { remaining } => {
                        info!("Hit by {} for {}, {} left", attacker_id, amount, remaining)
                    }
                    DamageOutcome::Ignored => debug!("Ignored damage {} from {}", amount, attacker_id),
                }
            }
            ServerMessage::LabelChanged { id, new_label } => {
                if !self.is_local(&id) {
                    self.remotes.observe(id).set_label(new_label);
                }
            }
        }
    }

    /// Effects queued since the last call, oldest first. At most
    /// [`MAX_PENDING_EFFECTS`] are kept; older ones were dropped.
    pub fn drain_effects(&mut self) -> Vec<ShotEffect> {
        self.effects.drain(..).collect()
    }

    // ========================================================================
    // OUTBOUND
    // ========================================================================

    /// Tell the others about a shot. A player hit also carries a damage
    /// claim addressed to the victim. Returns false when offline.
    pub fn report_shot(&mut self, ray: &Ray, hit: Option<&HitResult>) -> bool {
        if !self.is_online() {
            return false;
        }

        let shot = ClientMessage::ShotFired {
            position: ray.origin().into(),
            direction: ray.direction().into(),
        };
        if !self.send(shot) {
            return false;
        }

        if let Some(HitResult::Player { victim, damage, .. }) = hit {
            return self.send(ClientMessage::DamageDealt {
                victim_id: victim.clone(),
                amount: *damage,
            });
        }
        true
    }

    fn send(&mut self, msg: ClientMessage) -> bool {
        let result = match &self.link {
            Link::Online(connection) => connection.send(msg),
            Link::Offline => return false,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Lost relay connection: {}", e);
                self.go_offline();
                false
            }
        }
    }

    fn go_offline(&mut self) {
        self.link = Link::Offline;
        self.local_id = None;
        self.remotes.clear();
    }

    /// Close the connection, if any. The manager stays usable offline.
    pub async fn close(&mut self) {
        if let Link::Online(connection) = std::mem::replace(&mut self.link, Link::Offline) {
            connection.close().await;
        }
        self.local_id = None;
        self.remotes.clear();
    }
}
