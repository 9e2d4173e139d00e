//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON text frame carrying one tagged message:
//! `{"type": "<kind>", ...fields}` with kebab-case kinds and camelCase fields.
//!
//! Client-to-server variants never carry the originating id; the server
//! stamps it from the connection before relaying.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::vec3::{Transform, Vector3};

/// Opaque, server-assigned session handle.
///
/// Wrapping the id keeps it from being mixed up with other string fields
/// such as display labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for the `n`th session accepted by a registry.
    pub fn from_counter(n: u64) -> Self {
        Self(format!("player_{}", n))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session id.
    pub id: SessionId,
    /// Last known transform.
    pub transform: Transform,
    /// Display label.
    pub label: String,
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Local transform sample.
    TransformUpdate {
        /// World position.
        position: Vector3,
        /// Euler rotation.
        rotation: Vector3,
        /// Camera roll.
        #[serde(default)]
        roll: f32,
    },

    /// A shot was fired (visual relay only).
    ShotFired {
        /// Muzzle position.
        position: Vector3,
        /// Shot direction.
        direction: Vector3,
    },

    /// Damage claim against another session.
    ///
    /// The attacker is always the sending connection.
    #[serde(rename_all = "camelCase")]
    DamageDealt {
        /// Session that was hit.
        victim_id: SessionId,
        /// Damage amount (weapon configured).
        amount: f32,
    },

    /// Change this session's display label.
    #[serde(rename_all = "camelCase")]
    LabelChanged {
        /// New label.
        new_label: String,
    },
}

impl ClientMessage {
    /// Build a transform update from a pose.
    pub fn transform_update(transform: &Transform) -> Self {
        Self::TransformUpdate {
            position: transform.position,
            rotation: transform.rotation,
            roll: transform.roll,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Id assigned to this connection. Sent once, first.
    IdentityAssigned {
        /// The new session id.
        id: SessionId,
    },

    /// Every session in the registry, including the receiver's own.
    SessionSnapshot {
        /// Current sessions.
        sessions: Vec<SessionInfo>,
    },

    /// Another session connected.
    SessionJoined {
        /// Joined session id.
        id: SessionId,
    },

    /// A session disconnected.
    SessionLeft {
        /// Departed session id.
        id: SessionId,
    },

    /// Relayed transform sample.
    TransformUpdate {
        /// Originating session.
        id: SessionId,
        /// World position.
        position: Vector3,
        /// Euler rotation.
        rotation: Vector3,
        /// Camera roll.
        #[serde(default)]
        roll: f32,
    },

    /// Relayed shot.
    ShotFired {
        /// Shooting session.
        id: SessionId,
        /// Muzzle position.
        position: Vector3,
        /// Shot direction.
        direction: Vector3,
    },

    /// Relayed damage claim, delivered to every session.
    #[serde(rename_all = "camelCase")]
    DamageDealt {
        /// Attacking session (stamped by the server).
        attacker_id: SessionId,
        /// Session that was hit.
        victim_id: SessionId,
        /// Damage amount.
        amount: f32,
    },

    /// Relayed label change.
    #[serde(rename_all = "camelCase")]
    LabelChanged {
        /// Session whose label changed.
        id: SessionId,
        /// New label.
        new_label: String,
    },
}

impl ServerMessage {
    /// Relayed transform update for `id`.
    pub fn transform_update(id: SessionId, transform: &Transform) -> Self {
        Self::TransformUpdate {
            id,
            position: transform.position,
            rotation: transform.rotation,
            roll: transform.roll,
        }
    }

    /// Short kind name, as it appears in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdentityAssigned { .. } => "identity-assigned",
            Self::SessionSnapshot { .. } => "session-snapshot",
            Self::SessionJoined { .. } => "session-joined",
            Self::SessionLeft { .. } => "session-left",
            Self::TransformUpdate { .. } => "transform-update",
            Self::ShotFired { .. } => "shot-fired",
            Self::DamageDealt { .. } => "damage-dealt",
            Self::LabelChanged { .. } => "label-changed",
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
