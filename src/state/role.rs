//! Role registry.
//!
//! Maps each connected client to the role it declared when joining.
//! Authorization decisions are made against this table, never against a
//! role carried inline with an action.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque connection identifier handed out by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client's declared role.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Role {
    /// No join recorded for this client
    #[default]
    None,

    /// The literal `admin` role
    Admin,

    /// Any role starting with `player`, e.g. `player1`
    Player(String),

    /// Anything else; carries no privileges
    Unrecognized(String),
}

impl Role {
    /// Classify a declared role string.
    pub fn parse(declared: &str) -> Self {
        if declared == "admin" {
            Self::Admin
        } else if declared.starts_with("player") {
            Self::Player(declared.to_string())
        } else {
            Self::Unrecognized(declared.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Admin => "admin",
            Self::Player(name) | Self::Unrecognized(name) => name,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Self::Player(_))
    }

    /// Admin or player.
    pub fn is_participant(&self) -> bool {
        self.is_admin() || self.is_player()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may perform a given action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Any connected client, joined or not
    Anyone,
    /// `admin` or `player*`
    Participant,
    /// `admin` only
    Admin,
}

impl Permission {
    pub fn allows(&self, role: &Role) -> bool {
        match self {
            Self::Anyone => true,
            Self::Participant => role.is_participant(),
            Self::Admin => role.is_admin(),
        }
    }
}

/// A recorded join.
#[derive(Debug, Clone)]
pub struct Registration {
    pub role: Role,

    /// When the role was last declared
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// Role registry - one entry per joined client.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    entries: HashMap<ClientId, Registration>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the role declared by a client.
    ///
    /// A client re-joining replaces its own entry. Entries are keyed by
    /// connection id, so one client can never overwrite another's role.
    pub fn join(&mut self, client: ClientId, declared: &str) -> &Role {
        let registration = Registration {
            role: Role::parse(declared),
            joined_at: chrono::Utc::now(),
        };
        let slot = match self.entries.entry(client) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(registration);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(registration),
        };
        &slot.role
    }

    /// Last recorded role, or [`Role::None`] for unknown clients.
    pub fn role_of(&self, client: &ClientId) -> Role {
        self.entries
            .get(client)
            .map(|r| r.role.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, client: &ClientId) -> Option<&Registration> {
        self.entries.get(client)
    }

    /// Forget a client (on disconnect).
    pub fn remove(&mut self, client: &ClientId) -> Option<Registration> {
        self.entries.remove(client)
    }

    pub fn contains(&self, client: &ClientId) -> bool {
        self.entries.contains_key(client)
    }

    /// Count joined admins.
    pub fn admin_count(&self) -> usize {
        self.entries.values().filter(|r| r.role.is_admin()).count()
    }

    /// Count joined players.
    pub fn player_count(&self) -> usize {
        self.entries.values().filter(|r| r.role.is_player()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
