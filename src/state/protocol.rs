//! Wire messages.
//!
//! Inbound actions and the outbound snapshot event, encoded as
//! `{"event": ..., "data": ...}` JSON objects.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::game::Snapshot;

/// Prefix of a square reference, e.g. `square3`.
pub const SQUARE_PREFIX: &str = "square";

/// Action sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientAction {
    /// Declare a role and receive the current snapshot
    #[serde(alias = "joinGame")]
    Join(String),
    Shuffle,
    RevealSquare { square: String },
    Hide,
    ResetGame,
    Disconnect,
}

impl ClientAction {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Shuffle => "shuffle",
            Self::RevealSquare { .. } => "revealSquare",
            Self::Hide => "hide",
            Self::ResetGame => "resetGame",
            Self::Disconnect => "disconnect",
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Message sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    GameState(Snapshot),
}

impl ServerMessage {
    pub fn to_json_string(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Self::GameState(snapshot) => snapshot,
        }
    }
}

/// Wire decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// A 1-based reference to a numbered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SquareRef {
    ordinal: usize,
}

impl SquareRef {
    /// Parse `square<N>`. Ordinal 0 is malformed since references are 1-based.
    pub fn parse(reference: &str) -> Option<Self> {
        let digits = reference.strip_prefix(SQUARE_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ordinal: usize = digits.parse().ok()?;
        (ordinal > 0).then_some(Self { ordinal })
    }

    pub fn new(ordinal: usize) -> Option<Self> {
        (ordinal > 0).then_some(Self { ordinal })
    }

    /// 1-based display position.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// 0-based cell index.
    pub fn index(&self) -> usize {
        self.ordinal - 1
    }
}

impl fmt::Display for SquareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SQUARE_PREFIX, self.ordinal)
    }
}
