//! Game configuration.
//!
//! Board dimensions, the digit/blank split produced by a shuffle, the
//! auto-reset delay, and which roles may perform each action.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::role::Permission;

/// Largest supported board.
pub const MAX_CELLS: usize = 16;

/// Default delay before a fully revealed board resets itself.
pub const DEFAULT_AUTO_RESET_DELAY: Duration = Duration::from_secs(3);

/// Per-action authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    pub shuffle: Permission,
    pub reveal: Permission,
    pub hide: Permission,
    pub reset: Permission,
}

impl AccessPolicy {
    /// Admin controls the board, players reveal, anyone may reset.
    pub const fn strict() -> Self {
        Self {
            shuffle: Permission::Admin,
            reveal: Permission::Participant,
            hide: Permission::Admin,
            reset: Permission::Anyone,
        }
    }

    /// Like [`AccessPolicy::strict`], but reset is admin-only as well.
    pub const fn locked() -> Self {
        Self {
            reset: Permission::Admin,
            ..Self::strict()
        }
    }

    /// No role checks at all.
    pub const fn open() -> Self {
        Self {
            shuffle: Permission::Anyone,
            reveal: Permission::Anyone,
            hide: Permission::Anyone,
            reset: Permission::Anyone,
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// Static game configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of numbered cells (N)
    pub cells: usize,

    /// Number of collector slots (M), strictly fewer than `cells`
    pub collector_slots: usize,

    /// Blank tokens dealt per shuffle; the rest of the cells get digits
    pub blanks: usize,

    /// Delay before a fully revealed board resets
    #[serde(rename = "auto_reset_delay_ms", with = "millis")]
    pub auto_reset_delay: Duration,

    pub access: AccessPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cells: 7,
            collector_slots: 5,
            blanks: 2,
            auto_reset_delay: DEFAULT_AUTO_RESET_DELAY,
            access: AccessPolicy::strict(),
        }
    }
}

impl GameConfig {
    /// Six cells, five collector slots, one blank.
    pub fn six_square() -> Self {
        Self {
            cells: 6,
            collector_slots: 5,
            blanks: 1,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_auto_reset_delay(mut self, delay: Duration) -> Self {
        self.auto_reset_delay = delay;
        self
    }

    /// Digits dealt per shuffle.
    pub fn digits(&self) -> usize {
        self.cells.saturating_sub(self.blanks)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cells == 0 || self.cells > MAX_CELLS {
            return Err(ConfigError::CellCount(self.cells));
        }
        if self.blanks == 0 || self.blanks >= self.cells {
            return Err(ConfigError::BlankCount {
                blanks: self.blanks,
                cells: self.cells,
            });
        }
        if self.collector_slots == 0 || self.collector_slots >= self.cells {
            return Err(ConfigError::CollectorSlots {
                slots: self.collector_slots,
                cells: self.cells,
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cell count must be between 1 and 16, got {0}")]
    CellCount(usize),

    #[error("need at least one blank and at least one digit, got {blanks} blanks for {cells} cells")]
    BlankCount { blanks: usize, cells: usize },

    #[error("collector slots must be between 1 and {cells} (exclusive), got {slots}")]
    CollectorSlots { slots: usize, cells: usize },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
