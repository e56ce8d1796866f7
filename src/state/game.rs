//! Game state.
//!
//! The single authoritative board: numbered cells that get revealed one at
//! a time, the collector row their values are copied into, and the
//! visibility flag.
//!
//! # Invariants
//!
//! - `0 <= next_slot <= collector_slots`
//! - exactly the first `next_slot` collector slots are filled
//! - a cell's `revealed` flag only goes back to `false` through a reset or
//!   a shuffle

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::GameConfig;

/// Display string of the blank token.
pub const BLANK: &str = ".";

/// A value held by a numbered cell or a collector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    /// Decimal digit 0-9
    Digit(u8),
    /// Non-scoring cell
    Blank,
}

impl Token {
    /// Value of every cell before the first shuffle.
    pub const NEUTRAL: Token = Token::Digit(0);

    pub fn digit(value: u8) -> Option<Self> {
        (value <= 9).then_some(Self::Digit(value))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digit(d) => write!(f, "{}", d),
            Self::Blank => f.write_str(BLANK),
        }
    }
}

/// A single numbered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub value: Token,
    pub revealed: bool,
}

impl Cell {
    pub fn new(value: Token) -> Self {
        Self {
            value,
            revealed: false,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(Token::NEUTRAL)
    }
}

/// Result of revealing one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// Cell was already revealed; nothing changed
    AlreadyRevealed,

    /// Value copied into the given collector slot
    Collected { slot: usize, value: Token },

    /// Collector row was full; the cell is revealed but its value is dropped
    Dropped { value: Token },
}

impl Reveal {
    /// Whether the reveal changed the board.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::AlreadyRevealed)
    }
}

/// The complete state sent to clients. Always full, never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub numbered_squares: Vec<String>,
    pub numbered_disabled: Vec<bool>,
    pub empty_squares: Vec<String>,
    pub emp_index: usize,
    pub hide: bool,
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "numberedSquares": self.numbered_squares,
            "numberedDisabled": self.numbered_disabled,
            "emptySquares": self.empty_squares,
            "empIndex": self.emp_index,
            "hide": self.hide
        })
    }
}

/// Authoritative board state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    cells: Vec<Cell>,
    collected: Vec<Option<Token>>,
    next_slot: usize,
    hidden: bool,
}

impl GameState {
    /// Fresh board with `cells` neutral cells and `slots` empty collector slots.
    pub fn new(cells: usize, slots: usize) -> Self {
        Self {
            cells: vec![Cell::default(); cells],
            collected: vec![None; slots],
            next_slot: 0,
            hidden: false,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.cells, config.collector_slots)
    }

    /// Reinitialize in place to the default contents, keeping the shape.
    pub fn reset(&mut self) {
        *self = Self::new(self.cells.len(), self.collected.len());
    }

    /// Install freshly dealt values: every cell unrevealed, collector
    /// cleared. Visibility is left alone.
    ///
    /// Returns `false` and leaves the board untouched if the number of
    /// values does not match the board.
    pub fn install(&mut self, values: &[Token]) -> bool {
        if values.len() != self.cells.len() {
            return false;
        }
        self.cells = values.iter().copied().map(Cell::new).collect();
        self.collected.iter_mut().for_each(|slot| *slot = None);
        self.next_slot = 0;
        true
    }

    /// Reveal the cell at `index` (0-based) and copy its value into the
    /// next free collector slot. `None` if the index is out of range.
    pub fn reveal(&mut self, index: usize) -> Option<Reveal> {
        let cell = self.cells.get_mut(index)?;
        if cell.revealed {
            return Some(Reveal::AlreadyRevealed);
        }
        cell.revealed = true;
        let value = cell.value;

        match self.collected.get_mut(self.next_slot) {
            Some(slot) => {
                *slot = Some(value);
                let filled = self.next_slot;
                self.next_slot += 1;
                Some(Reveal::Collected {
                    slot: filled,
                    value,
                })
            }
            None => Some(Reveal::Dropped { value }),
        }
    }

    /// Flip visibility. Returns the new value.
    pub fn toggle_hidden(&mut self) -> bool {
        self.hidden = !self.hidden;
        self.hidden
    }

    pub fn all_revealed(&self) -> bool {
        self.cells.iter().all(|c| c.revealed)
    }

    pub fn revealed_count(&self) -> usize {
        self.cells.iter().filter(|c| c.revealed).count()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn collected(&self) -> &[Option<Token>] {
        &self.collected
    }

    /// Index of the next free collector slot.
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn slot_count(&self) -> usize {
        self.collected.len()
    }

    /// Collector slots are filled exactly as a prefix of length `next_slot`.
    pub fn is_consistent(&self) -> bool {
        self.next_slot <= self.collected.len()
            && self
                .collected
                .iter()
                .enumerate()
                .all(|(i, slot)| slot.is_some() == (i < self.next_slot))
    }

    /// Full client snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            numbered_squares: self.cells.iter().map(|c| c.value.to_string()).collect(),
            numbered_disabled: self.cells.iter().map(|c| c.revealed).collect(),
            empty_squares: self
                .collected
                .iter()
                .map(|slot| slot.map(|t| t.to_string()).unwrap_or_default())
                .collect(),
            emp_index: self.next_slot,
            hide: self.hidden,
        }
    }
}

/// Deal a fresh set of cell values: `config.digits()` uniform random digits
/// plus `config.blanks` blanks, in a uniformly random order.
pub fn deal<R: Rng>(config: &GameConfig, rng: &mut R) -> Vec<Token> {
    let mut values: Vec<Token> = (0..config.digits())
        .map(|_| Token::Digit(rng.random_range(0..=9)))
        .chain(std::iter::repeat(Token::Blank).take(config.blanks))
        .collect();
    // Fisher-Yates
    values.shuffle(rng);
    values
}
