//! Squares State Library
//!
//! This crate provides the authoritative game state for the Squares reveal
//! game: a row of numbered squares that players reveal one at a time, whose
//! values are copied into a shorter row of collector squares, with an admin
//! controlling shuffling and visibility.
//!
//! # Overview
//!
//! - **Role Registry** - Maps each connection to its declared role (`admin`,
//!   `player*`, or nothing).
//!
//! - **Game State** - Numbered cells, the collector row and the visibility
//!   flag, with the collector always filled as a prefix.
//!
//! - **State Machine** - Shuffle, reveal, hide and reset as authorized
//!   transitions. A fully revealed board schedules an auto-reset that is
//!   ignored if the game was reset or reshuffled in the meantime.
//!
//! - **Session** - Serializes concurrent actions and runs the auto-reset
//!   timer on tokio, delivering full snapshots through a [`Broadcaster`].
//!
//! # Design Principles
//!
//! 1. **Full snapshots only** - Every delivery carries the complete state.
//!
//! 2. **Roles come from the registry** - Actions never carry their own role.
//!
//! 3. **Rejections are silent** - Unauthorized or malformed actions change
//!    nothing and broadcast nothing; the caller gets an error to log.
//!
//! 4. **No transport** - Sockets, HTTP and process setup live elsewhere.
//!
//! # Example
//!
//! ```rust
//! use squares_state::state::{
//!     ChannelBroadcaster, ClientAction, ClientId, GameConfig, GameSession,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let session = GameSession::new(GameConfig::default(), ChannelBroadcaster::new()).unwrap();
//!
//! let admin = ClientId::from("conn-1");
//! let mut inbox = session.broadcaster().connect(admin.clone());
//!
//! session.dispatch(&admin, ClientAction::Join("admin".to_string())).unwrap();
//! session.handle_message(&admin, r#"{"event":"shuffle"}"#).unwrap();
//!
//! // Join snapshot, then the shuffled board
//! assert!(inbox.try_recv().is_ok());
//! assert_eq!(inbox.try_recv().unwrap().snapshot().numbered_squares.len(), 7);
//! # }
//! ```
//!
//! [`Broadcaster`]: state::Broadcaster

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
