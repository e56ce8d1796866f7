//! State management module for the Squares game.
//!
//! This module provides the core state types and the machine driving them:
//!
//! - `role` - Role registry (who is admin, who is a player)
//! - `game` - The board: numbered cells, collector row, visibility
//! - `machine` - Authorization-checked transitions and the auto-reset ticket
//! - `broadcast` - Snapshot delivery interface
//! - `session` - Shared, lock-guarded session with the auto-reset timer
//! - `protocol` - Wire messages
//! - `config` - Board dimensions and access policy
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     GameSession (Arc + Mutex)                    │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────┐  ┌────────────┐ │
//! │  │             GameStateMachine               │  │ reset task │ │
//! │  │                                            │  │ (tokio)    │ │
//! │  │  ┌──────────────┐   ┌──────────────────┐   │  └────────────┘ │
//! │  │  │ RoleRegistry │   │    GameState     │   │                 │
//! │  │  │              │   │                  │   │  ┌────────────┐ │
//! │  │  │ client_id →  │   │ cells, collector │   │  │Broadcaster │ │
//! │  │  │   role       │   │ next_slot, hidden│   │  │ (transport)│ │
//! │  │  └──────────────┘   └──────────────────┘   │  └────────────┘ │
//! │  └────────────────────────────────────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use squares_state::state::{ClientId, GameConfig, GameStateMachine, Role};
//!
//! let mut machine = GameStateMachine::seeded(GameConfig::default(), 7).unwrap();
//! machine.join(ClientId::from("conn-1"), "admin");
//!
//! machine.shuffle(&Role::Admin).unwrap();
//! let transition = machine.reveal(&Role::parse("player1"), "square3").unwrap();
//! assert!(!transition.is_silent());
//! assert_eq!(machine.snapshot().emp_index, 1);
//! ```

pub mod broadcast;
pub mod config;
pub mod game;
pub mod machine;
pub mod protocol;
pub mod role;
pub mod session;

// Re-export commonly used types
pub use broadcast::{Broadcaster, ChannelBroadcaster, ClientReceiver};
pub use config::{AccessPolicy, ConfigError, GameConfig, DEFAULT_AUTO_RESET_DELAY, MAX_CELLS};
pub use game::{deal, Cell, GameState, Reveal, Snapshot, Token, BLANK};
pub use machine::{Action, ActionError, AutoReset, Dispatch, GameStateMachine, Transition};
pub use protocol::{ClientAction, ProtocolError, ServerMessage, SquareRef};
pub use role::{ClientId, Permission, Registration, Role, RoleRegistry};
pub use session::{GameSession, SessionError};
