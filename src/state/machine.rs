//! Game state machine.
//!
//! Applies authorization-checked transitions to the single [`GameState`]
//! and tells the caller what to deliver.
//!
//! # Transitions
//!
//! ```text
//!            shuffle / reset (generation += 1)
//!   ┌──────────────────────────────────────────────┐
//!   ▼                                              │
//! ┌───────────┐  reveal   ┌───────────┐  last     ┌──────────────┐
//! │ unrevealed│──────────▶│ revealing │─────────▶│ all revealed │
//! │   board   │           │           │  reveal  │ reset pending│
//! └───────────┘           └───────────┘          └──────┬───────┘
//!   ▲                                                   │ delay elapses,
//!   └───────────────────────────────────────────────────┘ ticket still current
//! ```
//!
//! Each cell moves `unrevealed -> revealed` exactly once per generation.
//! The machine does no I/O and owns no timers: a reveal that completes the
//! board hands back an [`AutoReset`] ticket, and whoever owns the clock
//! calls [`GameStateMachine::fire_auto_reset`] when the delay has elapsed.
//! Tickets from an earlier generation are ignored.

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::config::{ConfigError, GameConfig};
use super::game::{self, GameState, Reveal, Snapshot};
use super::protocol::{ClientAction, SquareRef};
use super::role::{ClientId, Role, RoleRegistry};

/// A privileged action, for authorization and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shuffle,
    Reveal,
    Hide,
    Reset,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shuffle => "shuffle",
            Self::Reveal => "reveal",
            Self::Hide => "hide",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected actions. None of these change state or produce a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("role '{role}' may not {action}")]
    Unauthorized { action: Action, role: Role },

    #[error("malformed square reference {0:?}")]
    MalformedSquare(String),

    #[error("square {ordinal} is out of range for a board of {cells}")]
    SquareOutOfRange { ordinal: usize, cells: usize },
}

/// What to deliver after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Send the snapshot to every connected client
    Broadcast(Snapshot),
    /// Send the snapshot to one client only
    Unicast(ClientId, Snapshot),
    /// Nothing changed; send nothing
    Silent,
}

/// A scheduled auto-reset, valid only for the generation it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoReset {
    generation: u64,
    pub delay: Duration,
}

impl AutoReset {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of an accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub dispatch: Dispatch,

    /// Set when the board just became fully revealed
    pub auto_reset: Option<AutoReset>,
}

impl Transition {
    fn broadcast(snapshot: Snapshot) -> Self {
        Self {
            dispatch: Dispatch::Broadcast(snapshot),
            auto_reset: None,
        }
    }

    fn silent() -> Self {
        Self {
            dispatch: Dispatch::Silent,
            auto_reset: None,
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self.dispatch, Dispatch::Silent)
    }
}

/// The authoritative game: board, roles and the pending auto-reset.
#[derive(Debug)]
pub struct GameStateMachine {
    config: GameConfig,
    state: GameState,
    roles: RoleRegistry,
    rng: StdRng,

    /// Bumped by every shuffle and reset
    generation: u64,

    /// Outstanding auto-reset, if the board is fully revealed
    pending_reset: Option<AutoReset>,
}

impl GameStateMachine {
    /// Create a machine with an OS-seeded random source.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Create a machine with a fixed seed, for reproducible shuffles.
    pub fn seeded(config: GameConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: GameConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: GameState::from_config(&config),
            config,
            roles: RoleRegistry::new(),
            rng,
            generation: 0,
            pending_reset: None,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_auto_reset(&self) -> Option<AutoReset> {
        self.pending_reset
    }

    /// Dispatch an inbound action from `client`, resolving its role from
    /// the registry.
    pub fn handle(
        &mut self,
        client: &ClientId,
        action: ClientAction,
    ) -> Result<Transition, ActionError> {
        let role = self.roles.role_of(client);
        match action {
            ClientAction::Join(declared) => Ok(self.join(client.clone(), &declared)),
            ClientAction::Shuffle => self.shuffle(&role),
            ClientAction::RevealSquare { square } => self.reveal(&role, &square),
            ClientAction::Hide => self.toggle_hide(&role),
            ClientAction::ResetGame => self.reset(&role),
            ClientAction::Disconnect => Ok(self.disconnect(client)),
        }
    }

    /// Record the client's role and send it the current snapshot.
    pub fn join(&mut self, client: ClientId, declared: &str) -> Transition {
        let role = self.roles.join(client.clone(), declared);
        debug!(client = %client, role = %role, "Client joined");
        Transition {
            dispatch: Dispatch::Unicast(client, self.state.snapshot()),
            auto_reset: None,
        }
    }

    /// Forget the client's role. Nothing is broadcast.
    pub fn disconnect(&mut self, client: &ClientId) -> Transition {
        if self.roles.remove(client).is_some() {
            debug!(client = %client, "Client left");
        }
        Transition::silent()
    }

    /// Deal a fresh board. Visibility is kept.
    pub fn shuffle(&mut self, role: &Role) -> Result<Transition, ActionError> {
        self.authorize(Action::Shuffle, role)?;

        let values = game::deal(&self.config, &mut self.rng);
        if !self.state.install(&values) {
            warn!(
                dealt = values.len(),
                cells = self.state.cell_count(),
                "Dealt values do not fit the board, shuffle ignored"
            );
            return Ok(Transition::silent());
        }
        self.advance_generation();

        info!(generation = self.generation, "Board shuffled");
        Ok(Transition::broadcast(self.state.snapshot()))
    }

    /// Reveal the cell named by `square` (`square<N>`, 1-based).
    pub fn reveal(&mut self, role: &Role, square: &str) -> Result<Transition, ActionError> {
        self.authorize(Action::Reveal, role)?;

        let Some(square_ref) = SquareRef::parse(square) else {
            warn!(square, "Malformed square reference");
            return Err(ActionError::MalformedSquare(square.to_string()));
        };

        let outcome = match self.state.reveal(square_ref.index()) {
            Some(outcome) => outcome,
            None => {
                warn!(square, cells = self.state.cell_count(), "Square out of range");
                return Err(ActionError::SquareOutOfRange {
                    ordinal: square_ref.ordinal(),
                    cells: self.state.cell_count(),
                });
            }
        };

        match outcome {
            Reveal::AlreadyRevealed => {
                debug!(square, "Square already revealed");
                return Ok(Transition::silent());
            }
            Reveal::Collected { slot, value } => {
                debug!(square, %value, slot, "Square revealed");
            }
            Reveal::Dropped { value } => {
                debug!(square, %value, "Square revealed, collector full");
            }
        }

        let mut transition = Transition::broadcast(self.state.snapshot());
        if self.state.all_revealed() {
            let ticket = AutoReset {
                generation: self.generation,
                delay: self.config.auto_reset_delay,
            };
            self.pending_reset = Some(ticket);
            transition.auto_reset = Some(ticket);
            info!(
                generation = self.generation,
                delay_ms = u64::try_from(ticket.delay.as_millis()).unwrap_or(u64::MAX),
                "All squares revealed, auto-reset scheduled"
            );
        }
        Ok(transition)
    }

    /// Flip the visibility flag.
    pub fn toggle_hide(&mut self, role: &Role) -> Result<Transition, ActionError> {
        self.authorize(Action::Hide, role)?;

        let hidden = self.state.toggle_hidden();
        debug!(hidden, "Visibility toggled");
        Ok(Transition::broadcast(self.state.snapshot()))
    }

    /// Reinitialize the board to its defaults.
    pub fn reset(&mut self, role: &Role) -> Result<Transition, ActionError> {
        self.authorize(Action::Reset, role)?;

        self.apply_reset();
        info!(generation = self.generation, "Game reset");
        Ok(Transition::broadcast(self.state.snapshot()))
    }

    /// Run a scheduled auto-reset.
    ///
    /// Only the ticket currently pending is honoured. A ticket superseded by
    /// a shuffle or reset in the meantime yields a silent transition.
    pub fn fire_auto_reset(&mut self, ticket: AutoReset) -> Transition {
        if self.pending_reset != Some(ticket) || ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                generation = self.generation,
                "Ignoring stale auto-reset"
            );
            return Transition::silent();
        }

        self.apply_reset();
        info!(generation = self.generation, "Game auto-reset");
        Transition::broadcast(self.state.snapshot())
    }

    fn authorize(&self, action: Action, role: &Role) -> Result<(), ActionError> {
        let permission = match action {
            Action::Shuffle => self.config.access.shuffle,
            Action::Reveal => self.config.access.reveal,
            Action::Hide => self.config.access.hide,
            Action::Reset => self.config.access.reset,
        };
        if permission.allows(role) {
            Ok(())
        } else {
            warn!(%action, %role, "Unauthorized action");
            Err(ActionError::Unauthorized {
                action,
                role: role.clone(),
            })
        }
    }

    fn apply_reset(&mut self) {
        self.state.reset();
        self.advance_generation();
    }

    /// Start a new generation, invalidating any pending auto-reset.
    fn advance_generation(&mut self) {
        self.generation += 1;
        self.pending_reset = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::config::AccessPolicy;
    use crate::state::game::Token;
    use pretty_assertions::assert_eq;

    fn machine() -> GameStateMachine {
        GameStateMachine::seeded(GameConfig::default(), 11).unwrap()
    }

    fn admin() -> Role {
        Role::Admin
    }

    fn player() -> Role {
        Role::parse("player1")
    }

    fn broadcast_of(transition: &Transition) -> &Snapshot {
        match &transition.dispatch {
            Dispatch::Broadcast(snapshot) => snapshot,
            other => panic!("expected broadcast, got {:?}", other),
        }
    }

    fn reveal_all(machine: &mut GameStateMachine) -> Option<AutoReset> {
        let mut ticket = None;
        for ordinal in 1..=machine.state().cell_count() {
            let transition = machine.reveal(&player(), &format!("square{ordinal}")).unwrap();
            ticket = transition.auto_reset.or(ticket);
        }
        ticket
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GameConfig {
            blanks: 0,
            ..GameConfig::default()
        };
        assert!(GameStateMachine::new(config).is_err());
    }

    #[test]
    fn test_join_unicasts_snapshot() {
        let mut machine = machine();
        let client = ClientId::from("c1");

        let transition = machine.join(client.clone(), "player1");
        assert_eq!(
            transition.dispatch,
            Dispatch::Unicast(client.clone(), machine.snapshot())
        );
        assert!(machine.roles().role_of(&client).is_player());
    }

    #[test]
    fn test_shuffle_requires_admin() {
        let mut machine = machine();
        let before = machine.state().clone();

        let err = machine.shuffle(&player()).unwrap_err();
        assert_eq!(
            err,
            ActionError::Unauthorized {
                action: Action::Shuffle,
                role: player()
            }
        );
        assert_eq!(machine.state(), &before);
        assert_eq!(machine.generation(), 0);

        assert!(machine.shuffle(&Role::None).is_err());
    }

    #[test]
    fn test_shuffle_deals_configured_split() {
        let mut machine = machine();
        let transition = machine.shuffle(&admin()).unwrap();
        let snapshot = broadcast_of(&transition);

        assert_eq!(snapshot.numbered_squares.len(), 7);
        assert_eq!(
            snapshot.numbered_squares.iter().filter(|v| *v == ".").count(),
            2
        );
        assert_eq!(snapshot.numbered_disabled, vec![false; 7]);
        assert_eq!(snapshot.empty_squares, vec![""; 5]);
        assert_eq!(snapshot.emp_index, 0);
        assert_eq!(machine.generation(), 1);
    }

    #[test]
    fn test_shuffle_installs_whole_board() {
        let mut machine = machine();
        machine.reveal(&admin(), "square1").unwrap();
        machine.shuffle(&admin()).unwrap();

        let state = machine.state();
        assert_eq!(state.cell_count(), 7);
        assert_eq!(state.revealed_count(), 0);
        assert_eq!(state.next_slot(), 0);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_shuffle_keeps_hidden() {
        let mut machine = machine();
        machine.toggle_hide(&admin()).unwrap();
        let transition = machine.shuffle(&admin()).unwrap();
        assert!(broadcast_of(&transition).hide);
    }

    #[test]
    fn test_reveal_copies_into_collector() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        let value = machine.state().cell(2).unwrap().value;

        let transition = machine.reveal(&player(), "square3").unwrap();
        let snapshot = broadcast_of(&transition);

        assert!(snapshot.numbered_disabled[2]);
        assert_eq!(snapshot.empty_squares[0], value.to_string());
        assert_eq!(snapshot.emp_index, 1);
        assert!(transition.auto_reset.is_none());
    }

    #[test]
    fn test_reveal_twice_is_silent() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        machine.reveal(&player(), "square3").unwrap();
        let before = machine.state().clone();

        let transition = machine.reveal(&admin(), "square3").unwrap();
        assert!(transition.is_silent());
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn test_reveal_authorization() {
        let mut machine = machine();
        for role in [Role::None, Role::parse("guest"), Role::parse("")] {
            let err = machine.reveal(&role, "square1").unwrap_err();
            assert!(matches!(err, ActionError::Unauthorized { action: Action::Reveal, .. }));
        }
        assert_eq!(machine.state().revealed_count(), 0);

        assert!(machine.reveal(&admin(), "square1").is_ok());
    }

    #[test]
    fn test_reveal_bad_references() {
        let mut machine = machine();

        assert_eq!(
            machine.reveal(&player(), "squareX").unwrap_err(),
            ActionError::MalformedSquare("squareX".to_string())
        );
        assert_eq!(
            machine.reveal(&player(), "square0").unwrap_err(),
            ActionError::MalformedSquare("square0".to_string())
        );
        assert_eq!(
            machine.reveal(&player(), "square8").unwrap_err(),
            ActionError::SquareOutOfRange {
                ordinal: 8,
                cells: 7
            }
        );
        assert_eq!(machine.state().revealed_count(), 0);
    }

    #[test]
    fn test_reveal_before_shuffle_collects_neutral_value() {
        let mut machine = machine();
        let transition = machine.reveal(&player(), "square1").unwrap();
        assert_eq!(broadcast_of(&transition).empty_squares[0], "0");
    }

    #[test]
    fn test_reveal_all_caps_collector_and_schedules_reset() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        let generation = machine.generation();

        let ticket = reveal_all(&mut machine).unwrap();
        assert_eq!(ticket.generation(), generation);
        assert_eq!(ticket.delay, Duration::from_secs(3));
        assert_eq!(machine.pending_auto_reset(), Some(ticket));

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.emp_index, 5);
        assert!(snapshot.empty_squares.iter().all(|s| !s.is_empty()));
        assert!(machine.state().is_consistent());
    }

    #[test]
    fn test_collector_is_a_prefix_of_reveal_order() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        let order = [5, 1, 7, 2];
        let expected: Vec<Token> = order
            .iter()
            .map(|o| machine.state().cell(o - 1).unwrap().value)
            .collect();

        for ordinal in order {
            machine.reveal(&player(), &format!("square{ordinal}")).unwrap();
            assert!(machine.state().is_consistent());
        }

        let collected: Vec<Token> = machine.state().collected()[..4]
            .iter()
            .map(|slot| slot.unwrap())
            .collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_auto_reset_fires() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        machine.toggle_hide(&admin()).unwrap();
        let ticket = reveal_all(&mut machine).unwrap();

        let transition = machine.fire_auto_reset(ticket);
        let snapshot = broadcast_of(&transition);
        assert_eq!(snapshot, &GameState::from_config(machine.config()).snapshot());
        assert!(machine.pending_auto_reset().is_none());

        // Firing the same ticket again does nothing
        assert!(machine.fire_auto_reset(ticket).is_silent());
    }

    #[test]
    fn test_stale_auto_reset_after_manual_reset() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        let ticket = reveal_all(&mut machine).unwrap();

        machine.reset(&player()).unwrap();
        assert!(machine.pending_auto_reset().is_none());

        // New round in progress; the old timer must not wipe it
        machine.shuffle(&admin()).unwrap();
        machine.reveal(&player(), "square1").unwrap();
        let before = machine.state().clone();

        assert!(machine.fire_auto_reset(ticket).is_silent());
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn test_stale_auto_reset_after_shuffle() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        let ticket = reveal_all(&mut machine).unwrap();

        machine.shuffle(&admin()).unwrap();
        let before = machine.state().clone();
        assert!(machine.fire_auto_reset(ticket).is_silent());
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn test_hide_toggle() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        let values = machine.snapshot().numbered_squares;

        assert!(machine.toggle_hide(&player()).is_err());
        assert!(!machine.state().is_hidden());

        let first = machine.toggle_hide(&admin()).unwrap();
        assert!(broadcast_of(&first).hide);
        let second = machine.toggle_hide(&admin()).unwrap();
        assert!(!broadcast_of(&second).hide);
        assert_eq!(broadcast_of(&second).numbered_squares, values);
    }

    #[test]
    fn test_reset_policy() {
        let mut machine = machine();
        machine.shuffle(&admin()).unwrap();
        machine.reveal(&player(), "square2").unwrap();

        // Default policy lets anyone reset
        let transition = machine.reset(&Role::None).unwrap();
        assert_eq!(broadcast_of(&transition).emp_index, 0);

        let config = GameConfig::default().with_access(AccessPolicy::locked());
        let mut locked = GameStateMachine::seeded(config, 1).unwrap();
        assert!(matches!(
            locked.reset(&player()),
            Err(ActionError::Unauthorized { action: Action::Reset, .. })
        ));
        assert!(locked.reset(&admin()).is_ok());
    }

    #[test]
    fn test_open_policy() {
        let config = GameConfig::default().with_access(AccessPolicy::open());
        let mut machine = GameStateMachine::seeded(config, 1).unwrap();

        assert!(machine.shuffle(&Role::None).is_ok());
        assert!(machine.reveal(&Role::None, "square1").is_ok());
        assert!(machine.toggle_hide(&Role::None).is_ok());
    }

    #[test]
    fn test_handle_uses_registered_role() {
        let mut machine = machine();
        let admin_client = ClientId::from("a");
        let player_client = ClientId::from("p");

        machine
            .handle(&admin_client, ClientAction::Join("admin".to_string()))
            .unwrap();
        machine
            .handle(&player_client, ClientAction::Join("player1".to_string()))
            .unwrap();

        assert!(machine.handle(&player_client, ClientAction::Shuffle).is_err());
        assert!(machine.handle(&admin_client, ClientAction::Shuffle).is_ok());

        let transition = machine
            .handle(
                &player_client,
                ClientAction::RevealSquare {
                    square: "square1".to_string(),
                },
            )
            .unwrap();
        assert_eq!(broadcast_of(&transition).emp_index, 1);

        let transition = machine
            .handle(&player_client, ClientAction::Disconnect)
            .unwrap();
        assert!(transition.is_silent());
        assert_eq!(machine.roles().role_of(&player_client), Role::None);

        // Gone clients lose their privileges
        assert!(machine
            .handle(
                &player_client,
                ClientAction::RevealSquare {
                    square: "square2".to_string()
                }
            )
            .is_err());
    }

    #[test]
    fn test_six_square_layout() {
        let mut machine = GameStateMachine::seeded(GameConfig::six_square(), 5).unwrap();
        let transition = machine.shuffle(&admin()).unwrap();
        let snapshot = broadcast_of(&transition);

        assert_eq!(snapshot.numbered_squares.len(), 6);
        assert_eq!(
            snapshot.numbered_squares.iter().filter(|v| *v == ".").count(),
            1
        );
        assert!(reveal_all(&mut machine).is_some());
        assert_eq!(machine.snapshot().emp_index, 5);
    }
}
