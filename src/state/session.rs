//! Live game session.
//!
//! Wraps a [`GameStateMachine`] for use from concurrent connection
//! handlers. Each action runs authorize -> mutate -> deliver under one
//! lock, so handlers dispatched in parallel still see whole transitions.
//!
//! The deferred auto-reset runs as a tokio task. At most one such task is
//! outstanding: scheduling a new one aborts the old one, and so does any
//! transition that leaves nothing pending (shuffle, reset). The machine
//! re-validates the ticket when the task fires regardless.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::broadcast::Broadcaster;
use super::config::{ConfigError, GameConfig};
use super::game::Snapshot;
use super::machine::{ActionError, AutoReset, Dispatch, GameStateMachine, Transition};
use super::protocol::{ClientAction, ProtocolError};
use super::role::ClientId;

/// Session errors: building a session, or handling a raw client message.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no tokio runtime available to run the auto-reset timer")]
    NoRuntime,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Shared handle to one running game. Cloning is cheap.
pub struct GameSession<B: Broadcaster> {
    inner: Arc<Inner<B>>,
}

impl<B: Broadcaster> Clone for GameSession<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    machine: Mutex<GameStateMachine>,
    broadcaster: B,

    /// Runtime the auto-reset task is spawned on
    runtime: Handle,

    /// The single outstanding auto-reset task
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

impl<B> Drop for Inner<B> {
    fn drop(&mut self) {
        if let Some(task) = self.reset_task.get_mut().take() {
            task.abort();
        }
    }
}

impl<B: Broadcaster> GameSession<B> {
    /// Build a session on the current tokio runtime.
    pub fn new(config: GameConfig, broadcaster: B) -> Result<Self, SessionError> {
        Self::from_machine(GameStateMachine::new(config)?, broadcaster)
    }

    /// Wrap an existing machine, using the current tokio runtime for timers.
    pub fn from_machine(machine: GameStateMachine, broadcaster: B) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        Ok(Self::with_runtime(machine, broadcaster, runtime))
    }

    /// Wrap an existing machine, spawning timers on `runtime`. Actions may
    /// then be dispatched from any thread, inside a runtime or not.
    pub fn with_runtime(machine: GameStateMachine, broadcaster: B, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                machine: Mutex::new(machine),
                broadcaster,
                runtime,
                reset_task: Mutex::new(None),
            }),
        }
    }

    pub fn broadcaster(&self) -> &B {
        &self.inner.broadcaster
    }

    /// Current full snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.machine.lock().snapshot()
    }

    /// Run a closure against the machine under the session lock.
    pub fn with_machine<R>(&self, f: impl FnOnce(&GameStateMachine) -> R) -> R {
        f(&self.inner.machine.lock())
    }

    /// Whether an auto-reset task is waiting to fire.
    pub fn has_pending_reset(&self) -> bool {
        self.inner
            .reset_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Decode a JSON action from `client` and dispatch it.
    pub fn handle_message(&self, client: &ClientId, text: &str) -> Result<(), SessionError> {
        let action = ClientAction::from_json(text).inspect_err(|e| {
            warn!(client = %client, error = %e, "Undecodable client message");
        })?;
        self.dispatch(client, action)?;
        Ok(())
    }

    /// Apply an action from `client` and deliver the result.
    pub fn dispatch(&self, client: &ClientId, action: ClientAction) -> Result<(), ActionError> {
        let name = action.name();
        let mut machine = self.inner.machine.lock();

        let transition = machine.handle(client, action).inspect_err(|e| {
            debug!(client = %client, action = name, error = %e, "Action rejected");
        })?;
        self.deliver(&transition.dispatch);

        match transition.auto_reset {
            Some(ticket) => self.schedule_reset(ticket),
            None if machine.pending_auto_reset().is_none() => self.cancel_reset(),
            None => {}
        }
        Ok(())
    }

    /// Remove a client's role, as on a transport-level disconnect.
    pub fn disconnect(&self, client: &ClientId) {
        self.inner.machine.lock().disconnect(client);
    }

    fn deliver(&self, dispatch: &Dispatch) {
        deliver(&self.inner.broadcaster, dispatch);
    }

    fn schedule_reset(&self, ticket: AutoReset) {
        let weak = Arc::downgrade(&self.inner);
        let task = self.inner.runtime.spawn(async move {
            tokio::time::sleep(ticket.delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut machine = inner.machine.lock();
            let transition: Transition = machine.fire_auto_reset(ticket);
            deliver(&inner.broadcaster, &transition.dispatch);
        });

        if let Some(previous) = self.inner.reset_task.lock().replace(task) {
            debug!("Superseding previous auto-reset");
            previous.abort();
        }
    }

    fn cancel_reset(&self) {
        if let Some(task) = self.inner.reset_task.lock().take() {
            if !task.is_finished() {
                debug!("Cancelling pending auto-reset");
            }
            task.abort();
        }
    }
}

fn deliver<B: Broadcaster>(broadcaster: &B, dispatch: &Dispatch) {
    match dispatch {
        Dispatch::Broadcast(snapshot) => broadcaster.send_to_all(snapshot),
        Dispatch::Unicast(client, snapshot) => broadcaster.send_to_one(client, snapshot),
        Dispatch::Silent => {}
    }
}
