//! Snapshot delivery.
//!
//! The state machine only decides *what* to send; a [`Broadcaster`] owned
//! by the transport layer does the sending. Delivery is fire-and-forget:
//! failures stay on the transport side.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use super::game::Snapshot;
use super::protocol::ServerMessage;
use super::role::ClientId;

/// Outbound side of the transport.
pub trait Broadcaster: Send + Sync + 'static {
    /// Deliver a snapshot to every connected client.
    fn send_to_all(&self, snapshot: &Snapshot);

    /// Deliver a snapshot to one client.
    fn send_to_one(&self, client: &ClientId, snapshot: &Snapshot);
}

/// Per-client outbound queue.
pub type ClientReceiver = mpsc::UnboundedReceiver<ServerMessage>;

/// Broadcaster backed by one unbounded channel per connected client.
#[derive(Debug, Default)]
pub struct ChannelBroadcaster {
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<ServerMessage>>>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return the receiving end of its queue.
    /// Reconnecting under the same id replaces the old queue.
    pub fn connect(&self, client: ClientId) -> ClientReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().insert(client, tx);
        rx
    }

    pub fn disconnect(&self, client: &ClientId) {
        self.clients.write().remove(client);
    }

    pub fn is_connected(&self, client: &ClientId) -> bool {
        self.clients.read().contains_key(client)
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn send_to_all(&self, snapshot: &Snapshot) {
        let mut closed = Vec::new();
        {
            let clients = self.clients.read();
            for (client, tx) in clients.iter() {
                if tx.send(ServerMessage::GameState(snapshot.clone())).is_err() {
                    closed.push(client.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut clients = self.clients.write();
            for client in &closed {
                debug!(client = %client, "Dropping closed client queue");
                clients.remove(client);
            }
        }
    }

    fn send_to_one(&self, client: &ClientId, snapshot: &Snapshot) {
        let delivered = self
            .clients
            .read()
            .get(client)
            .map(|tx| tx.send(ServerMessage::GameState(snapshot.clone())).is_ok());

        match delivered {
            Some(true) => {}
            Some(false) => {
                debug!(client = %client, "Dropping closed client queue");
                self.clients.write().remove(client);
            }
            None => debug!(client = %client, "No queue for client"),
        }
    }
}
