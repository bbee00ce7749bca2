//! RelayHub Actor implementation
//!
//! The central actor that owns all live state: connected clients, the
//! presence registry and per-user delivery topics.
//! Uses the Actor pattern with mpsc channels for message passing, so every
//! registry mutation is serialized through a single task.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::directory::PresenceWriter;
use crate::error::{AppError, SendError};
use crate::message::ServerMessage;
use crate::registry::PresenceRegistry;
use crate::topics::TopicTable;
use crate::types::{ClientId, UserId};

/// Commands sent from handlers to the RelayHub actor
#[derive(Debug)]
pub enum HubCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Transport closed (sent exactly once per connection)
    Disconnect { client_id: ClientId },
    /// Bind the connection to a user and announce it online
    Join { client_id: ClientId, user_id: UserId },
    /// Relay a payload to another user
    Send {
        client_id: ClientId,
        to: UserId,
        message: Value,
    },
    /// Announce a user offline and close the calling connection
    Logout { client_id: ClientId, user_id: UserId },
    /// Client sent a frame that could not be parsed
    Malformed {
        client_id: ClientId,
        error: serde_json::Error,
    },
    /// Query the connection currently registered for a user
    Lookup {
        user_id: UserId,
        reply: oneshot::Sender<Option<ClientId>>,
    },
}

/// The main RelayHub actor
///
/// Manages all state and processes commands from connection handlers.
pub struct RelayHub {
    /// All connected clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Online users and their current connection
    registry: PresenceRegistry,
    /// UserId -> subscribed connections
    topics: TopicTable,
    /// Background persistence of online status
    presence: PresenceWriter,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
}

impl RelayHub {
    /// Create a new RelayHub with the given command receiver
    pub fn new(receiver: mpsc::Receiver<HubCommand>, presence: PresenceWriter) -> Self {
        Self {
            clients: HashMap::new(),
            registry: PresenceRegistry::new(),
            topics: TopicTable::new(),
            presence,
            receiver,
        }
    }

    /// Run the RelayHub event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("RelayHub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("RelayHub shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            HubCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            HubCommand::Join { client_id, user_id } => {
                self.handle_join(client_id, user_id);
            }
            HubCommand::Send {
                client_id,
                to,
                message,
            } => {
                self.handle_send(client_id, to, message);
            }
            HubCommand::Logout { client_id, user_id } => {
                self.handle_logout(client_id, user_id);
            }
            HubCommand::Malformed { client_id, error } => {
                self.reply(client_id, AppError::Json(error).into());
            }
            HubCommand::Lookup { user_id, reply } => {
                let _ = reply.send(self.registry.lookup(&user_id));
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", client_id);
        self.clients.insert(client_id, Client::new(client_id, sender));
        debug!(
            "Total clients: {}, Online users: {}",
            self.clients.len(),
            self.registry.len()
        );
    }

    /// Handle transport close
    ///
    /// Safe to run after a logout: the registry entry is already gone.
    fn handle_disconnect(&mut self, client_id: ClientId) {
        let Some(mut client) = self.clients.remove(&client_id) else {
            return;
        };

        if let Some(user_id) = client.user_id() {
            self.topics.unsubscribe(user_id, client_id);
        }
        client.close();

        match self.registry.unregister_by_handle(client_id) {
            Some(user_id) => {
                info!("User {} went offline (client {} disconnected)", user_id, client_id);
                self.announce(client_id, user_id, false);
            }
            None => debug!("Client {} disconnected without a registered user", client_id),
        }

        if self.registry.is_empty() {
            debug!("No users online");
        }

        debug!(
            "Total clients: {}, Online users: {}",
            self.clients.len(),
            self.registry.len()
        );
    }

    /// Handle join
    fn handle_join(&mut self, client_id: ClientId, user_id: UserId) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };
        if client.is_closed() {
            return;
        }

        if user_id.is_blank() {
            warn!("Client {} tried to join with a blank user id", client_id);
            let _ = client.send(AppError::InvalidUserId(user_id.0).into());
            return;
        }

        if let Some(previous) = client.identify(user_id.clone()) {
            self.topics.unsubscribe(&previous, client_id);
        }

        let displaced = self.registry.register(user_id.clone(), client_id);
        self.topics.subscribe(user_id.clone(), client_id);

        // Same connection rejoined under a new identity
        if let Some(old) = displaced {
            info!("User {} went offline (client {} rejoined as {})", old, client_id, user_id);
            self.announce(client_id, old, false);
        }

        info!("User {} online on client {}", user_id, client_id);
        self.announce(client_id, user_id, true);
    }

    /// Handle message relay
    fn handle_send(&mut self, client_id: ClientId, to: UserId, message: Value) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };
        if client.is_closed() {
            return;
        }
        if client.user_id().is_none() {
            let _ = client.send(AppError::NotIdentified.into());
            return;
        }

        if self.registry.lookup(&to).is_none() {
            debug!("Dropping message from {} to offline user {}", client_id, to);
            return;
        }

        let msg = ServerMessage::MessageReceived { message };
        for subscriber in self.topics.subscribers(&to) {
            if let Some(target) = self.clients.get(&subscriber) {
                deliver(target, msg.clone());
            }
        }
    }

    /// Handle explicit logout
    fn handle_logout(&mut self, client_id: ClientId, user_id: UserId) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };
        if client.is_closed() {
            return;
        }
        let Some(own) = client.user_id().cloned() else {
            let _ = client.send(AppError::NotIdentified.into());
            return;
        };

        // Identity-keyed: removes whichever connection holds `user_id`
        if own != user_id {
            warn!(
                "Client {} joined as {} but logged out {}",
                client_id, own, user_id
            );
        }

        self.topics.unsubscribe(&own, client_id);
        client.close();

        match self.registry.unregister(&user_id) {
            Some(handle) => info!("User {} logged out (registered on client {})", user_id, handle),
            None => info!("User {} logged out while not registered", user_id),
        }
        self.announce(client_id, user_id, false);
    }

    /// Persist a status change and broadcast it to every other connection
    fn announce(&self, origin: ClientId, user_id: UserId, is_online: bool) {
        self.presence.record(user_id.clone(), is_online);

        let msg = ServerMessage::StatusChanged { user_id, is_online };
        for client in self.clients.values() {
            if client.id != origin && !client.is_closed() {
                deliver(client, msg.clone());
            }
        }
    }

    /// Send a message back to the originating client
    fn reply(&self, client_id: ClientId, msg: ServerMessage) {
        if let Some(client) = self.clients.get(&client_id) {
            deliver(client, msg);
        }
    }
}

/// Best-effort delivery to one connection
fn deliver(client: &Client, msg: ServerMessage) {
    match client.send(msg) {
        Ok(()) => {}
        Err(SendError::ChannelFull) => {
            warn!("Client {} outbound buffer full, dropping message", client.id)
        }
        Err(SendError::ChannelClosed) => debug!("Client {} already closing", client.id),
    }
}
