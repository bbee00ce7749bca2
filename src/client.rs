//! Client struct definition
//!
//! Represents one live transport session with its lifecycle state
//! and outbound communication channel.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, UserId};

/// Lifecycle of a single connection
///
/// `Unidentified` → `Identified` on join, any state → `Closed` on
/// disconnect or logout. `Closed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport connected, no user bound yet
    Unidentified,
    /// Bound to a user by a join event
    Identified(UserId),
    /// Logged out or disconnected
    Closed,
}

/// Connected client information
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Server → Client message channel (None once closed)
    sender: Option<mpsc::Sender<ServerMessage>>,
    state: ConnectionState,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            sender: Some(sender),
            state: ConnectionState::Unidentified,
        }
    }

    /// Queue a message for this client without waiting
    ///
    /// The hub must never stall on a slow socket, so a full buffer
    /// is reported instead of awaited.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        let Some(sender) = &self.sender else {
            return Err(SendError::ChannelClosed);
        };
        sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// User bound by the last join, if still identified
    pub fn user_id(&self) -> Option<&UserId> {
        match &self.state {
            ConnectionState::Identified(user_id) => Some(user_id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Bind this client to a user
    ///
    /// Returns the previously bound user when it differs.
    pub fn identify(&mut self, user_id: UserId) -> Option<UserId> {
        let next = ConnectionState::Identified(user_id.clone());
        match std::mem::replace(&mut self.state, next) {
            ConnectionState::Identified(prev) if prev != user_id => Some(prev),
            _ => None,
        }
    }

    /// Move to `Closed` and drop the outbound sender
    ///
    /// Dropping the sender ends the connection's write task, which
    /// closes the socket.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let client = Client::new(ClientId::new(), tx);

        assert_eq!(client.state, ConnectionState::Unidentified);
        assert!(client.user_id().is_none());
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn test_identify_reports_previous_user() {
        let (tx, _rx) = mpsc::channel(32);
        let mut client = Client::new(ClientId::new(), tx);

        assert_eq!(client.identify(UserId::from("alice")), None);
        assert_eq!(client.identify(UserId::from("alice")), None);
        assert_eq!(client.identify(UserId::from("bob")), Some(UserId::from("alice")));
        assert_eq!(client.user_id(), Some(&UserId::from("bob")));
    }

    #[tokio::test]
    async fn test_close_drops_sender() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut client = Client::new(ClientId::new(), tx);

        client.close();

        assert!(client.is_closed());
        assert!(client.user_id().is_none());
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            client.send(ServerMessage::Connected { client_id: "x".into() }),
            Err(SendError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_full_buffer() {
        let (tx, _rx) = mpsc::channel(1);
        let client = Client::new(ClientId::new(), tx);
        let msg = ServerMessage::Connected { client_id: "x".into() };

        assert!(client.send(msg.clone()).is_ok());
        assert!(matches!(client.send(msg), Err(SendError::ChannelFull)));
    }
}
