//! Basic type definitions for the relay server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based connection handle, one per transport session
//! - `UserId`: application-level identity announced by the client

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique connection handle (newtype pattern)
///
/// Wraps a UUID v4. Issued when the WebSocket handshake completes and
/// never reused, so a reconnecting user always gets a fresh handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identity as announced in `join` / `logout` / `send` events
///
/// Opaque to the relay; the user directory owns its meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank identities are never registered
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_unique() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_user_id_blank() {
        assert!(UserId::from("").is_blank());
        assert!(UserId::from("  \t").is_blank());
        assert!(!UserId::from("alice").is_blank());
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::from("alice")).unwrap();
        assert_eq!(json, "\"alice\"");

        let id: UserId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(id.as_str(), "bob");
    }
}
