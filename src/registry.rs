//! Presence registry
//!
//! Maps each online user to the connection that most recently joined
//! as that user. A reverse index from connection to user keeps
//! disconnect handling O(1).

use std::collections::HashMap;

use crate::types::{ClientId, UserId};

/// Who is online right now
///
/// `users` and `handles` are kept as exact inverses of each other:
/// at most one connection per user and at most one user per connection.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// UserId -> ClientId
    users: HashMap<UserId, ClientId>,
    /// ClientId -> UserId
    handles: HashMap<ClientId, UserId>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `user_id`
    ///
    /// A previous connection for the same user is superseded but not
    /// closed. If `handle` was bound to a different user, that user's
    /// entry is removed and returned.
    pub fn register(&mut self, user_id: UserId, handle: ClientId) -> Option<UserId> {
        let displaced = match self.handles.get(&handle) {
            Some(prev) if *prev != user_id => {
                let prev = prev.clone();
                self.users.remove(&prev);
                Some(prev)
            }
            _ => None,
        };

        if let Some(old_handle) = self.users.insert(user_id.clone(), handle) {
            if old_handle != handle {
                self.handles.remove(&old_handle);
            }
        }
        self.handles.insert(handle, user_id);

        displaced
    }

    /// Remove whatever entry is stored for `handle`
    ///
    /// Returns `None` if the handle was never registered or has since
    /// been superseded.
    pub fn unregister_by_handle(&mut self, handle: ClientId) -> Option<UserId> {
        let user_id = self.handles.remove(&handle)?;
        self.users.remove(&user_id);
        Some(user_id)
    }

    /// Remove the entry for `user_id`, whichever connection holds it
    pub fn unregister(&mut self, user_id: &UserId) -> Option<ClientId> {
        let handle = self.users.remove(user_id)?;
        self.handles.remove(&handle);
        Some(handle)
    }

    pub fn lookup(&self, user_id: &UserId) -> Option<ClientId> {
        self.users.get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.users.len(), self.handles.len());
        for (user_id, handle) in &self.users {
            assert_eq!(self.handles.get(handle), Some(user_id));
        }
    }
}
