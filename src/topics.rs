//! Per-user delivery topics
//!
//! Every connection that joins as a user subscribes to that user's
//! topic. Relayed messages go to all subscribers of the target topic,
//! which is normally a single connection.

use std::collections::{HashMap, HashSet};

use crate::types::{ClientId, UserId};

#[derive(Debug, Default)]
pub struct TopicTable {
    subscribers: HashMap<UserId, HashSet<ClientId>>,
}

impl TopicTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: UserId, client_id: ClientId) {
        self.subscribers.entry(topic).or_default().insert(client_id);
    }

    pub fn unsubscribe(&mut self, topic: &UserId, client_id: ClientId) {
        if let Some(set) = self.subscribers.get_mut(topic) {
            set.remove(&client_id);
            if set.is_empty() {
                self.subscribers.remove(topic);
            }
        }
    }

    pub fn subscribers(&self, topic: &UserId) -> impl Iterator<Item = ClientId> + '_ {
        self.subscribers.get(topic).into_iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_list() {
        let mut topics = TopicTable::new();
        let a = ClientId::new();
        let b = ClientId::new();
        topics.subscribe(UserId::from("alice"), a);
        topics.subscribe(UserId::from("alice"), b);
        topics.subscribe(UserId::from("bob"), b);

        let mut alice: Vec<_> = topics.subscribers(&UserId::from("alice")).collect();
        alice.sort_by_key(|c| c.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|c| c.0);
        assert_eq!(alice, expected);
        assert_eq!(topics.subscribers(&UserId::from("carol")).count(), 0);
    }

    #[test]
    fn test_unsubscribe_single_topic() {
        let mut topics = TopicTable::new();
        let a = ClientId::new();
        topics.subscribe(UserId::from("alice"), a);
        topics.subscribe(UserId::from("bob"), a);

        topics.unsubscribe(&UserId::from("alice"), a);

        assert_eq!(topics.subscribers(&UserId::from("alice")).count(), 0);
        assert_eq!(topics.subscribers(&UserId::from("bob")).count(), 1);
    }
}
