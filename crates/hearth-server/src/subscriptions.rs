//! Room subscription tracking.
//!
//! The registry maintains bidirectional mappings: room -> connections (for
//! push notification after a committed mutation) and connection -> rooms
//! (for cleanup on disconnect). This gives O(1) lookups in both
//! directions. Connections subscribe explicitly via `SubscribeToRoom`;
//! removing a connection drops all of its subscriptions.

use std::collections::{HashMap, HashSet};

/// Registry of which connections watch which rooms.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Room id -> set of subscribed connection ids.
    room_watchers: HashMap<String, HashSet<String>>,
    /// Connection id -> set of watched room ids.
    connection_rooms: HashMap<String, HashSet<String>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a room. Idempotent.
    pub fn subscribe(&mut self, connection_id: &str, room_id: &str) {
        self.room_watchers
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        self.connection_rooms
            .entry(connection_id.to_string())
            .or_default()
            .insert(room_id.to_string());
    }

    /// Unsubscribe a connection from a room.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn unsubscribe(&mut self, connection_id: &str, room_id: &str) -> bool {
        let removed = self
            .room_watchers
            .get_mut(room_id)
            .is_some_and(|watchers| watchers.remove(connection_id));

        if let Some(rooms) = self.connection_rooms.get_mut(connection_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.connection_rooms.remove(connection_id);
            }
        }
        if self.room_watchers.get(room_id).is_some_and(HashSet::is_empty) {
            self.room_watchers.remove(room_id);
        }

        removed
    }

    /// Whether a connection watches a room.
    pub fn is_subscribed(&self, connection_id: &str, room_id: &str) -> bool {
        self.room_watchers
            .get(room_id)
            .is_some_and(|watchers| watchers.contains(connection_id))
    }

    /// Connection ids watching a room.
    pub fn subscribers(&self, room_id: &str) -> Vec<String> {
        self.room_watchers
            .get(room_id)
            .map(|watchers| watchers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all of a connection's subscriptions (disconnect cleanup).
    ///
    /// Returns the rooms it was watching.
    pub fn remove_connection(&mut self, connection_id: &str) -> Vec<String> {
        let rooms = self.connection_rooms.remove(connection_id).unwrap_or_default();

        for room_id in &rooms {
            if let Some(watchers) = self.room_watchers.get_mut(room_id) {
                watchers.remove(connection_id);
                if watchers.is_empty() {
                    self.room_watchers.remove(room_id);
                }
            }
        }

        rooms.into_iter().collect()
    }

    /// Drop every subscription for a room (room destruction cleanup).
    pub fn remove_room(&mut self, room_id: &str) {
        let watchers = self.room_watchers.remove(room_id).unwrap_or_default();

        for connection_id in watchers {
            if let Some(rooms) = self.connection_rooms.get_mut(&connection_id) {
                rooms.remove(room_id);
                if rooms.is_empty() {
                    self.connection_rooms.remove(&connection_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_and_lookup() {
        let mut registry = SubscriptionRegistry::new();

        registry.subscribe("c1", "r1");
        registry.subscribe("c2", "r1");

        assert!(registry.is_subscribed("c1", "r1"));
        assert!(registry.is_subscribed("c2", "r1"));

        let mut subscribers = registry.subscribers("r1");
        subscribers.sort();
        assert_eq!(subscribers, vec!["c1", "c2"]);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut registry = SubscriptionRegistry::new();

        registry.subscribe("c1", "r1");
        registry.subscribe("c1", "r1");

        assert_eq!(registry.subscribers("r1").len(), 1);
    }

    #[test]
    fn unsubscribe_removes_from_both_maps() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c1", "r1");

        assert!(registry.unsubscribe("c1", "r1"));
        assert!(!registry.is_subscribed("c1", "r1"));
        assert!(registry.subscribers("r1").is_empty());
        assert!(!registry.unsubscribe("c1", "r1"));
    }

    #[test]
    fn remove_connection_drops_all_subscriptions() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c1", "r1");
        registry.subscribe("c1", "r2");
        registry.subscribe("c2", "r1");

        let mut rooms = registry.remove_connection("c1");
        rooms.sort();
        assert_eq!(rooms, vec!["r1", "r2"]);

        assert_eq!(registry.subscribers("r1"), vec!["c2"]);
        assert!(registry.subscribers("r2").is_empty());
    }

    #[test]
    fn remove_room_drops_all_watchers() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c1", "r1");
        registry.subscribe("c2", "r1");
        registry.subscribe("c1", "r2");

        registry.remove_room("r1");

        assert!(registry.subscribers("r1").is_empty());
        assert!(!registry.is_subscribed("c1", "r1"));
        assert!(registry.is_subscribed("c1", "r2"));
    }
}
