//! Push notification fan-out for subscribed connections.
//!
//! [`RoomNotifier`] pairs the subscription registry with the outbound
//! sender of each live connection. Handlers call it after a committed
//! mutation; it builds a `RoomStateChanged` envelope and pushes it to
//! every subscriber that still has a live sender. Senders whose receiving
//! side is gone are pruned on the spot.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use hearth_proto::{Response, ResponseEnvelope, Room};
use tokio::sync::mpsc::UnboundedSender;

use crate::subscriptions::SubscriptionRegistry;

/// Routes room state changes to subscribed connections.
#[derive(Default)]
pub struct RoomNotifier {
    subscriptions: Mutex<SubscriptionRegistry>,
    senders: Mutex<HashMap<String, UnboundedSender<ResponseEnvelope>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Both maps stay coherent across single operations, so a poisoned
    // lock carries no torn state.
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RoomNotifier {
    /// Create a notifier with no subscriptions or senders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection id to its outbound sender. A later binding for
    /// the same id replaces the earlier one.
    pub fn register_sender(&self, connection_id: &str, sender: UnboundedSender<ResponseEnvelope>) {
        lock(&self.senders).insert(connection_id.to_string(), sender);
    }

    /// Subscribe a connection to a room's state changes.
    pub fn subscribe(&self, connection_id: &str, room_id: &str) {
        lock(&self.subscriptions).subscribe(connection_id, room_id);
    }

    /// Whether a connection currently watches a room.
    pub fn is_subscribed(&self, connection_id: &str, room_id: &str) -> bool {
        lock(&self.subscriptions).is_subscribed(connection_id, room_id)
    }

    /// Push the room's new state to every subscriber with a live sender.
    pub fn room_changed(&self, room: &Room) {
        let subscribers = lock(&self.subscriptions).subscribers(&room.id);
        if subscribers.is_empty() {
            return;
        }

        let mut senders = lock(&self.senders);
        for connection_id in subscribers {
            let Some(sender) = senders.get(&connection_id) else {
                continue;
            };

            let envelope = ResponseEnvelope::new(
                None,
                Response::RoomStateChanged { room: room.clone() },
            );
            if sender.send(envelope).is_err() {
                tracing::debug!(connection_id, "pruning closed push sender");
                senders.remove(&connection_id);
            }
        }
    }

    /// Drop every subscription for a destroyed room.
    pub fn room_removed(&self, room_id: &str) {
        lock(&self.subscriptions).remove_room(room_id);
    }

    /// Drop a connection's subscriptions and sender (disconnect cleanup).
    pub fn connection_closed(&self, connection_id: &str) {
        lock(&self.subscriptions).remove_connection(connection_id);
        lock(&self.senders).remove(connection_id);
    }

    /// Unbind a sender, but only if `sender` is still the bound one. The
    /// transport calls this when a socket closes; a reconnect may already
    /// have bound a fresh sender for the same connection id.
    pub fn unregister_sender(&self, connection_id: &str, sender: &UnboundedSender<ResponseEnvelope>) {
        let mut senders = lock(&self.senders);
        if senders.get(connection_id).is_some_and(|bound| bound.same_channel(sender)) {
            senders.remove(connection_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use hearth_proto::{User, UserListMode};
    use tokio::sync::mpsc;

    use super::*;

    fn room(id: &str) -> Room {
        let host = User {
            connection_id: "host".to_string(),
            user_name: "alice".to_string(),
            ipv4_address: None,
            ipv6_address: None,
        };
        Room::new(id, host, BTreeSet::new(), UserListMode::Ignore, 1, 4)
    }

    #[test]
    fn subscribers_receive_room_changed_push() {
        let notifier = RoomNotifier::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        notifier.register_sender("c1", tx);
        notifier.subscribe("c1", "r1");
        notifier.room_changed(&room("r1"));

        let envelope = rx.try_recv().unwrap();
        assert!(envelope.response_to.is_none());
        assert!(matches!(envelope.body, Response::RoomStateChanged { .. }));
    }

    #[test]
    fn non_subscribers_receive_nothing() {
        let notifier = RoomNotifier::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        notifier.register_sender("c1", tx);
        notifier.subscribe("c1", "other");
        notifier.room_changed(&room("r1"));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_sender_is_pruned() {
        let notifier = RoomNotifier::new();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        notifier.register_sender("c1", tx);
        notifier.subscribe("c1", "r1");
        notifier.room_changed(&room("r1"));

        assert!(lock(&notifier.senders).get("c1").is_none());
    }

    #[test]
    fn connection_closed_drops_subscriptions_and_sender() {
        let notifier = RoomNotifier::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        notifier.register_sender("c1", tx);
        notifier.subscribe("c1", "r1");
        notifier.connection_closed("c1");
        notifier.room_changed(&room("r1"));

        assert!(!notifier.is_subscribed("c1", "r1"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unregister_sender_keeps_newer_binding() {
        let notifier = RoomNotifier::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        notifier.register_sender("c1", old_tx.clone());
        notifier.register_sender("c1", new_tx);
        notifier.unregister_sender("c1", &old_tx);

        notifier.subscribe("c1", "r1");
        notifier.room_changed(&room("r1"));
        assert!(new_rx.try_recv().is_ok());
    }
}
