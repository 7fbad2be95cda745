//! Room and membership data model.
//!
//! A room is the central session entity: one host with exclusive authority
//! over the authoritative game state, a bounded member set, and a FIFO of
//! payloads from members awaiting host processing. All room mutation on the
//! server funnels through room-store transactions; this module only defines
//! the data and the pure admission predicate.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    net::{Ipv4Addr, Ipv6Addr},
};

use serde::{Deserialize, Serialize};

use crate::GameData;

/// Membership policy applied to candidate user names during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserListMode {
    /// Only user names on the room's whitelist may join.
    Whitelist,
    /// User names on the room's blacklist may not join.
    Blacklist,
    /// The user lists are ignored; anyone may join.
    Ignore,
}

/// One client's membership in a room.
///
/// Equality is by all fields; the member set is keyed by `connection_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Connection identity of the member.
    pub connection_id: String,
    /// Display name, evaluated against the room's user lists.
    pub user_name: String,
    /// Source IPv4 address as observed by the server, if any.
    pub ipv4_address: Option<Ipv4Addr>,
    /// Source IPv6 address as observed by the server, if any.
    pub ipv6_address: Option<Ipv6Addr>,
}

/// A server-managed game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Unique id across the room store.
    pub id: String,
    /// Connection id of the member with host authority.
    pub host_connection_id: String,
    /// User names admitted under [`UserListMode::Whitelist`].
    pub whitelist: BTreeSet<String>,
    /// User names rejected under [`UserListMode::Blacklist`].
    pub blacklist: BTreeSet<String>,
    /// Which list, if any, is consulted during admission.
    pub user_list_mode: UserListMode,
    /// Advisory lower bound on member count, enforced by the host.
    pub min_room_size: u32,
    /// Hard upper bound on member count, enforced by the server.
    pub max_room_size: u32,
    /// Current members keyed by connection id.
    pub connected_users: BTreeMap<String, User>,
    /// Authoritative game state snapshot, host-writable only.
    pub game_state: GameData,
    /// Whether the game has started. Monotonic: never reset to `false`
    /// while the room exists.
    pub game_started: bool,
    /// FIFO of payloads from members awaiting host processing.
    pub data_to_host: VecDeque<GameData>,
}

impl Room {
    /// Create a room with `host` as its sole member.
    pub fn new(
        id: impl Into<String>,
        host: User,
        user_list: BTreeSet<String>,
        user_list_mode: UserListMode,
        min_room_size: u32,
        max_room_size: u32,
    ) -> Self {
        let (whitelist, blacklist) = match user_list_mode {
            UserListMode::Whitelist => (user_list, BTreeSet::new()),
            UserListMode::Blacklist => (BTreeSet::new(), user_list),
            UserListMode::Ignore => (BTreeSet::new(), BTreeSet::new()),
        };

        let mut connected_users = BTreeMap::new();
        let host_connection_id = host.connection_id.clone();
        connected_users.insert(host_connection_id.clone(), host);

        Self {
            id: id.into(),
            host_connection_id,
            whitelist,
            blacklist,
            user_list_mode,
            min_room_size,
            max_room_size,
            connected_users,
            game_state: GameData::new(),
            game_started: false,
            data_to_host: VecDeque::new(),
        }
    }

    /// Whether this room admits `user_name` as a new member.
    ///
    /// A room admits iff the game has not started, the member set is below
    /// `max_room_size`, and the membership policy passes. Already being a
    /// member is not considered here; callers check that separately because
    /// it produces a different outcome (no-op, not rejection).
    pub fn admits(&self, user_name: &str) -> bool {
        if self.game_started {
            return false;
        }
        if self.connected_users.len() >= self.max_room_size as usize {
            return false;
        }
        match self.user_list_mode {
            UserListMode::Whitelist => self.whitelist.contains(user_name),
            UserListMode::Blacklist => !self.blacklist.contains(user_name),
            UserListMode::Ignore => true,
        }
    }

    /// Whether `connection_id` holds host authority for this room.
    pub fn is_host(&self, connection_id: &str) -> bool {
        self.host_connection_id == connection_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(connection_id: &str, name: &str) -> User {
        User {
            connection_id: connection_id.to_string(),
            user_name: name.to_string(),
            ipv4_address: None,
            ipv6_address: None,
        }
    }

    fn open_room(max: u32) -> Room {
        Room::new("r1", user("host", "alice"), BTreeSet::new(), UserListMode::Ignore, 1, max)
    }

    #[test]
    fn new_room_has_host_as_sole_member() {
        let room = open_room(4);
        assert_eq!(room.connected_users.len(), 1);
        assert!(room.is_host("host"));
        assert!(!room.game_started);
    }

    #[test]
    fn admits_until_full() {
        let mut room = open_room(2);
        assert!(room.admits("bob"));

        room.connected_users.insert("c2".to_string(), user("c2", "bob"));
        assert_eq!(room.connected_users.len(), 2);
        assert!(!room.admits("carol"));
    }

    #[test]
    fn started_room_admits_nobody() {
        let mut room = open_room(8);
        room.game_started = true;
        assert!(!room.admits("bob"));
    }

    #[test]
    fn whitelist_mode_requires_listed_name() {
        let list: BTreeSet<String> = ["alice".to_string(), "bob".to_string()].into();
        let room =
            Room::new("r1", user("host", "alice"), list, UserListMode::Whitelist, 1, 8);

        assert!(room.admits("bob"));
        assert!(!room.admits("mallory"));
    }

    #[test]
    fn blacklist_mode_rejects_listed_name() {
        let list: BTreeSet<String> = ["mallory".to_string()].into();
        let room =
            Room::new("r1", user("host", "alice"), list, UserListMode::Blacklist, 1, 8);

        assert!(room.admits("bob"));
        assert!(!room.admits("mallory"));
    }

    #[test]
    fn ignore_mode_discards_user_list() {
        let list: BTreeSet<String> = ["mallory".to_string()].into();
        let room = Room::new("r1", user("host", "alice"), list, UserListMode::Ignore, 1, 8);

        assert!(room.whitelist.is_empty());
        assert!(room.blacklist.is_empty());
        assert!(room.admits("mallory"));
    }
}
