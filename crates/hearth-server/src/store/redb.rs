//! Redb-backed durable room store.
//!
//! Rooms survive server restarts. Commit and abort map onto redb write
//! transactions, so the stored room flips atomically between the pre- and
//! post-commit state with no intermediate visibility, including for other
//! processes sharing the database file. The one-live-transaction-per-room
//! rule is enforced by a per-process lock set, matching the in-memory
//! backend's fail-fast `Conflict` policy.

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use hearth_proto::Room;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::{RoomStore, RoomStoreError, RoomTransaction};

/// Table: rooms
/// Key: room id
/// Value: CBOR-encoded [`StoredRoomRecord`]
const ROOMS: TableDefinition<&str, &[u8]> = TableDefinition::new("rooms");

/// Persisted room plus its creation sequence.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRoomRecord {
    /// Monotonic creation sequence; `room_ids` sorts by this.
    seq: u64,
    room: Room,
}

/// Durable room store backed by redb.
#[derive(Clone)]
pub struct RedbRoomStore {
    db: Arc<Database>,
    /// Room id -> owning transaction id, for every live transaction.
    live: Arc<Mutex<HashMap<String, u64>>>,
    next_tx: Arc<AtomicU64>,
}

impl RedbRoomStore {
    /// Open or create a redb database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RoomStoreError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;
        Self::with_database(Arc::new(db))
    }

    /// Wrap an already-open database, sharing it with other components.
    pub fn with_database(db: Arc<Database>) -> Result<Self, RoomStoreError> {
        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(ROOMS).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self {
            db,
            live: Arc::new(Mutex::new(HashMap::new())),
            next_tx: Arc::new(AtomicU64::new(0)),
        })
    }

    fn lock_live(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn release_lock(&self, room_id: &str, tx_id: u64) {
        let mut live = self.lock_live();
        if live.get(room_id) == Some(&tx_id) {
            live.remove(room_id);
        }
    }

    fn decode(bytes: &[u8]) -> Result<StoredRoomRecord, RoomStoreError> {
        ciborium::from_reader(bytes).map_err(|e| RoomStoreError::Serialization(e.to_string()))
    }

    fn encode(record: &StoredRoomRecord) -> Result<Vec<u8>, RoomStoreError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(record, &mut bytes)
            .map_err(|e| RoomStoreError::Serialization(e.to_string()))?;
        Ok(bytes)
    }
}

impl RoomStore for RedbRoomStore {
    fn create_room(&self, room: Room) -> Result<Room, RoomStoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;

        {
            let mut table = txn.open_table(ROOMS).map_err(io_err)?;

            if table.get(room.id.as_str()).map_err(io_err)?.is_some() {
                return Err(RoomStoreError::DuplicateId(room.id));
            }

            // Next creation sequence = max stored sequence + 1. O(rooms),
            // acceptable for the room counts a single node serves.
            let mut next_seq = 0u64;
            for entry in table.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                let record = Self::decode(value.value())?;
                next_seq = next_seq.max(record.seq + 1);
            }

            let record = StoredRoomRecord { seq: next_seq, room: room.clone() };
            let bytes = Self::encode(&record)?;
            table.insert(room.id.as_str(), bytes.as_slice()).map_err(io_err)?;
        }

        txn.commit().map_err(io_err)?;

        Ok(room)
    }

    fn get_room(&self, id: &str) -> Result<Option<Room>, RoomStoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(ROOMS).map_err(io_err)?;

        match table.get(id).map_err(io_err)? {
            Some(value) => Ok(Some(Self::decode(value.value())?.room)),
            None => Ok(None),
        }
    }

    fn room_ids(&self) -> Result<Vec<String>, RoomStoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(ROOMS).map_err(io_err)?;

        let mut ids: Vec<(u64, String)> = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let record = Self::decode(value.value())?;
            ids.push((record.seq, key.value().to_string()));
        }
        ids.sort_unstable_by_key(|(seq, _)| *seq);

        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    fn begin_transaction(&self, id: &str) -> Result<RoomTransaction, RoomStoreError> {
        // Take the room lock before reading so a concurrent commit cannot
        // slip between the read and the lock.
        let tx_id = {
            let mut live = self.lock_live();
            if live.contains_key(id) {
                return Err(RoomStoreError::Conflict(id.to_string()));
            }
            let tx_id = self.next_tx.fetch_add(1, Ordering::Relaxed);
            live.insert(id.to_string(), tx_id);
            tx_id
        };

        let room = match self.get_room(id) {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.release_lock(id, tx_id);
                return Err(RoomStoreError::NotFound(id.to_string()));
            },
            Err(e) => {
                self.release_lock(id, tx_id);
                return Err(e);
            },
        };

        Ok(RoomTransaction::new(tx_id, room))
    }

    fn commit_transaction(&self, tx: &mut RoomTransaction) -> Result<(), RoomStoreError> {
        let room = tx.take_room()?;
        let room_id = tx.room_id().to_string();

        if self.lock_live().get(&room_id) != Some(&tx.id()) {
            return Err(RoomStoreError::Conflict(room_id));
        }

        let result = (|| {
            let txn = self.db.begin_write().map_err(io_err)?;
            {
                let mut table = txn.open_table(ROOMS).map_err(io_err)?;

                let seq = match table.get(room_id.as_str()).map_err(io_err)? {
                    Some(value) => Self::decode(value.value())?.seq,
                    None => return Err(RoomStoreError::NotFound(room_id.clone())),
                };

                let record = StoredRoomRecord { seq, room: room.clone() };
                let bytes = Self::encode(&record)?;
                table.insert(room_id.as_str(), bytes.as_slice()).map_err(io_err)?;
            }
            txn.commit().map_err(io_err)?;
            Ok(())
        })();

        // The transaction is finalized either way; keeping the lock would
        // wedge the room.
        self.release_lock(&room_id, tx.id());

        result
    }

    fn abort_transaction(&self, tx: &mut RoomTransaction) -> Result<(), RoomStoreError> {
        let room_id = tx.room_id().to_string();
        tx.discard()?;

        self.release_lock(&room_id, tx.id());

        Ok(())
    }

    fn delete_room(&self, id: &str) -> Result<Option<Room>, RoomStoreError> {
        if self.lock_live().contains_key(id) {
            return Err(RoomStoreError::Conflict(id.to_string()));
        }

        let txn = self.db.begin_write().map_err(io_err)?;

        let removed = {
            let mut table = txn.open_table(ROOMS).map_err(io_err)?;
            match table.remove(id).map_err(io_err)? {
                Some(value) => Some(Self::decode(value.value())?.room),
                None => None,
            }
        };

        txn.commit().map_err(io_err)?;

        Ok(removed)
    }
}

fn io_err(e: impl std::fmt::Display) -> RoomStoreError {
    RoomStoreError::Io(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use hearth_proto::{GameValue, User, UserListMode};
    use tempfile::tempdir;

    use super::*;

    fn user(connection_id: &str) -> User {
        User {
            connection_id: connection_id.to_string(),
            user_name: format!("user-{connection_id}"),
            ipv4_address: None,
            ipv6_address: None,
        }
    }

    fn room(id: &str) -> Room {
        Room::new(id, user("host"), BTreeSet::new(), UserListMode::Ignore, 1, 4)
    }

    fn open_store(dir: &tempfile::TempDir) -> RedbRoomStore {
        RedbRoomStore::open(dir.path().join("rooms.redb")).unwrap()
    }

    #[test]
    fn create_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room(room("r1")).unwrap();
        let stored = store.get_room("r1").unwrap().unwrap();
        assert_eq!(stored.id, "r1");
        assert_eq!(stored.connected_users.len(), 1);
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.create_room(room("r1")).unwrap();
        assert!(matches!(store.create_room(room("r1")), Err(RoomStoreError::DuplicateId(_))));
    }

    #[test]
    fn room_ids_follow_creation_order_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rooms.redb");

        {
            let store = RedbRoomStore::open(&path).unwrap();
            for id in ["zz", "aa", "mm"] {
                store.create_room(room(id)).unwrap();
            }
        }

        let store = RedbRoomStore::open(&path).unwrap();
        assert_eq!(store.room_ids().unwrap(), vec!["zz", "aa", "mm"]);

        // New rooms sort after recovered ones.
        store.create_room(room("bb")).unwrap();
        assert_eq!(store.room_ids().unwrap(), vec!["zz", "aa", "mm", "bb"]);
    }

    #[test]
    fn commit_persists_and_abort_rolls_back() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_room(room("r1")).unwrap();

        let mut tx = store.begin_transaction("r1").unwrap();
        tx.room_mut().unwrap().game_state.put("round", GameValue::Int(7));
        store.commit_transaction(&mut tx).unwrap();

        let stored = store.get_room("r1").unwrap().unwrap();
        assert_eq!(stored.game_state.get::<i64>("round"), Some(7));

        let mut tx = store.begin_transaction("r1").unwrap();
        tx.room_mut().unwrap().game_started = true;
        store.abort_transaction(&mut tx).unwrap();

        let stored = store.get_room("r1").unwrap().unwrap();
        assert!(!stored.game_started);
    }

    #[test]
    fn second_transaction_conflicts() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_room(room("r1")).unwrap();

        let mut first = store.begin_transaction("r1").unwrap();
        assert!(matches!(store.begin_transaction("r1"), Err(RoomStoreError::Conflict(_))));

        store.commit_transaction(&mut first).unwrap();
        assert!(store.begin_transaction("r1").is_ok());
    }

    #[test]
    fn finalized_transaction_rejects_all_access() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_room(room("r1")).unwrap();

        let mut tx = store.begin_transaction("r1").unwrap();
        store.commit_transaction(&mut tx).unwrap();

        assert!(matches!(tx.room(), Err(RoomStoreError::InvalidState(_))));
        assert!(matches!(
            store.abort_transaction(&mut tx),
            Err(RoomStoreError::InvalidState(_))
        ));
    }

    #[test]
    fn commit_after_room_id_mutation_releases_the_lock() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_room(room("r1")).unwrap();

        let mut tx = store.begin_transaction("r1").unwrap();
        tx.room_mut().unwrap().id = "renamed".to_string();
        store.commit_transaction(&mut tx).unwrap();

        // Commit is keyed on the id the transaction was opened on, so
        // the copy's mutated id cannot leak the lock entry.
        assert!(store.get_room("r1").unwrap().is_some());
        assert!(store.begin_transaction("r1").is_ok());
    }

    #[test]
    fn rooms_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rooms.redb");

        {
            let store = RedbRoomStore::open(&path).unwrap();
            store.create_room(room("r1")).unwrap();
        }

        let store = RedbRoomStore::open(&path).unwrap();
        assert!(store.get_room("r1").unwrap().is_some());
    }

    #[test]
    fn delete_room_removes_record() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_room(room("r1")).unwrap();

        let removed = store.delete_room("r1").unwrap().unwrap();
        assert_eq!(removed.id, "r1");
        assert!(store.get_room("r1").unwrap().is_none());
        assert!(store.delete_room("r1").unwrap().is_none());
    }
}
