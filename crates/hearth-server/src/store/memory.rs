//! In-memory room store.
//!
//! Process-local and lost on restart; the reference implementation of the
//! transaction contract for single-node deployments and tests. All state
//! sits behind one mutex; clones share it via `Arc`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use hearth_proto::Room;

use super::{RoomStore, RoomStoreError, RoomTransaction};

struct StoredRoom {
    /// Monotonic creation sequence; `room_ids` sorts by this.
    seq: u64,
    room: Room,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, StoredRoom>,
    /// Room id -> owning transaction id, for every live transaction.
    live: HashMap<String, u64>,
    next_seq: u64,
    next_tx: u64,
}

/// In-memory room store backed by a mutex-guarded map.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rooms.
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Mutations are single map operations, so the state stays
        // coherent even if a holder panicked.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RoomStore for MemoryRoomStore {
    fn create_room(&self, room: Room) -> Result<Room, RoomStoreError> {
        let mut inner = self.lock();

        if inner.rooms.contains_key(&room.id) {
            return Err(RoomStoreError::DuplicateId(room.id));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.rooms.insert(room.id.clone(), StoredRoom { seq, room: room.clone() });

        Ok(room)
    }

    fn get_room(&self, id: &str) -> Result<Option<Room>, RoomStoreError> {
        Ok(self.lock().rooms.get(id).map(|stored| stored.room.clone()))
    }

    fn room_ids(&self) -> Result<Vec<String>, RoomStoreError> {
        let inner = self.lock();

        let mut ids: Vec<(u64, String)> =
            inner.rooms.iter().map(|(id, stored)| (stored.seq, id.clone())).collect();
        ids.sort_unstable_by_key(|(seq, _)| *seq);

        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    fn begin_transaction(&self, id: &str) -> Result<RoomTransaction, RoomStoreError> {
        let mut inner = self.lock();

        let room = inner
            .rooms
            .get(id)
            .map(|stored| stored.room.clone())
            .ok_or_else(|| RoomStoreError::NotFound(id.to_string()))?;

        if inner.live.contains_key(id) {
            return Err(RoomStoreError::Conflict(id.to_string()));
        }

        let tx_id = inner.next_tx;
        inner.next_tx += 1;
        inner.live.insert(id.to_string(), tx_id);

        Ok(RoomTransaction::new(tx_id, room))
    }

    fn commit_transaction(&self, tx: &mut RoomTransaction) -> Result<(), RoomStoreError> {
        let room = tx.take_room()?;
        let room_id = tx.room_id().to_string();
        let mut inner = self.lock();

        // The lock entry must name this transaction; anything else means
        // the handle did not come from this store.
        if inner.live.get(&room_id) != Some(&tx.id()) {
            return Err(RoomStoreError::Conflict(room_id));
        }
        inner.live.remove(&room_id);

        match inner.rooms.get_mut(&room_id) {
            Some(stored) => {
                stored.room = room;
                Ok(())
            },
            None => Err(RoomStoreError::NotFound(room_id)),
        }
    }

    fn abort_transaction(&self, tx: &mut RoomTransaction) -> Result<(), RoomStoreError> {
        let room_id = tx.room_id().to_string();
        tx.discard()?;

        let mut inner = self.lock();
        if inner.live.get(&room_id) == Some(&tx.id()) {
            inner.live.remove(&room_id);
        }

        Ok(())
    }

    fn delete_room(&self, id: &str) -> Result<Option<Room>, RoomStoreError> {
        let mut inner = self.lock();

        if inner.live.contains_key(id) {
            return Err(RoomStoreError::Conflict(id.to_string()));
        }

        Ok(inner.rooms.remove(id).map(|stored| stored.room))
    }
}
