//! Room storage with transactional read-modify-write access.
//!
//! Handlers never mutate shared room state directly. They open a
//! [`RoomTransaction`], mutate the private copy it carries, and commit;
//! the commit is the single atomic visibility point, so concurrent
//! requests observe either the pre- or post-commit room, never an
//! intermediate one.
//!
//! Concurrency policy: at most one live transaction per room id. A second
//! `begin_transaction` for the same room fails fast with
//! [`RoomStoreError::Conflict`] rather than blocking; handlers retry a
//! bounded number of times. Same-room mutations therefore serialize while
//! different rooms proceed fully in parallel.

mod memory;
mod redb;

use hearth_proto::Room;
pub use memory::MemoryRoomStore;
pub use redb::RedbRoomStore;

/// Errors from room store operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomStoreError {
    /// `create_room` was given an id that already exists. Callers are
    /// expected to generate a fresh id and retry.
    #[error("room id already exists: {0}")]
    DuplicateId(String),

    /// No room with the given id.
    #[error("room not found: {0}")]
    NotFound(String),

    /// Another live transaction holds the room. Transient; retry after
    /// the holder commits or aborts.
    #[error("transaction conflict on room {0}")]
    Conflict(String),

    /// The transaction was already committed or aborted.
    #[error("transaction {0} is finalized")]
    InvalidState(u64),

    /// Backend I/O failed.
    #[error("room storage I/O: {0}")]
    Io(String),

    /// A persisted record could not be encoded or decoded.
    #[error("room record serialization: {0}")]
    Serialization(String),
}

/// Exclusive, single-use handle over one room's state.
///
/// Holds a private copy of the room as of `begin_transaction`. The copy
/// becomes the stored state on commit and is discarded on abort; either
/// way the transaction is finalized and every further access fails with
/// [`RoomStoreError::InvalidState`].
#[derive(Debug)]
pub struct RoomTransaction {
    id: u64,
    room_id: String,
    room: Room,
    finalized: bool,
}

impl RoomTransaction {
    pub(crate) fn new(id: u64, room: Room) -> Self {
        let room_id = room.id.clone();
        Self { id, room_id, room, finalized: false }
    }

    /// Store-assigned transaction id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the room this transaction was opened on. Fixed at
    /// `begin_transaction`; stores key commit, abort, and lock release
    /// on this, not on the (mutable) copy's `id` field.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Whether the transaction has been committed or aborted.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Read access to the private room copy.
    pub fn room(&self) -> Result<&Room, RoomStoreError> {
        if self.finalized {
            return Err(RoomStoreError::InvalidState(self.id));
        }
        Ok(&self.room)
    }

    /// Write access to the private room copy. Changes become visible to
    /// other callers only at commit.
    pub fn room_mut(&mut self) -> Result<&mut Room, RoomStoreError> {
        if self.finalized {
            return Err(RoomStoreError::InvalidState(self.id));
        }
        Ok(&mut self.room)
    }

    /// Mark finalized and hand the room copy to the store.
    pub(crate) fn take_room(&mut self) -> Result<Room, RoomStoreError> {
        if self.finalized {
            return Err(RoomStoreError::InvalidState(self.id));
        }
        self.finalized = true;
        Ok(self.room.clone())
    }

    /// Mark finalized, discarding the room copy.
    pub(crate) fn discard(&mut self) -> Result<(), RoomStoreError> {
        if self.finalized {
            return Err(RoomStoreError::InvalidState(self.id));
        }
        self.finalized = true;
        Ok(())
    }
}

/// Transactional room storage.
///
/// Implementations must be shareable across workers (`Send + Sync`) and
/// must record creation order: [`RoomStore::room_ids`] iterates oldest
/// room first, which fixes the matching algorithm's tie-break.
pub trait RoomStore: Send + Sync {
    /// Store a new room. Fails with [`RoomStoreError::DuplicateId`] if
    /// the id exists.
    fn create_room(&self, room: Room) -> Result<Room, RoomStoreError>;

    /// Current stored state of a room.
    fn get_room(&self, id: &str) -> Result<Option<Room>, RoomStoreError>;

    /// All room ids in creation order, oldest first.
    fn room_ids(&self) -> Result<Vec<String>, RoomStoreError>;

    /// Open a transaction bound to a private copy of the room's current
    /// state. Fails with [`RoomStoreError::NotFound`] if the room does
    /// not exist and [`RoomStoreError::Conflict`] if a live transaction
    /// already holds it.
    fn begin_transaction(&self, id: &str) -> Result<RoomTransaction, RoomStoreError>;

    /// Atomically replace the stored room with the transaction's copy
    /// and finalize the transaction.
    fn commit_transaction(&self, tx: &mut RoomTransaction) -> Result<(), RoomStoreError>;

    /// Discard the transaction's copy and finalize it; the stored room
    /// is unchanged.
    fn abort_transaction(&self, tx: &mut RoomTransaction) -> Result<(), RoomStoreError>;

    /// Remove and return a room. Fails with [`RoomStoreError::Conflict`]
    /// while a live transaction holds it.
    fn delete_room(&self, id: &str) -> Result<Option<Room>, RoomStoreError>;
}
