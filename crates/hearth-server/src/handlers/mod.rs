//! The nine request handlers and their shared transaction helpers.
//!
//! Each handler is one type claiming one `className`; the dispatcher owns
//! routing and error translation, so handlers only implement the state
//! change itself. Room mutations go through [`with_room_tx`], which opens
//! a transaction with bounded retry, runs the mutation on the private
//! copy, and commits or aborts depending on the outcome.

mod destroy_room;
mod disconnect;
mod get_connection_id;
mod get_room_data;
mod join_or_create_room;
mod send_data_to_host;
mod start_game;
mod subscribe_to_room;
mod update_game_state;

pub use destroy_room::DestroyRoomHandler;
pub use disconnect::DisconnectHandler;
pub use get_connection_id::GetConnectionIdHandler;
pub use get_room_data::GetRoomDataHandler;
use hearth_proto::{Request, Response, Room};
pub use join_or_create_room::JoinOrCreateRoomHandler;
pub use send_data_to_host::SendDataToHostHandler;
pub use start_game::StartGameHandler;
pub use subscribe_to_room::SubscribeToRoomHandler;
pub use update_game_state::UpdateGameStateHandler;

use crate::{
    dispatcher::HandlerError,
    store::{RoomStore, RoomStoreError, RoomTransaction},
};

/// Attempts before a transaction conflict stops being treated as
/// transient.
const TRANSACTION_RETRIES: usize = 3;

/// Connection id of an authenticated request.
///
/// The dispatcher authorizes before invoking any non-bootstrap handler,
/// so a missing id here is a pipeline bug, not a client error.
pub(crate) fn caller_id(request: &Request) -> Result<&str, HandlerError> {
    request.connection_id.as_deref().ok_or_else(|| {
        HandlerError::Internal("authenticated request without connection id".to_string())
    })
}

/// Open a transaction on `room_id`, retrying bounded on conflict.
///
/// An unknown room id maps to a business-level bad request; a conflict
/// that survives every retry surfaces as the store error and becomes a
/// 500 at the dispatcher.
pub(crate) fn begin_with_retry(
    store: &dyn RoomStore,
    room_id: &str,
) -> Result<RoomTransaction, HandlerError> {
    let mut attempt = 0;
    loop {
        match store.begin_transaction(room_id) {
            Ok(tx) => return Ok(tx),
            Err(RoomStoreError::NotFound(_)) => {
                return Err(HandlerError::BadRequest(format!("unknown room id: {room_id}")));
            },
            Err(RoomStoreError::Conflict(_)) if attempt + 1 < TRANSACTION_RETRIES => {
                attempt += 1;
                std::thread::yield_now();
            },
            Err(e) => return Err(e.into()),
        }
    }
}

/// Like [`begin_with_retry`], but for matching scans: a room that stays
/// contended or vanished mid-scan is skipped rather than an error.
pub(crate) fn try_begin(
    store: &dyn RoomStore,
    room_id: &str,
) -> Result<Option<RoomTransaction>, HandlerError> {
    let mut attempt = 0;
    loop {
        match store.begin_transaction(room_id) {
            Ok(tx) => return Ok(Some(tx)),
            Err(RoomStoreError::NotFound(_)) => return Ok(None),
            Err(RoomStoreError::Conflict(_)) => {
                attempt += 1;
                if attempt >= TRANSACTION_RETRIES {
                    return Ok(None);
                }
                std::thread::yield_now();
            },
            Err(e) => return Err(e.into()),
        }
    }
}

/// Run `mutate` inside a room transaction.
///
/// Commits on success and returns the committed room state (for push
/// notification) alongside the handler's response; aborts on failure,
/// keeping the stored room unchanged.
pub(crate) fn with_room_tx<F>(
    store: &dyn RoomStore,
    room_id: &str,
    mutate: F,
) -> Result<(Room, Response), HandlerError>
where
    F: FnOnce(&mut Room) -> Result<Response, HandlerError>,
{
    let mut tx = begin_with_retry(store, room_id)?;

    match mutate(tx.room_mut()?) {
        Ok(response) => {
            let room = tx.room()?.clone();
            store.commit_transaction(&mut tx)?;
            Ok((room, response))
        },
        Err(e) => {
            // Abort failures are secondary to the original error.
            if let Err(abort_err) = store.abort_transaction(&mut tx) {
                tracing::error!(error = %abort_err, room_id, "transaction abort failed");
            }
            Err(e)
        },
    }
}

/// Delete a room, retrying bounded while live transactions hold it.
pub(crate) fn delete_with_retry(
    store: &dyn RoomStore,
    room_id: &str,
) -> Result<Option<Room>, HandlerError> {
    let mut attempt = 0;
    loop {
        match store.delete_room(room_id) {
            Ok(deleted) => return Ok(deleted),
            Err(RoomStoreError::Conflict(_)) if attempt + 1 < TRANSACTION_RETRIES => {
                attempt += 1;
                std::thread::yield_now();
            },
            Err(e) => return Err(e.into()),
        }
    }
}

/// Reject callers without host authority over `room`.
pub(crate) fn require_host(room: &Room, connection_id: &str) -> Result<(), HandlerError> {
    if room.is_host(connection_id) {
        Ok(())
    } else {
        Err(HandlerError::NotAllowed(format!(
            "connection {connection_id} is not the host of room {}",
            room.id
        )))
    }
}
