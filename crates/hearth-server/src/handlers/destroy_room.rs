//! Destroy a room. Host-only.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    handlers::{begin_with_retry, caller_id, delete_with_retry, require_host},
    notify::RoomNotifier,
    store::RoomStore,
};

/// Handles `DestroyRoom`: verify host authority under a transaction, then
/// remove the room and its subscriptions.
///
/// Subscribers get one final `RoomStateChanged` push carrying the last
/// state before their subscriptions drop.
pub struct DestroyRoomHandler {
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

impl DestroyRoomHandler {
    /// Build a handler deleting rooms from `rooms`.
    pub fn new(rooms: Arc<dyn RoomStore>, notifier: Arc<RoomNotifier>) -> Self {
        Self { rooms, notifier }
    }
}

impl RequestHandler for DestroyRoomHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::DestroyRoom { .. })
    }

    fn needs_authentication(&self) -> bool {
        true
    }

    fn handle(
        &self,
        request: &Request,
        _source_ipv4: Option<Ipv4Addr>,
        _source_ipv6: Option<Ipv6Addr>,
    ) -> Result<Response, HandlerError> {
        let RequestBody::DestroyRoom { room_id } = &request.body else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };
        let caller = caller_id(request)?;

        // The host check reads a consistent copy under a transaction,
        // which must finalize before delete_room will proceed. A commit
        // can still land between the abort and the delete, but no
        // operation changes a room's host.
        let mut tx = begin_with_retry(self.rooms.as_ref(), room_id)?;
        let host_check = require_host(tx.room()?, caller);
        self.rooms.abort_transaction(&mut tx)?;
        host_check?;

        let Some(room) = delete_with_retry(self.rooms.as_ref(), room_id)? else {
            return Err(HandlerError::BadRequest(format!("unknown room id: {room_id}")));
        };

        tracing::info!(room_id, "room destroyed by host");
        self.notifier.room_changed(&room);
        self.notifier.room_removed(room_id);

        Ok(Response::RoomDestroyed { room_id: room_id.clone() })
    }
}
