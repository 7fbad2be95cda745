//! Mark a room's game as started. Host-only, monotonic.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    handlers::{caller_id, require_host, with_room_tx},
    notify::RoomNotifier,
    store::RoomStore,
};

/// Handles `StartGame`: set the started flag, closing the room to new
/// members. The flag never resets while the room exists, so repeating the
/// request is a no-op that still succeeds.
pub struct StartGameHandler {
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

impl StartGameHandler {
    /// Build a handler mutating rooms in `rooms`.
    pub fn new(rooms: Arc<dyn RoomStore>, notifier: Arc<RoomNotifier>) -> Self {
        Self { rooms, notifier }
    }
}

impl RequestHandler for StartGameHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::StartGame { .. })
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
        let RequestBody::StartGame { room_id } = &request.body else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };
        let caller = caller_id(request)?;

        let (room, response) = with_room_tx(self.rooms.as_ref(), room_id, |room| {
            require_host(room, caller)?;
            room.game_started = true;
            Ok(Response::GameStarted { room_id: room.id.clone() })
        })?;

        self.notifier.room_changed(&room);
        Ok(response)
    }
}
