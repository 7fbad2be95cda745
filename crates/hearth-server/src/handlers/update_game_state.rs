//! Replace the authoritative game state snapshot. Host-only.

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

/// Handles `UpdateGameState`: the host installs a full replacement
/// snapshot and acknowledges host-bound FIFO entries it has processed.
///
/// Acknowledged entries drain from the front of the FIFO in order; an
/// entry that no longer matches the front is skipped, which makes the
/// acknowledgement safe to repeat after a lost response.
pub struct UpdateGameStateHandler {
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

impl UpdateGameStateHandler {
    /// Build a handler mutating rooms in `rooms`.
    pub fn new(rooms: Arc<dyn RoomStore>, notifier: Arc<RoomNotifier>) -> Self {
        Self { rooms, notifier }
    }
}

impl RequestHandler for UpdateGameStateHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::UpdateGameState { .. })
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
        let RequestBody::UpdateGameState { room_id, game_data, processed_data } =
            &request.body
        else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };
        let caller = caller_id(request)?;

        let (room, response) = with_room_tx(self.rooms.as_ref(), room_id, |room| {
            require_host(room, caller)?;

            room.game_state = game_data.clone();
            for processed in processed_data {
                if room.data_to_host.front() == Some(processed) {
                    room.data_to_host.pop_front();
                }
            }

            Ok(Response::GameStateUpdated { room_id: room.id.clone() })
        })?;

        self.notifier.room_changed(&room);
        Ok(response)
    }
}
