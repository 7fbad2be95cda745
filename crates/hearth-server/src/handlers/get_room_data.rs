//! Read-only room snapshot.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    store::RoomStore,
};

/// Handles `GetRoomData`: return the current stored state of a room.
pub struct GetRoomDataHandler {
    rooms: Arc<dyn RoomStore>,
}

impl GetRoomDataHandler {
    /// Build a handler reading from `rooms`.
    pub fn new(rooms: Arc<dyn RoomStore>) -> Self {
        Self { rooms }
    }
}

impl RequestHandler for GetRoomDataHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::GetRoomData { .. })
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
        let RequestBody::GetRoomData { room_id } = &request.body else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };

        match self.rooms.get_room(room_id)? {
            Some(room) => Ok(Response::RoomData { room }),
            None => Err(HandlerError::BadRequest(format!("unknown room id: {room_id}"))),
        }
    }
}
