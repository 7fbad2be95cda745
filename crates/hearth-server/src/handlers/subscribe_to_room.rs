//! Subscribe the caller to a room's push notifications.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    handlers::caller_id,
    notify::RoomNotifier,
    store::RoomStore,
};

/// Handles `SubscribeToRoom`: register the caller for `RoomStateChanged`
/// pushes on one room.
pub struct SubscribeToRoomHandler {
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

impl SubscribeToRoomHandler {
    /// Build a handler recording subscriptions in `notifier`.
    pub fn new(rooms: Arc<dyn RoomStore>, notifier: Arc<RoomNotifier>) -> Self {
        Self { rooms, notifier }
    }
}

impl RequestHandler for SubscribeToRoomHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::SubscribeToRoom { .. })
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
        let RequestBody::SubscribeToRoom { room_id } = &request.body else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };
        let caller = caller_id(request)?;

        if self.rooms.get_room(room_id)?.is_none() {
            return Err(HandlerError::BadRequest(format!("unknown room id: {room_id}")));
        }

        self.notifier.subscribe(caller, room_id);
        Ok(Response::SubscribedToRoom { room_id: room_id.clone() })
    }
}
