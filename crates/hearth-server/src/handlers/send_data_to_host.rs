//! Append a member payload to a room's host-bound FIFO.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    handlers::{caller_id, with_room_tx},
    notify::RoomNotifier,
    store::RoomStore,
};

/// Handles `SendDataToHost`: members enqueue payloads that the host later
/// acknowledges through `UpdateGameState`.
pub struct SendDataToHostHandler {
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

impl SendDataToHostHandler {
    /// Build a handler mutating rooms in `rooms`.
    pub fn new(rooms: Arc<dyn RoomStore>, notifier: Arc<RoomNotifier>) -> Self {
        Self { rooms, notifier }
    }
}

impl RequestHandler for SendDataToHostHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::SendDataToHost { .. })
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
        let RequestBody::SendDataToHost { room_id, data_to_host } = &request.body else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };
        let caller = caller_id(request)?;

        let (room, response) = with_room_tx(self.rooms.as_ref(), room_id, |room| {
            if !room.connected_users.contains_key(caller) {
                return Err(HandlerError::NotAllowed(format!(
                    "connection {caller} is not a member of room {}",
                    room.id
                )));
            }
            room.data_to_host.push_back(data_to_host.clone());
            Ok(Response::DataQueuedForHost { room_id: room.id.clone() })
        })?;

        self.notifier.room_changed(&room);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use hearth_proto::{GameData, GameValue};

    use super::*;
    use crate::handlers::testing::{Fixture, request};

    fn payload(turn: i64) -> GameData {
        let mut data = GameData::new();
        data.put("turn", GameValue::Int(turn));
        data
    }

    #[test]
    fn member_payloads_queue_in_fifo_order() {
        let fixture = Fixture::new();
        let host = fixture.connected();
        fixture.hosted_room("r1", &host, 4);

        let handler =
            SendDataToHostHandler::new(fixture.rooms.clone(), fixture.notifier.clone());

        for turn in [1, 2] {
            let req = request(
                &host,
                RequestBody::SendDataToHost {
                    room_id: "r1".to_string(),
                    data_to_host: payload(turn),
                },
            );
            let response = handler.handle(&req, None, None).unwrap();
            assert_eq!(response, Response::DataQueuedForHost { room_id: "r1".to_string() });
        }

        let room = fixture.rooms.get_room("r1").unwrap().unwrap();
        let queued: Vec<Option<i64>> =
            room.data_to_host.iter().map(|d| d.get::<i64>("turn")).collect();
        assert_eq!(queued, vec![Some(1), Some(2)]);
    }

    #[test]
    fn non_member_is_rejected() {
        let fixture = Fixture::new();
        let host = fixture.connected();
        let outsider = fixture.connected();
        fixture.hosted_room("r1", &host, 4);

        let handler =
            SendDataToHostHandler::new(fixture.rooms.clone(), fixture.notifier.clone());
        let req = request(
            &outsider,
            RequestBody::SendDataToHost {
                room_id: "r1".to_string(),
                data_to_host: payload(1),
            },
        );

        let result = handler.handle(&req, None, None);
        assert!(matches!(result, Err(HandlerError::NotAllowed(_))));
        assert!(fixture.rooms.get_room("r1").unwrap().unwrap().data_to_host.is_empty());
    }
}
