//! Concurrency safety of the matching path.
//!
//! Many threads join through one shared context; no room may ever exceed
//! its size bound, and every user ends up in exactly one room.

use std::{collections::BTreeSet, collections::HashMap, sync::Arc, thread};

use hearth_proto::{JoinOperation, Request, RequestBody, Response, UserListMode};
use hearth_server::{ServerConfig, ServerContext};

const USERS: usize = 16;
const MAX_ROOM_SIZE: u32 = 4;

fn bootstrap(context: &ServerContext) -> (String, String) {
    let response =
        context.dispatch(&Request::unauthenticated(RequestBody::GetConnectionId), None, None);
    match response {
        Response::ConnectionIdAssigned { connection_id, password } => (connection_id, password),
        other => panic!("unexpected bootstrap response: {other:?}"),
    }
}

#[test]
fn concurrent_joins_never_overfill_a_room() {
    let context = Arc::new(ServerContext::new(ServerConfig::default()).unwrap());

    let credentials: Vec<(String, String)> =
        (0..USERS).map(|_| bootstrap(&context)).collect();

    thread::scope(|scope| {
        for (index, (connection_id, password)) in credentials.iter().enumerate() {
            let context = Arc::clone(&context);
            scope.spawn(move || {
                let response = context.dispatch(
                    &Request::authenticated(
                        connection_id.clone(),
                        password.clone(),
                        RequestBody::JoinOrCreateRoom {
                            operation: JoinOperation::JoinOrCreateRoom,
                            user_name: format!("user-{index}"),
                            user_list: BTreeSet::new(),
                            user_list_mode: UserListMode::Ignore,
                            min_room_size: 1,
                            max_room_size: MAX_ROOM_SIZE,
                        },
                    ),
                    None,
                    None,
                );
                assert!(!response.is_error(), "join failed: {response:?}");
            });
        }
    });

    let rooms = context.rooms();
    let mut memberships: HashMap<String, usize> = HashMap::new();
    let mut total = 0;

    for room_id in rooms.room_ids().unwrap() {
        let room = rooms.get_room(&room_id).unwrap().unwrap();
        assert!(
            room.connected_users.len() <= MAX_ROOM_SIZE as usize,
            "room {room_id} holds {} members",
            room.connected_users.len()
        );
        for connection_id in room.connected_users.keys() {
            *memberships.entry(connection_id.clone()).or_default() += 1;
        }
        total += room.connected_users.len();
    }

    // Every user landed in exactly one room; none lost, none duplicated.
    assert_eq!(total, USERS);
    assert_eq!(memberships.len(), USERS);
    assert!(memberships.values().all(|&count| count == 1));
}
