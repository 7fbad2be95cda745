//! Criteria-based room matching: join, create, or both.

use std::{
    collections::BTreeSet,
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{
    JoinOperation, JoinResult, Request, RequestBody, Response, Room, User, UserListMode,
};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    handlers::{caller_id, try_begin},
    identity::random_hex_token,
    notify::RoomNotifier,
    store::{RoomStore, RoomStoreError},
};

/// Room id size in bytes before hex rendering.
const ROOM_ID_BYTES: usize = 4;

/// Attempts at generating a non-colliding room id.
const ROOM_ID_ATTEMPTS: usize = 16;

/// Handles `JoinOrCreateRoom`.
///
/// Matching scans rooms oldest first and takes the first admitting one,
/// so early rooms fill before later ones. Each candidate is examined
/// under its own transaction; the membership insert and the admission
/// check therefore see the same room state, and a concurrent join of the
/// last free slot loses cleanly at commit time. Contended candidates are
/// skipped rather than waited on.
pub struct JoinOrCreateRoomHandler {
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

/// One matching pass's outcome, before it is mapped to a response.
enum MatchOutcome {
    AlreadyMember(String),
    Joined(Room),
    NoMatch,
}

impl JoinOrCreateRoomHandler {
    /// Build a handler matching against `rooms`.
    pub fn new(rooms: Arc<dyn RoomStore>, notifier: Arc<RoomNotifier>) -> Self {
        Self { rooms, notifier }
    }

    /// Scan rooms oldest first for one that already holds or admits the
    /// user.
    fn try_join(&self, user: &User) -> Result<MatchOutcome, HandlerError> {
        for room_id in self.rooms.room_ids()? {
            let Some(mut tx) = try_begin(self.rooms.as_ref(), &room_id)? else {
                continue;
            };

            if tx.room()?.connected_users.contains_key(&user.connection_id) {
                self.rooms.abort_transaction(&mut tx)?;
                return Ok(MatchOutcome::AlreadyMember(room_id));
            }

            if tx.room()?.admits(&user.user_name) {
                tx.room_mut()?
                    .connected_users
                    .insert(user.connection_id.clone(), user.clone());
                let room = tx.room()?.clone();
                self.rooms.commit_transaction(&mut tx)?;
                return Ok(MatchOutcome::Joined(room));
            }

            self.rooms.abort_transaction(&mut tx)?;
        }
        Ok(MatchOutcome::NoMatch)
    }

    /// Create a fresh room hosted by `user`, regenerating the id on
    /// collision.
    fn create(
        &self,
        user: User,
        user_list: BTreeSet<String>,
        user_list_mode: UserListMode,
        min_room_size: u32,
        max_room_size: u32,
    ) -> Result<Room, HandlerError> {
        for _ in 0..ROOM_ID_ATTEMPTS {
            let room_id = random_hex_token(ROOM_ID_BYTES)?;
            let room = Room::new(
                &room_id,
                user.clone(),
                user_list.clone(),
                user_list_mode,
                min_room_size,
                max_room_size,
            );

            match self.rooms.create_room(room) {
                Ok(room) => {
                    tracing::info!(
                        room_id = %room.id,
                        host = %room.host_connection_id,
                        "room created"
                    );
                    return Ok(room);
                },
                Err(RoomStoreError::DuplicateId(_)) => {},
                Err(e) => return Err(e.into()),
            }
        }

        Err(HandlerError::Internal("room id space exhausted".to_string()))
    }
}

impl RequestHandler for JoinOrCreateRoomHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::JoinOrCreateRoom { .. })
    }

    fn needs_authentication(&self) -> bool {
        true
    }

    fn handle(
        &self,
        request: &Request,
        source_ipv4: Option<Ipv4Addr>,
        source_ipv6: Option<Ipv6Addr>,
    ) -> Result<Response, HandlerError> {
        let RequestBody::JoinOrCreateRoom {
            operation,
            user_name,
            user_list,
            user_list_mode,
            min_room_size,
            max_room_size,
        } = &request.body
        else {
            return Err(HandlerError::Internal("claimed a foreign request kind".to_string()));
        };
        let caller = caller_id(request)?;

        if *max_room_size == 0 || min_room_size > max_room_size {
            return Err(HandlerError::BadRequest(format!(
                "invalid room size bounds: min {min_room_size}, max {max_room_size}"
            )));
        }
        if user_name.is_empty() {
            return Err(HandlerError::BadRequest("user name must not be empty".to_string()));
        }

        let user = User {
            connection_id: caller.to_string(),
            user_name: user_name.clone(),
            ipv4_address: source_ipv4,
            ipv6_address: source_ipv6,
        };

        if matches!(operation, JoinOperation::JoinRoom | JoinOperation::JoinOrCreateRoom) {
            match self.try_join(&user)? {
                MatchOutcome::AlreadyMember(room_id) => {
                    return Ok(Response::JoinOrCreateRoomCompleted {
                        result: JoinResult::Nothing,
                        room_id: Some(room_id),
                    });
                },
                MatchOutcome::Joined(room) => {
                    self.notifier.room_changed(&room);
                    return Ok(Response::JoinOrCreateRoomCompleted {
                        result: JoinResult::RoomJoined,
                        room_id: Some(room.id),
                    });
                },
                MatchOutcome::NoMatch => {},
            }

            if matches!(operation, JoinOperation::JoinRoom) {
                return Err(HandlerError::NotAllowed(format!(
                    "no room admits user {user_name}"
                )));
            }
        }

        let room = self.create(
            user,
            user_list.clone(),
            *user_list_mode,
            *min_room_size,
            *max_room_size,
        )?;

        Ok(Response::JoinOrCreateRoomCompleted {
            result: JoinResult::RoomCreated,
            room_id: Some(room.id),
        })
    }
}
