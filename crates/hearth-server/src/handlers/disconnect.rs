//! Revoke the caller's identity and clean up its room state.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    handlers::{caller_id, delete_with_retry, try_begin},
    identity::ConnectionIdProvider,
    notify::RoomNotifier,
    store::RoomStore,
};

/// Handles `Disconnect`: revoke the identity, destroy every room the
/// caller hosts, remove it from every room it merely joined, and drop its
/// subscriptions and push sender.
///
/// Destroying hosted rooms rather than orphaning them follows from host
/// authority being bound to the connection id: a revoked id can never
/// update the game state again, so the room is dead either way.
pub struct DisconnectHandler {
    identity: Arc<dyn ConnectionIdProvider>,
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
}

impl DisconnectHandler {
    /// Build a handler over the identity registry and room store.
    pub fn new(
        identity: Arc<dyn ConnectionIdProvider>,
        rooms: Arc<dyn RoomStore>,
        notifier: Arc<RoomNotifier>,
    ) -> Self {
        Self { identity, rooms, notifier }
    }

    fn leave_all_rooms(&self, caller: &str) -> Result<(), HandlerError> {
        for room_id in self.rooms.room_ids()? {
            let Some(mut tx) = try_begin(self.rooms.as_ref(), &room_id)? else {
                continue;
            };

            if tx.room()?.is_host(caller) {
                self.rooms.abort_transaction(&mut tx)?;
                if let Some(room) = delete_with_retry(self.rooms.as_ref(), &room_id)? {
                    tracing::info!(room_id, "destroyed room of disconnecting host");
                    self.notifier.room_changed(&room);
                    self.notifier.room_removed(&room_id);
                }
            } else if tx.room()?.connected_users.contains_key(caller) {
                tx.room_mut()?.connected_users.remove(caller);
                let room = tx.room()?.clone();
                self.rooms.commit_transaction(&mut tx)?;
                self.notifier.room_changed(&room);
            } else {
                self.rooms.abort_transaction(&mut tx)?;
            }
        }
        Ok(())
    }
}

impl RequestHandler for DisconnectHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::Disconnect)
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
        let caller = caller_id(request)?;

        self.leave_all_rooms(caller)?;
        self.notifier.connection_closed(caller);
        self.identity.revoke(caller)?;
        tracing::info!(connection_id = caller, "connection disconnected");

        Ok(Response::Disconnected)
    }
}
