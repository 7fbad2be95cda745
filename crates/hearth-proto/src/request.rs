//! Request envelope and per-kind payloads.
//!
//! Every request is one object on the wire: shared envelope fields
//! (credentials, request id, protocol version) plus a `className`
//! discriminator that selects the kind-specific fields. The server's
//! dispatcher routes on the discriminator; handlers destructure the body
//! they claimed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{GameData, PROTOCOL_VERSION, UserListMode};

/// Which matching semantics a `JoinOrCreateRoom` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOperation {
    /// Join an existing admitting room; fail if none admits.
    JoinRoom,
    /// Always create a fresh room with the requester as host.
    CreateRoom,
    /// Join if possible, otherwise create.
    JoinOrCreateRoom,
}

/// Kind-specific request payload, tagged with `className` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "className")]
pub enum RequestBody {
    /// Identity bootstrap: issue a fresh `(connectionId, password)` pair.
    /// The only request kind that skips authentication.
    GetConnectionId,

    /// Criteria-based room matching; see [`JoinOperation`].
    #[serde(rename_all = "camelCase")]
    JoinOrCreateRoom {
        /// Requested matching semantics.
        operation: JoinOperation,
        /// Display name of the requester.
        user_name: String,
        /// Allow or deny list, interpreted per `user_list_mode`.
        user_list: BTreeSet<String>,
        /// How `user_list` is applied to candidate members.
        user_list_mode: UserListMode,
        /// Advisory lower size bound for a newly created room.
        min_room_size: u32,
        /// Hard upper size bound for a newly created room.
        max_room_size: u32,
    },

    /// Destroy a room. Host-only.
    #[serde(rename_all = "camelCase")]
    DestroyRoom {
        /// Room to destroy.
        room_id: String,
    },

    /// Revoke the caller's identity and remove it from all rooms.
    Disconnect,

    /// Read a room snapshot.
    #[serde(rename_all = "camelCase")]
    GetRoomData {
        /// Room to read.
        room_id: String,
    },

    /// Append a payload to the room's host-bound FIFO.
    #[serde(rename_all = "camelCase")]
    SendDataToHost {
        /// Target room.
        room_id: String,
        /// Payload for the host.
        data_to_host: GameData,
    },

    /// Mark the game as started. Host-only, monotonic.
    #[serde(rename_all = "camelCase")]
    StartGame {
        /// Target room.
        room_id: String,
    },

    /// Subscribe to push notifications for a room's state changes.
    #[serde(rename_all = "camelCase")]
    SubscribeToRoom {
        /// Room to watch.
        room_id: String,
    },

    /// Replace the authoritative game state snapshot. Host-only.
    #[serde(rename_all = "camelCase")]
    UpdateGameState {
        /// Target room.
        room_id: String,
        /// Full replacement snapshot, not a delta.
        game_data: GameData,
        /// Host-processed entries to drop from the front of the
        /// host-bound FIFO.
        #[serde(default)]
        processed_data: Vec<GameData>,
    },
}

impl RequestBody {
    /// The `className` discriminator for this body.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::GetConnectionId => "GetConnectionId",
            Self::JoinOrCreateRoom { .. } => "JoinOrCreateRoom",
            Self::DestroyRoom { .. } => "DestroyRoom",
            Self::Disconnect => "Disconnect",
            Self::GetRoomData { .. } => "GetRoomData",
            Self::SendDataToHost { .. } => "SendDataToHost",
            Self::StartGame { .. } => "StartGame",
            Self::SubscribeToRoom { .. } => "SubscribeToRoom",
            Self::UpdateGameState { .. } => "UpdateGameState",
        }
    }
}

/// A complete request: envelope fields plus the kind-specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Connection identity echoing the server-issued token. Absent only
    /// on the identity bootstrap request.
    pub connection_id: Option<String>,
    /// Secret paired with `connection_id`.
    pub password: Option<String>,
    /// Client-chosen correlation id, echoed back as `responseTo`.
    pub request_id: Option<String>,
    /// Protocol version the client speaks.
    pub protocol_version: String,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    /// Build an unauthenticated request (identity bootstrap).
    pub fn unauthenticated(body: RequestBody) -> Self {
        Self {
            connection_id: None,
            password: None,
            request_id: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            body,
        }
    }

    /// Build a request carrying credentials.
    pub fn authenticated(
        connection_id: impl Into<String>,
        password: impl Into<String>,
        body: RequestBody,
    ) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            password: Some(password.into()),
            request_id: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_class_name_discriminator() {
        let request = Request::unauthenticated(RequestBody::GetConnectionId);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["className"], "GetConnectionId");
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
    }

    #[test]
    fn kind_specific_fields_are_flattened() {
        let request = Request::authenticated(
            "c1",
            "secret",
            RequestBody::StartGame { room_id: "ab12".to_string() },
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["className"], "StartGame");
        assert_eq!(json["roomId"], "ab12");
        assert_eq!(json["connectionId"], "c1");
    }

    #[test]
    fn round_trip_join_request() {
        let request = Request::authenticated(
            "c1",
            "secret",
            RequestBody::JoinOrCreateRoom {
                operation: JoinOperation::JoinOrCreateRoom,
                user_name: "vatbub".to_string(),
                user_list: BTreeSet::new(),
                user_list_mode: UserListMode::Ignore,
                min_room_size: 2,
                max_room_size: 5,
            },
        );

        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn update_game_state_defaults_processed_data() {
        let json = r#"{
            "className": "UpdateGameState",
            "connectionId": "c1",
            "password": "p",
            "requestId": null,
            "protocolVersion": "1.0",
            "roomId": "ab12",
            "gameData": {}
        }"#;

        let request: Request = serde_json::from_str(json).unwrap();
        match request.body {
            RequestBody::UpdateGameState { processed_data, .. } => {
                assert!(processed_data.is_empty());
            },
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
