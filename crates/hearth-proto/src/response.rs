//! Response payloads and the outbound envelope.
//!
//! Handlers produce a [`Response`]; the transport layer wraps it in a
//! [`ResponseEnvelope`] that correlates it back to the originating request.
//! Error responses are ordinary variants carrying a message and an
//! HTTP-style status code, so they cross the protocol boundary as typed
//! data rather than as faults.

use serde::{Deserialize, Serialize};

use crate::{PROTOCOL_VERSION, Room};

/// HTTP-style status codes carried by error responses.
pub mod status {
    /// No handler recognized the request, or it was malformed.
    pub const BAD_REQUEST: u16 = 400;
    /// Bad or missing credentials.
    pub const AUTHORIZATION: u16 = 401;
    /// Authenticated, but lacking host authority for the action.
    pub const NOT_ALLOWED: u16 = 403;
    /// Well-formed but unregistered connection id.
    pub const UNKNOWN_CONNECTION_ID: u16 = 404;
    /// Unexpected fault during handling.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// Which action a `JoinOrCreateRoom` request actually performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinResult {
    /// A new room was created with the requester as host.
    RoomCreated,
    /// The requester was added to an existing room.
    RoomJoined,
    /// The requester was already a member of an admitting room; no state
    /// change occurred.
    Nothing,
}

/// Kind-specific response payload, tagged with `className` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "className")]
pub enum Response {
    /// A freshly issued connection identity.
    #[serde(rename_all = "camelCase")]
    ConnectionIdAssigned {
        /// Server-assigned opaque token.
        connection_id: String,
        /// Server-assigned secret to echo on every subsequent request.
        password: String,
    },

    /// Outcome of a `JoinOrCreateRoom` request.
    #[serde(rename_all = "camelCase")]
    JoinOrCreateRoomCompleted {
        /// Action actually taken.
        result: JoinResult,
        /// The affected room, when one exists.
        room_id: Option<String>,
    },

    /// The room was destroyed.
    #[serde(rename_all = "camelCase")]
    RoomDestroyed {
        /// Id of the destroyed room.
        room_id: String,
    },

    /// The caller's identity was revoked and its memberships cleaned up.
    Disconnected,

    /// A room snapshot.
    #[serde(rename_all = "camelCase")]
    RoomData {
        /// Current state of the room.
        room: Room,
    },

    /// The payload was queued for the host.
    #[serde(rename_all = "camelCase")]
    DataQueuedForHost {
        /// Target room.
        room_id: String,
    },

    /// The game was marked started.
    #[serde(rename_all = "camelCase")]
    GameStarted {
        /// Target room.
        room_id: String,
    },

    /// The caller is now subscribed to room state changes.
    #[serde(rename_all = "camelCase")]
    SubscribedToRoom {
        /// Watched room.
        room_id: String,
    },

    /// The authoritative game state was replaced.
    #[serde(rename_all = "camelCase")]
    GameStateUpdated {
        /// Target room.
        room_id: String,
    },

    /// Push notification: a subscribed room's state changed.
    #[serde(rename_all = "camelCase")]
    RoomStateChanged {
        /// New state of the room.
        room: Room,
    },

    /// 400: no handler recognized the request, or it was malformed.
    #[serde(rename_all = "camelCase")]
    BadRequest {
        /// Human-readable detail, if any.
        message: Option<String>,
        /// Always [`status::BAD_REQUEST`].
        http_status_code: u16,
    },

    /// 401: bad or missing credentials.
    #[serde(rename_all = "camelCase")]
    AuthorizationFailure {
        /// Human-readable detail, if any.
        message: Option<String>,
        /// Always [`status::AUTHORIZATION`].
        http_status_code: u16,
    },

    /// 403: authenticated but lacking host authority.
    #[serde(rename_all = "camelCase")]
    NotAllowed {
        /// Human-readable detail, if any.
        message: Option<String>,
        /// Always [`status::NOT_ALLOWED`].
        http_status_code: u16,
    },

    /// 404: well-formed but unregistered connection id.
    #[serde(rename_all = "camelCase")]
    UnknownConnectionId {
        /// Human-readable detail, if any.
        message: Option<String>,
        /// Always [`status::UNKNOWN_CONNECTION_ID`].
        http_status_code: u16,
    },

    /// 500: unexpected fault during handling.
    #[serde(rename_all = "camelCase")]
    InternalServerError {
        /// Human-readable detail, if any.
        message: Option<String>,
        /// Always [`status::INTERNAL_SERVER_ERROR`].
        http_status_code: u16,
    },
}

impl Response {
    /// Build a 400 response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: Some(message.into()),
            http_status_code: status::BAD_REQUEST,
        }
    }

    /// Build a 401 response.
    pub fn authorization_failure(message: impl Into<String>) -> Self {
        Self::AuthorizationFailure {
            message: Some(message.into()),
            http_status_code: status::AUTHORIZATION,
        }
    }

    /// Build a 403 response.
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::NotAllowed {
            message: Some(message.into()),
            http_status_code: status::NOT_ALLOWED,
        }
    }

    /// Build a 404 response.
    pub fn unknown_connection_id(message: impl Into<String>) -> Self {
        Self::UnknownConnectionId {
            message: Some(message.into()),
            http_status_code: status::UNKNOWN_CONNECTION_ID,
        }
    }

    /// Build a 500 response.
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::InternalServerError {
            message: Some(message.into()),
            http_status_code: status::INTERNAL_SERVER_ERROR,
        }
    }

    /// The HTTP-style status code of an error response, `None` for
    /// success responses.
    pub fn error_status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { http_status_code, .. }
            | Self::AuthorizationFailure { http_status_code, .. }
            | Self::NotAllowed { http_status_code, .. }
            | Self::UnknownConnectionId { http_status_code, .. }
            | Self::InternalServerError { http_status_code, .. } => Some(*http_status_code),
            _ => None,
        }
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        self.error_status().is_some()
    }
}

/// Outbound envelope: shared fields plus the response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// `requestId` of the request this answers, if the client supplied
    /// one. Absent on unsolicited push notifications.
    pub response_to: Option<String>,
    /// Protocol version the server speaks.
    pub protocol_version: String,
    /// Response payload.
    #[serde(flatten)]
    pub body: Response,
}

impl ResponseEnvelope {
    /// Wrap a response, correlating it to `response_to`.
    pub fn new(response_to: Option<String>, body: Response) -> Self {
        Self { response_to, protocol_version: PROTOCOL_VERSION.to_string(), body }
    }
}
