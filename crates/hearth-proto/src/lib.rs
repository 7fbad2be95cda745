//! Wire-level data model for the Hearth matchmaking protocol.
//!
//! Hearth coordinates multiplayer game sessions: clients obtain a server
//! issued connection identity, create or join rooms matching size and
//! allow/deny-list criteria, and exchange authoritative game state through
//! a single per-room host.
//!
//! This crate defines everything that travels on the wire or is persisted
//! by a storage backend:
//!
//! - [`Request`] / [`Response`]: the schema-tagged message envelope. The
//!   concrete byte encoding is up to the transport layer; every message is
//!   a single object carrying a `className` discriminator.
//! - [`GameData`]: a typed key/value bag for arbitrary game payloads.
//! - [`Room`] and [`User`]: the session data model shared by server and
//!   clients.
//!
//! The crate is deliberately logic-light. Business rules live in
//! `hearth-server`; the one exception is [`Room::admits`], a pure predicate
//! over room fields that both the matching algorithm and its tests need.

mod game_data;
mod request;
mod response;
mod room;

pub use game_data::{FromGameValue, GameData, GameValue};
pub use request::{JoinOperation, Request, RequestBody};
pub use response::{JoinResult, Response, ResponseEnvelope, status};
pub use room::{Room, User, UserListMode};

/// Protocol version stamped on every request and response envelope.
///
/// Clients and servers with mismatched major versions should not talk to
/// each other; the transport layer is free to reject on mismatch.
pub const PROTOCOL_VERSION: &str = "1.0";
