//! Hearth matchmaking server.
//!
//! Coordinates multiplayer game sessions: issues connection identities,
//! matches users into rooms by criteria, and relays room state between
//! hosts and members.
//!
//! # Architecture
//!
//! The core is synchronous and transport-agnostic: a
//! [`MessageDispatcher`] routes schema-tagged requests to one of nine
//! handlers, which mutate room state exclusively through
//! [`store::RoomStore`] transactions. [`ServerContext`] composes the
//! configured storage backends with the dispatcher; [`Server`] wraps the
//! context with a tokio TCP front end speaking newline-delimited JSON.
//!
//! # Components
//!
//! - [`identity`]: connection identity issuance and authorization, with
//!   in-memory and durable (redb) registries
//! - [`store`]: transactional room storage, in-memory and durable
//! - [`dispatcher`] + [`handlers`]: request routing and the per-kind
//!   behavior
//! - [`notify`]: push notification fan-out for room subscribers
//! - [`transport`]: TCP/JSON-lines glue

pub mod config;
pub mod context;
pub mod dispatcher;
mod error;
pub mod handlers;
pub mod identity;
pub mod notify;
pub mod store;
mod subscriptions;
pub mod transport;

pub use config::{ServerConfig, StorageSelection};
pub use context::ServerContext;
pub use dispatcher::{FnHandler, HandlerError, MessageDispatcher, RequestHandler};
pub use error::ServerError;
pub use notify::RoomNotifier;
pub use subscriptions::SubscriptionRegistry;
pub use transport::Server;
