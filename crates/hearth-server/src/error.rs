//! Top-level server error type.

use crate::{identity::IdentityError, store::RoomStoreError};

/// Errors from server construction and operation.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration rejected before any resource was acquired.
    #[error("config error: {0}")]
    Config(String),

    /// Listener or socket failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Identity registry failed while building the context.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Room store failed while building the context.
    #[error(transparent)]
    Store(#[from] RoomStoreError),
}
