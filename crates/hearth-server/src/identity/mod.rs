//! Connection identity issuance and authorization.
//!
//! The registry owns every `(connectionId, password)` pair the server has
//! issued. Two interchangeable backends implement the same contract: an
//! in-process map (lost on restart, single node) and a durable redb table
//! that stores password digests instead of plaintext. Authorization
//! semantics are identical for both because [`authorize`] is a free
//! function over the trait's primitive operations, not a method a backend
//! could override.

mod memory;
mod redb;

pub use memory::MemoryIdentityProvider;
pub use redb::RedbIdentityProvider;
use serde::{Deserialize, Serialize};

/// A server-issued connection identity.
///
/// `password` holds whatever representation the issuing backend stores:
/// plaintext for the in-process registry, a lowercase-hex digest for the
/// durable one. [`ConnectionIdProvider::issue`] always returns the
/// plaintext to the caller regardless of backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Id {
    /// Opaque token unique among currently registered identities.
    pub connection_id: String,
    /// Secret (or its stored representation) paired with the token.
    pub password: String,
}

/// Errors from identity registry operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The OS random number generator failed.
    #[error("rng failure: {0}")]
    Rng(String),

    /// Backend I/O failed.
    #[error("identity storage I/O: {0}")]
    Io(String),

    /// A persisted record could not be encoded or decoded.
    #[error("identity record serialization: {0}")]
    Serialization(String),
}

/// Outcome of authorizing a candidate identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// Credentials match a currently registered pair.
    Authorized,
    /// Credentials are missing or do not match the stored secret.
    NotAuthorized,
    /// The connection id is well-formed but not registered.
    NotFound,
}

/// Registry of issued connection identities.
///
/// Implementations must make every mutating operation atomic with respect
/// to concurrent callers; in particular `issue` treats "check uniqueness"
/// plus "store" as one unit so two concurrent calls can never allocate the
/// same connection id.
pub trait ConnectionIdProvider: Send + Sync {
    /// Issue a fresh identity: random tokens in compact base-16 form,
    /// regenerating the connection id until it collides with nothing.
    /// The pair is persisted before it is returned, with the password in
    /// this backend's stored representation.
    fn issue(&self) -> Result<Id, IdentityError>;

    /// The stored record for `connection_id`, if registered.
    fn lookup(&self, connection_id: &str) -> Result<Option<Id>, IdentityError>;

    /// Remove and return the record for `connection_id`.
    fn revoke(&self, connection_id: &str) -> Result<Option<Id>, IdentityError>;

    /// Clear all registered identities. Operational and test use.
    fn reset(&self) -> Result<(), IdentityError>;

    /// Map a plaintext password to this backend's stored representation.
    ///
    /// The in-process registry stores plaintext, so this is the identity
    /// function there; the durable registry returns a SHA-256 digest.
    /// [`authorize`] uses this primitive to compare candidates against
    /// stored records uniformly.
    fn encode_password(&self, plaintext: &str) -> String;
}

/// Authorize a candidate identity against a registry.
///
/// One implementation for every backend: a missing connection id is
/// `NotAuthorized`, an unregistered one is `NotFound`, and a password
/// whose encoded form differs from the stored record is `NotAuthorized`.
pub fn authorize(
    provider: &dyn ConnectionIdProvider,
    connection_id: Option<&str>,
    password: Option<&str>,
) -> Result<AuthorizationOutcome, IdentityError> {
    let Some(connection_id) = connection_id else {
        return Ok(AuthorizationOutcome::NotAuthorized);
    };

    let Some(stored) = provider.lookup(connection_id)? else {
        return Ok(AuthorizationOutcome::NotFound);
    };

    let authorized = password
        .is_some_and(|candidate| provider.encode_password(candidate) == stored.password);

    if authorized {
        Ok(AuthorizationOutcome::Authorized)
    } else {
        Ok(AuthorizationOutcome::NotAuthorized)
    }
}

/// Render `len` random bytes as lowercase base-16.
pub(crate) fn random_hex_token(len: usize) -> Result<String, IdentityError> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes).map_err(|e| IdentityError::Rng(e.to_string()))?;

    let mut out = String::with_capacity(len * 2);
    for byte in bytes {
        use std::fmt::Write;
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

/// Token sizes in bytes before hex rendering.
const CONNECTION_ID_BYTES: usize = 8;
const PASSWORD_BYTES: usize = 16;
