//! Redb-backed durable identity registry.
//!
//! Identities survive server restarts, and because every operation runs in
//! one redb transaction, multiple server processes sharing the database
//! file observe consistent state. Passwords are stored as SHA-256 digests
//! rather than plaintext; `issue` still hands the plaintext back to the
//! caller, and [`super::authorize`] recomputes the digest over candidate
//! passwords via `encode_password`.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use sha2::{Digest, Sha256};

use super::{
    CONNECTION_ID_BYTES, ConnectionIdProvider, Id, IdentityError, PASSWORD_BYTES,
    random_hex_token,
};

/// Table: identities
/// Key: connection id (hex string)
/// Value: CBOR-encoded [`Id`] with the password digest in `password`
const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

/// Durable identity registry backed by redb.
///
/// Thread-safe through redb's internal locking. Clone is cheap (`Arc`).
#[derive(Clone)]
pub struct RedbIdentityProvider {
    db: Arc<Database>,
}

impl RedbIdentityProvider {
    /// Open or create a redb database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(IDENTITIES).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Wrap an already-open database, sharing it with other components.
    pub fn with_database(db: Arc<Database>) -> Result<Self, IdentityError> {
        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(IDENTITIES).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self { db })
    }
}

impl ConnectionIdProvider for RedbIdentityProvider {
    fn issue(&self) -> Result<Id, IdentityError> {
        // Uniqueness check and insert share one write transaction; redb
        // serializes writers, so concurrent issue() calls cannot allocate
        // the same connection id.
        let txn = self.db.begin_write().map_err(io_err)?;

        let issued = {
            let mut table = txn.open_table(IDENTITIES).map_err(io_err)?;

            let connection_id = loop {
                let candidate = random_hex_token(CONNECTION_ID_BYTES)?;
                if table.get(candidate.as_str()).map_err(io_err)?.is_none() {
                    break candidate;
                }
            };

            let password = random_hex_token(PASSWORD_BYTES)?;
            let stored = Id {
                connection_id: connection_id.clone(),
                password: self.encode_password(&password),
            };

            let mut bytes = Vec::new();
            ciborium::into_writer(&stored, &mut bytes)
                .map_err(|e| IdentityError::Serialization(e.to_string()))?;
            table.insert(connection_id.as_str(), bytes.as_slice()).map_err(io_err)?;

            Id { connection_id, password }
        };

        txn.commit().map_err(io_err)?;

        Ok(issued)
    }

    fn lookup(&self, connection_id: &str) -> Result<Option<Id>, IdentityError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(IDENTITIES).map_err(io_err)?;

        match table.get(connection_id).map_err(io_err)? {
            Some(value) => {
                let id: Id = ciborium::from_reader(value.value())
                    .map_err(|e| IdentityError::Serialization(e.to_string()))?;
                Ok(Some(id))
            },
            None => Ok(None),
        }
    }

    fn revoke(&self, connection_id: &str) -> Result<Option<Id>, IdentityError> {
        let txn = self.db.begin_write().map_err(io_err)?;

        let removed = {
            let mut table = txn.open_table(IDENTITIES).map_err(io_err)?;
            match table.remove(connection_id).map_err(io_err)? {
                Some(value) => {
                    let id: Id = ciborium::from_reader(value.value())
                        .map_err(|e| IdentityError::Serialization(e.to_string()))?;
                    Some(id)
                },
                None => None,
            }
        };

        txn.commit().map_err(io_err)?;

        Ok(removed)
    }

    fn reset(&self) -> Result<(), IdentityError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        {
            // Dropping and recreating the table is cheaper than removing
            // rows one by one.
            txn.delete_table(IDENTITIES).map_err(|e| IdentityError::Io(e.to_string()))?;
            let _ = txn.open_table(IDENTITIES).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(())
    }

    fn encode_password(&self, plaintext: &str) -> String {
        let digest = Sha256::digest(plaintext.as_bytes());

        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

fn io_err(e: impl std::fmt::Display) -> IdentityError {
    IdentityError::Io(e.to_string())
}
