//! In-process identity registry.
//!
//! Process-local and lost on restart, so only suitable for single-node
//! deployments. Passwords are stored as issued; `encode_password` is the
//! identity function.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{
    CONNECTION_ID_BYTES, ConnectionIdProvider, Id, IdentityError, PASSWORD_BYTES,
    random_hex_token,
};

/// In-memory identity registry backed by a mutex-guarded map.
///
/// Clones share the same underlying registry via `Arc`.
#[derive(Clone, Default)]
pub struct MemoryIdentityProvider {
    inner: Arc<Mutex<HashMap<String, Id>>>,
}

impl MemoryIdentityProvider {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently registered identities.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no identities are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Id>> {
        // A poisoned mutex means another worker panicked mid-operation;
        // the map itself is only mutated through single insert/remove
        // calls, so the state is still coherent.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ConnectionIdProvider for MemoryIdentityProvider {
    fn issue(&self) -> Result<Id, IdentityError> {
        // The uniqueness check and the insert happen under one lock
        // acquisition, so concurrent issue() calls serialize here.
        let mut map = self.lock();

        let connection_id = loop {
            let candidate = random_hex_token(CONNECTION_ID_BYTES)?;
            if !map.contains_key(&candidate) {
                break candidate;
            }
        };

        let password = random_hex_token(PASSWORD_BYTES)?;
        let id = Id { connection_id: connection_id.clone(), password };
        map.insert(connection_id, id.clone());

        Ok(id)
    }

    fn lookup(&self, connection_id: &str) -> Result<Option<Id>, IdentityError> {
        Ok(self.lock().get(connection_id).cloned())
    }

    fn revoke(&self, connection_id: &str) -> Result<Option<Id>, IdentityError> {
        Ok(self.lock().remove(connection_id))
    }

    fn reset(&self) -> Result<(), IdentityError> {
        self.lock().clear();
        Ok(())
    }

    fn encode_password(&self, plaintext: &str) -> String {
        plaintext.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn issued_ids_are_pairwise_distinct() {
        let provider = MemoryIdentityProvider::new();

        let mut seen = HashSet::new();
        for _ in 0..256 {
            let id = provider.issue().unwrap();
            assert!(seen.insert(id.connection_id), "connection id issued twice");
        }
        assert_eq!(provider.len(), 256);
    }

    #[test]
    fn lookup_returns_stored_record() {
        let provider = MemoryIdentityProvider::new();
        let id = provider.issue().unwrap();

        let stored = provider.lookup(&id.connection_id).unwrap().unwrap();
        assert_eq!(stored, id);

        assert!(provider.lookup("0000000000000000").unwrap().is_none());
    }

    #[test]
    fn revoke_removes_and_returns() {
        let provider = MemoryIdentityProvider::new();
        let id = provider.issue().unwrap();

        assert_eq!(provider.revoke(&id.connection_id).unwrap(), Some(id.clone()));
        assert_eq!(provider.revoke(&id.connection_id).unwrap(), None);
        assert!(provider.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let provider = MemoryIdentityProvider::new();
        for _ in 0..8 {
            provider.issue().unwrap();
        }

        provider.reset().unwrap();
        assert!(provider.is_empty());
    }

    #[test]
    fn concurrent_issue_never_collides() {
        let provider = MemoryIdentityProvider::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                std::thread::spawn(move || {
                    (0..64).map(|_| provider.issue().unwrap().connection_id).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "connection id issued twice");
            }
        }
        assert_eq!(seen.len(), 8 * 64);
    }
}
