//! Server configuration.
//!
//! Identity and room storage are selected independently, so a deployment
//! can keep identities in memory while persisting rooms, or vice versa.
//! Validation happens before any socket or database resource is touched.

use std::path::PathBuf;

use crate::error::ServerError;

/// Which backend a storage concern uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSelection {
    /// Process-local, lost on restart.
    Memory,
    /// Durable redb database; `path` is the backend's connection
    /// parameter.
    Durable {
        /// Filesystem path of the database file.
        path: PathBuf,
    },
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the TCP listener binds to, e.g. `0.0.0.0:7313`.
    pub bind_address: String,
    /// Backend for the identity registry.
    pub identity_storage: StorageSelection,
    /// Backend for the room store.
    pub room_storage: StorageSelection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7313".to_string(),
            identity_storage: StorageSelection::Memory,
            room_storage: StorageSelection::Memory,
        }
    }
}

impl ServerConfig {
    /// Reject configurations that cannot produce a working server.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.bind_address.is_empty() {
            return Err(ServerError::Config("bind address must not be empty".to_string()));
        }
        for (name, selection) in [
            ("identity", &self.identity_storage),
            ("room", &self.room_storage),
        ] {
            if let StorageSelection::Durable { path } = selection
                && path.as_os_str().is_empty()
            {
                return Err(ServerError::Config(format!(
                    "{name} storage selected durable backend without a database path"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn durable_selection_requires_a_path() {
        let config = ServerConfig {
            room_storage: StorageSelection::Durable { path: PathBuf::new() },
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let config = ServerConfig {
            room_storage: StorageSelection::Durable { path: PathBuf::from("/tmp/rooms.redb") },
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_bind_address_is_rejected() {
        let config = ServerConfig { bind_address: String::new(), ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }
}
