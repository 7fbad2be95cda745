//! Composition root wiring storage, handlers, and the dispatcher.
//!
//! [`ServerContext`] owns the configured providers and the dispatcher
//! with all nine handlers registered in a fixed order. There is no
//! global instance; the transport layer holds the context in an `Arc`
//! and every configuration consumer reads from it. Configuration change
//! notification is an explicit observer list on the instance, not a
//! process-wide broadcast.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::{Arc, Mutex, MutexGuard},
};

use hearth_proto::{Request, Response};
use redb::Database;

use crate::{
    config::{ServerConfig, StorageSelection},
    dispatcher::MessageDispatcher,
    error::ServerError,
    handlers::{
        DestroyRoomHandler, DisconnectHandler, GetConnectionIdHandler, GetRoomDataHandler,
        JoinOrCreateRoomHandler, SendDataToHostHandler, StartGameHandler,
        SubscribeToRoomHandler, UpdateGameStateHandler,
    },
    identity::{ConnectionIdProvider, MemoryIdentityProvider, RedbIdentityProvider},
    notify::RoomNotifier,
    store::{MemoryRoomStore, RedbRoomStore, RoomStore},
};

/// Callback invoked with the new configuration after a change.
pub type ConfigObserver = Box<dyn Fn(&ServerConfig) + Send + Sync>;

/// The assembled server core.
///
/// Storage backends are chosen once at construction; a later
/// [`ServerContext::update_config`] changes the stored value and notifies
/// observers but does not re-open storage.
pub struct ServerContext {
    config: Mutex<ServerConfig>,
    identity: Arc<dyn ConnectionIdProvider>,
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<RoomNotifier>,
    dispatcher: MessageDispatcher,
    observers: Mutex<Vec<ConfigObserver>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Build the configured identity and room providers.
///
/// When both concerns select the same durable path they share one redb
/// database handle; redb admits a single open handle per file.
fn build_providers(
    config: &ServerConfig,
) -> Result<(Arc<dyn ConnectionIdProvider>, Arc<dyn RoomStore>), ServerError> {
    if let (
        StorageSelection::Durable { path: identity_path },
        StorageSelection::Durable { path: room_path },
    ) = (&config.identity_storage, &config.room_storage)
        && identity_path == room_path
    {
        let db = Arc::new(Database::create(identity_path).map_err(|e| {
            ServerError::Config(format!(
                "open database {}: {e}",
                identity_path.display()
            ))
        })?);
        let identity = RedbIdentityProvider::with_database(Arc::clone(&db))?;
        let rooms = RedbRoomStore::with_database(db)?;
        return Ok((Arc::new(identity), Arc::new(rooms)));
    }

    let identity: Arc<dyn ConnectionIdProvider> = match &config.identity_storage {
        StorageSelection::Memory => Arc::new(MemoryIdentityProvider::new()),
        StorageSelection::Durable { path } => Arc::new(RedbIdentityProvider::open(path)?),
    };
    let rooms: Arc<dyn RoomStore> = match &config.room_storage {
        StorageSelection::Memory => Arc::new(MemoryRoomStore::new()),
        StorageSelection::Durable { path } => Arc::new(RedbRoomStore::open(path)?),
    };
    Ok((identity, rooms))
}

impl ServerContext {
    /// Validate the configuration, open storage, and register every
    /// handler.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let (identity, rooms) = build_providers(&config)?;
        let notifier = Arc::new(RoomNotifier::new());

        let mut dispatcher = MessageDispatcher::new(Arc::clone(&identity));
        dispatcher.register(Box::new(GetConnectionIdHandler::new(Arc::clone(&identity))));
        dispatcher.register(Box::new(JoinOrCreateRoomHandler::new(
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));
        dispatcher.register(Box::new(DestroyRoomHandler::new(
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));
        dispatcher.register(Box::new(DisconnectHandler::new(
            Arc::clone(&identity),
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));
        dispatcher.register(Box::new(GetRoomDataHandler::new(Arc::clone(&rooms))));
        dispatcher.register(Box::new(SendDataToHostHandler::new(
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));
        dispatcher.register(Box::new(StartGameHandler::new(
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));
        dispatcher.register(Box::new(SubscribeToRoomHandler::new(
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));
        dispatcher.register(Box::new(UpdateGameStateHandler::new(
            Arc::clone(&rooms),
            Arc::clone(&notifier),
        )));

        Ok(Self {
            config: Mutex::new(config),
            identity,
            rooms,
            notifier,
            dispatcher,
            observers: Mutex::new(Vec::new()),
        })
    }

    /// Run one request through the dispatcher.
    pub fn dispatch(
        &self,
        request: &Request,
        source_ipv4: Option<Ipv4Addr>,
        source_ipv6: Option<Ipv6Addr>,
    ) -> Response {
        self.dispatcher.dispatch(request, source_ipv4, source_ipv6)
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> ServerConfig {
        lock(&self.config).clone()
    }

    /// Register an observer invoked after every configuration change.
    pub fn observe_config(&self, observer: ConfigObserver) {
        lock(&self.observers).push(observer);
    }

    /// Replace the configuration and notify observers.
    ///
    /// Storage backends opened at construction stay as they are; the new
    /// selection applies at the next restart.
    pub fn update_config(&self, config: ServerConfig) -> Result<(), ServerError> {
        config.validate()?;
        *lock(&self.config) = config.clone();

        for observer in lock(&self.observers).iter() {
            observer(&config);
        }
        Ok(())
    }

    /// The push notification fan-out.
    pub fn notifier(&self) -> &Arc<RoomNotifier> {
        &self.notifier
    }

    /// The identity registry.
    pub fn identity(&self) -> &Arc<dyn ConnectionIdProvider> {
        &self.identity
    }

    /// The room store.
    pub fn rooms(&self) -> &Arc<dyn RoomStore> {
        &self.rooms
    }
}
