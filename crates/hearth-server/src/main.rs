//! Hearth server binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory storage (development)
//! hearth-server --bind 0.0.0.0:7313
//!
//! # Durable storage for identities and rooms
//! hearth-server --bind 0.0.0.0:7313 --database /var/lib/hearth/hearth.redb
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use hearth_server::{Server, ServerConfig, ServerContext, StorageSelection};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Hearth matchmaking server
#[derive(Parser, Debug)]
#[command(name = "hearth-server")]
#[command(about = "Matchmaking and session coordination server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7313")]
    bind: String,

    /// Path to a redb database file; enables durable storage for both
    /// identities and rooms
    #[arg(long)]
    database: Option<PathBuf>,

    /// Keep identities in memory even when --database is set
    #[arg(long)]
    memory_identities: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Hearth server starting");

    let storage = |path: &Option<PathBuf>| match path {
        Some(path) => StorageSelection::Durable { path: path.clone() },
        None => StorageSelection::Memory,
    };

    let config = ServerConfig {
        bind_address: args.bind,
        identity_storage: if args.memory_identities {
            StorageSelection::Memory
        } else {
            storage(&args.database)
        },
        room_storage: storage(&args.database),
    };

    if args.database.is_none() {
        tracing::warn!("No database path provided - state is lost on restart");
    }

    let context = Arc::new(ServerContext::new(config)?);
    let server = Server::bind(context).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
