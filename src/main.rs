//! Mergepool - Main Entry Point
//!
//! Parses the command line, loads the pool configuration file, wires up
//! the per-chain daemon managers and the share store, and runs the pool
//! server until the process is stopped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use mergepool_rpc::{Manager, NodeClient, RpcTransport};
use mergepool_storage::{FoundStore, MemoryStore, ShareStore, SqliteStore};
use mergepool_stratum::{PoolConfig, PoolServer};

/// Command line arguments for the mergepool server
#[derive(Parser)]
#[clap(name = "mergepool")]
#[clap(about = "A merged-mining Stratum pool server for Scrypt-family blockchains")]
struct Cli {
    /// Path to the pool configuration file
    #[clap(short, long, value_name = "FILE", default_value = "mergepool.toml")]
    config: PathBuf,

    /// Data directory for the share database
    #[clap(long, value_name = "DIR", default_value = "data")]
    datadir: PathBuf,

    /// Keep shares in memory instead of SQLite (development only)
    #[clap(long)]
    memory_store: bool,

    /// Verbosity level (0-4)
    #[clap(short, long, default_value = "2")]
    verbosity: u8,
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}

/// Load the pool configuration from a TOML file
fn load_config(path: &PathBuf) -> Result<PoolConfig, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path.clone()))
        .build()?
        .try_deserialize()
}

/// Build one failover manager per configured chain
fn build_managers(pool_config: &PoolConfig) -> Result<HashMap<String, Manager>, String> {
    let mut managers = HashMap::new();
    for name in &pool_config.block_chain_order {
        let node = pool_config
            .node(name)
            .ok_or_else(|| format!("no node configured for {}", name))?;
        let mut clients: Vec<Arc<dyn RpcTransport>> = Vec::new();
        for url in &node.rpc_urls {
            let client = NodeClient::new(
                url.clone(),
                node.rpc_user.clone(),
                node.rpc_password.clone(),
            )
            .map_err(|e| e.to_string())?;
            clients.push(Arc::new(client));
        }
        managers.insert(name.clone(), Manager::new(name.clone(), clients));
    }
    Ok(managers)
}

/// Application entry point
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    info!("Starting mergepool");

    let pool_config = match load_config(&cli.config) {
        Ok(pool_config) => pool_config,
        Err(err) => {
            error!("Failed to load {}: {}", cli.config.display(), err);
            process::exit(1);
        }
    };

    let managers = match build_managers(&pool_config) {
        Ok(managers) => managers,
        Err(err) => {
            error!("Failed to build RPC managers: {}", err);
            process::exit(1);
        }
    };

    let (shares_store, found_store): (Arc<dyn ShareStore>, Arc<dyn FoundStore>) =
        if cli.memory_store {
            info!("Using in-memory share store");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        } else {
            let db_path = cli.datadir.join("mergepool.db");
            info!("Using SQLite share store at {}", db_path.display());
            match SqliteStore::open(db_path) {
                Ok(store) => {
                    let store = Arc::new(store);
                    (store.clone(), store)
                }
                Err(err) => {
                    error!("Failed to open share database: {}", err);
                    process::exit(1);
                }
            }
        };

    let server = match PoolServer::new(pool_config, managers, shares_store, found_store) {
        Ok(server) => Arc::new(server),
        Err(err) => {
            error!("Failed to start pool: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = server.run().await {
        error!("Pool server exited: {}", err);
        process::exit(1);
    }
}
