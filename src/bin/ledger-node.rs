#![forbid(unsafe_code)]
//! Ledger node: opens the store, builds the chain and runs the transaction pool until Ctrl-C.

use clap::Parser;
use ledgercore::blockchain::BlockChain;
use ledgercore::config::load_config;
use ledgercore::mempool::TransactionPool;
use ledgercore::network::ChannelBroadcaster;
use ledgercore::persistence::{SharedDatabase, SqliteDatabase};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the TOML configuration file
    #[arg(long, default_value = "ledger.toml")]
    config: String,
    /// Override the database path from the configuration
    #[arg(long)]
    db: Option<String>,
    /// Relaxed transaction validation
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(path) = cli.db {
        config.database.path = path;
    }
    config.pool.debug |= cli.debug;
    config.validate()?;

    info!("Starting ledger node (database = {})", config.database.path);
    let db: SharedDatabase = Arc::new(SqliteDatabase::open(&config.database.path)?);

    let mut chain = BlockChain::new(db)?;
    let genesis = chain.genesis_block().clone();
    chain.add(genesis)?;
    info!(
        "Chain ready: head {} at number {}, total difficulty {}",
        hex::encode(chain.last_block_hash()),
        chain.last_block_number(),
        chain.total_difficulty()
    );
    let chain = Arc::new(RwLock::new(chain));

    let (speaker, mut outbound) = ChannelBroadcaster::new();
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            debug!(
                "Outbound {:?} message ({} bytes)",
                message.kind,
                message.payload.len()
            );
        }
    });

    let pool = TransactionPool::new(chain, Arc::new(speaker), &config.pool);
    pool.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    pool.stop().await;

    Ok(())
}
