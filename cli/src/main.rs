//! txwatch CLI: follow an EVM chain and index transactions of watched addresses.
//!
//! # Commands
//! ```text
//! txwatch serve  [--port <n>] [--addresses <a,b>]    index live and serve the HTTP query API
//! txwatch scan   [--start <n>] [--end <n>]           index one range and print the results
//! txwatch info                                       print the resolved configuration
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use txwatch_core::{ChainReader, IndexQuery, IndexStore, IndexerState};
use txwatch_evm::{HttpChainReader, IndexerBuilder};
use txwatch_storage::MemoryIndexStore;

mod logging;
mod server;
mod settings;

use settings::{ConfigArgs, Settings};

#[derive(Parser)]
#[command(
    name = "txwatch",
    about = "Watched-address transaction indexer for EVM chains",
    long_about = "
txwatch follows an EVM chain over JSON-RPC, fetches blocks with bounded
concurrency and retries, and indexes every transaction that touches a
subscribed address.

ENVIRONMENT VARIABLES (also read from the env file, default .env):
  RPC_ENDPOINT        JSON-RPC URL
  CONCURRENCY         Concurrent block fetches (default 1)
  CHUNK_SIZE          Blocks per checkpoint step (default 50)
  MAX_RETRIES         Fetch attempts per block (default 3)
  BACKOFF_BASE_MS     Backoff unit in ms (default 1000)
  LOOKBACK            Catch-up depth behind the tip (default 10)
  POLL_INTERVAL_MS    Tip polling interval (default 2000)
  REQUEST_TIMEOUT_MS  Per-request timeout (default 30000)
  PORT                HTTP port for serve (default 8080)
  ADDRESSES           Comma-separated addresses to watch
  LOG_LEVEL, LOG_JSON, LOG_COMPONENTS  Logging
",
    version
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Catch up, follow the tip, and serve the HTTP query API
    Serve,

    /// Index a single block range and print transactions per watched address
    Scan,

    /// Print the resolved configuration as JSON
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config).context("invalid configuration")?;
    logging::init_tracing(&settings.log);

    match cli.command {
        Commands::Serve => cmd_serve(settings).await,
        Commands::Scan => cmd_scan(settings).await,
        Commands::Info => cmd_info(&settings),
    }
}

async fn subscribe_all(store: &dyn IndexStore, addresses: &[String]) -> Result<()> {
    for address in addresses {
        if store.subscribe(address).await? {
            tracing::info!(address = %address, "watching");
        }
    }
    Ok(())
}

fn http_reader(settings: &Settings) -> Result<Arc<HttpChainReader>> {
    let reader = HttpChainReader::new(&settings.indexer.rpc_url, settings.indexer.request_timeout())
        .context("failed to create chain reader")?;
    Ok(Arc::new(reader))
}

async fn cmd_serve(settings: Settings) -> Result<()> {
    let store = Arc::new(MemoryIndexStore::new());
    subscribe_all(store.as_ref(), &settings.addresses).await?;

    let reader = http_reader(&settings)?;
    let sync = IndexerBuilder::from_config(settings.indexer.clone()).build(reader, store.clone())?;
    let query = IndexQuery::new(store, sync.processor().checkpoint().clone());

    let cancel = CancellationToken::new();
    let handle = sync.spawn(cancel.clone());
    let app = server::create_router(server::AppState::new(query, handle.state_receiver()));

    let listener = TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("cannot bind port {}", settings.port))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        rpc = %settings.indexer.rpc_url,
        concurrency = settings.indexer.concurrency,
        "listening"
    );

    let state = handle.state_receiver();
    let token = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(state).await;
            token.cancel();
        })
        .await
        .context("HTTP server failed")?;

    handle.shutdown().await.context("sync loop failed")?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or when the sync loop gives up.
async fn shutdown_signal(mut state: watch::Receiver<IndexerState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("shutdown requested"),
        _ = state.wait_for(|s| matches!(s, IndexerState::Error | IndexerState::Stopped)) => {
            tracing::warn!("sync loop ended, shutting down");
        }
    }
}

async fn cmd_scan(settings: Settings) -> Result<()> {
    if settings.addresses.is_empty() {
        tracing::warn!("no addresses configured; nothing will be indexed");
    }

    let store = Arc::new(MemoryIndexStore::new());
    subscribe_all(store.as_ref(), &settings.addresses).await?;

    let reader = http_reader(&settings)?;
    let sync = IndexerBuilder::from_config(settings.indexer.clone()).build(reader.clone(), store.clone())?;

    let end = match settings.end_block {
        Some(end) => end,
        None => reader.latest_block().await.context("failed to read chain tip")?,
    };
    let start = settings
        .start_block
        .unwrap_or_else(|| end.saturating_sub(settings.indexer.lookback));

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let summary = sync
        .processor()
        .process_range(start, end, &cancel)
        .await
        .with_context(|| format!("scan of blocks {start}..={end} failed"))?;
    tracing::info!(
        start = summary.start,
        end = summary.end,
        blocks = summary.blocks_committed,
        failed = ?summary.failed_blocks,
        "scan complete"
    );

    let mut report = BTreeMap::new();
    for address in store.subscribed_addresses().await? {
        let txs = store.transactions(&address).await?;
        report.insert(address, txs);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_info(settings: &Settings) -> Result<()> {
    println!("txwatch v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "txwatch", "serve", "--rpc", "http://localhost:8545", "--concurrency", "4", "--env", "dev.env",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Serve));
        assert_eq!(cli.config.rpc.as_deref(), Some("http://localhost:8545"));
        assert_eq!(cli.config.concurrency, Some(4));
        assert_eq!(cli.config.env_file, Some("dev.env".into()));
    }

    #[tokio::test]
    async fn startup_addresses_are_subscribed_once() {
        let store = MemoryIndexStore::new();
        let addresses = vec!["0xAAA".to_string(), "0xaaa".to_string(), "0xbbb".to_string()];
        subscribe_all(&store, &addresses).await.unwrap();
        let subscribed: Vec<String> = store.subscribed_addresses().await.unwrap().into_iter().collect();
        assert_eq!(subscribed, vec!["0xaaa", "0xbbb"]);
    }
}
