//! SegKV Server Binary
//!
//! Opens the store, starts the background compactor and serves TCP clients.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use segkv::network::Server;
use segkv::{Config, SegmentManager, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// SegKV Server
#[derive(Parser, Debug)]
#[command(name = "segkv-server")]
#[command(about = "Embedded segmented-log key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./segkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Segment size in bytes before rotation
    #[arg(long, default_value_t = segkv::config::DEFAULT_SEGMENT_SIZE_LIMIT)]
    segment_bytes: u64,

    /// Number of values held in the read cache
    #[arg(long, default_value = "1024")]
    cache_capacity: usize,

    /// Seconds between compaction checks
    #[arg(long, default_value = "60")]
    compaction_interval: u64,

    /// Compact when there are more than this many segments
    #[arg(long, default_value = "2")]
    compaction_trigger: usize,

    /// fsync once per N writes instead of after every write
    #[arg(long)]
    sync_batch: Option<usize>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("SegKV Server v{}", segkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let sync_strategy = match args.sync_batch {
        Some(count) => SyncStrategy::EveryNWrites { count },
        None => SyncStrategy::EveryWrite,
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .segment_size_limit(args.segment_bytes)
        .cache_capacity(args.cache_capacity)
        .compaction_interval(Duration::from_secs(args.compaction_interval))
        .compaction_trigger(args.compaction_trigger)
        .sync_strategy(sync_strategy)
        .build();

    let manager = match SegmentManager::open(config.clone()) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let _compactor = match manager.start_compactor() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to start compactor: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&manager)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
