//! cinderkv server entry point
//!
//! Restores the append-only log (when one is configured) before the
//! listener opens, starts the background expiry sweeper, then accepts
//! connections until ctrl-c.

use anyhow::Context;
use cinderkv::commands::Dispatcher;
use cinderkv::connection::{handle_connection, ConnectionStats};
use cinderkv::persistence::{restore_from_file, Persister};
use cinderkv::storage::{DataStore, ExpirySweeper, SweeperConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// A miniature Redis-compatible in-memory key-value server
#[derive(Parser, Debug)]
#[command(name = "cinderkv")]
#[command(about = "A miniature Redis-compatible in-memory key-value server")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = cinderkv::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = cinderkv::DEFAULT_PORT)]
    port: u16,

    /// Append-only log file; replayed on startup, then appended to
    #[arg(long)]
    aof: Option<PathBuf>,

    /// Seconds between active-expiry sweeps
    #[arg(long, default_value_t = 1)]
    sweep_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("cinderkv v{}", cinderkv::VERSION);

    let store = Arc::new(DataStore::new());

    // Replay must finish before the first client can observe the store
    let persister = match &args.aof {
        Some(path) => {
            if path.exists() {
                let replayed = restore_from_file(path, &store)?;
                info!(replayed, keys = store.len(), "restored from append-only log");
            }
            let persister = Persister::open(path)
                .with_context(|| format!("failed to open append-only log {}", path.display()))?;
            Some(Arc::new(persister))
        }
        None => None,
    };

    let _sweeper = ExpirySweeper::start(
        Arc::clone(&store),
        SweeperConfig {
            interval: Duration::from_secs(args.sweep_interval.max(1)),
        },
    );

    let stats = Arc::new(ConnectionStats::new());
    let bind_addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    let shutdown = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        info!("shutdown signal received");
    };

    tokio::select! {
        _ = accept_loop(listener, store, persister, stats) => {}
        _ = shutdown => {}
    }

    info!("server stopped");
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    store: Arc<DataStore>,
    persister: Option<Arc<Persister>>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let dispatcher = match &persister {
                    Some(p) => Dispatcher::with_persister(Arc::clone(&store), Arc::clone(p)),
                    None => Dispatcher::new(Arc::clone(&store)),
                };
                tokio::spawn(handle_connection(stream, addr, dispatcher, Arc::clone(&stats)));
            }
            Err(err) => {
                error!(error = %err, "failed to accept connection");
            }
        }
    }
}
