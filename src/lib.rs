//! # cinderkv - a miniature Redis-compatible key-value server
//!
//! cinderkv speaks the RESP wire protocol and keeps everything in memory,
//! with an optional append-only command log for crash recovery.
//!
//! ## Architecture
//!
//! ```text
//! bytes in ──> protocol::decode ──> commands::Dispatcher ──> storage::DataStore
//!                                         │                        ▲
//!                                         ├──> persistence (AOF)   │
//!                                         ▼                 storage::expiry
//! bytes out <── Frame::encode <── reply frame               (background sweep)
//! ```
//!
//! - [`protocol`]: the five-variant frame model, encoder and incremental
//!   decoder
//! - [`storage`]: the single-lock datastore with lazy + active TTL expiry
//! - [`commands`]: request validation and dispatch
//! - [`persistence`]: the append-only log and startup replay
//! - [`connection`]: the per-client read-decode-dispatch-reply loop
//!
//! ## Quick start
//!
//! ```no_run
//! use cinderkv::commands::Dispatcher;
//! use cinderkv::connection::{handle_connection, ConnectionStats};
//! use cinderkv::storage::{start_expiry_sweeper, DataStore};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(DataStore::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&store));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let dispatcher = Dispatcher::new(Arc::clone(&store));
//!         tokio::spawn(handle_connection(stream, addr, dispatcher, Arc::clone(&stats)));
//!     }
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod persistence;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::Dispatcher;
pub use connection::{handle_connection, ConnectionStats};
pub use persistence::{restore_from_file, Persister};
pub use protocol::{decode, Frame, FrameError};
pub use storage::{start_expiry_sweeper, DataStore, ExpirySweeper, StoreError, Value};

/// The default port (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host to bind or connect to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
