//! Transport boundary
//!
//! Accepts a byte stream per client, accumulates it, and turns complete
//! frames into dispatched commands. One async task per connection; the
//! datastore and persister are the only shared state.

pub mod handler;

pub use handler::{handle_connection, Connection, ConnectionError, ConnectionStats};
