//! Command processing layer
//!
//! Receives decoded request frames, validates them, executes them against
//! the datastore (and the append-only log for mutations), and returns the
//! reply frame.
//!
//! Supported commands: `ECHO`, `PING`, `SET` (with `EX`/`PX`), `GET`,
//! `EXISTS`, `DEL`, `INCR`, `DECR`, `LPUSH`, `RPUSH`, `LRANGE`.

pub mod handler;

pub use handler::Dispatcher;
