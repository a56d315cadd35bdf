//! RESP wire protocol
//!
//! The same five-variant frame model is used for requests and replies.
//! Requests are always arrays of bulk strings (one per command token);
//! replies use whichever variant fits the command.
//!
//! ## Modules
//!
//! - `types`: the [`Frame`] enum and its encoder
//! - `parser`: the incremental decoder
//!
//! ## Example
//!
//! ```
//! use cinderkv::protocol::{decode, Frame};
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (frame, consumed) = decode(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! let reply = Frame::bulk("value");
//! assert_eq!(reply.encode(), b"$5\r\nvalue\r\n");
//! # let _ = frame;
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used items for convenience
pub use parser::{decode, DecodeResult, FrameError, MAX_BULK_LEN, MAX_FRAME_DEPTH};
pub use types::Frame;
