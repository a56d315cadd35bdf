//! RESP (Redis Serialization Protocol) frame types
//!
//! A [`Frame`] is a single wire-level value. The same enum is used for both
//! incoming requests and outgoing replies.
//!
//! ## Protocol Format
//!
//! Each frame starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! All frames are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`
//! Null Bulk String: `$-1\r\n`
//! Null Array: `*-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used throughout the protocol
pub const CRLF: &[u8] = b"\r\n";

/// Frame type prefix bytes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP frame.
///
/// Null bulk strings and null arrays are carried as `None` payloads so that
/// the two null forms stay distinct and every frame re-encodes to the exact
/// bytes it was decoded from. An empty array (`*0\r\n`) is `Array(Some(vec![]))`
/// and is not the same value as the null array (`*-1\r\n`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Non-binary text with no embedded CRLF. Format: `+<string>\r\n`
    SimpleString(String),

    /// An error reply, conventionally prefixed with a code word such as
    /// `ERR` or `WRONGTYPE`. Format: `-<message>\r\n`
    Error(String),

    /// 64-bit signed integer. Format: `:<integer>\r\n`
    Integer(i64),

    /// Binary-safe string, or the null bulk string when `None`.
    /// Format: `$<length>\r\n<data>\r\n`, null form `$-1\r\n`
    BulkString(Option<Bytes>),

    /// Ordered sequence of frames, or the null array when `None`.
    /// Format: `*<count>\r\n<element1><element2>...`, null form `*-1\r\n`
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// Creates a simple string frame.
    pub fn simple(s: impl Into<String>) -> Self {
        Frame::SimpleString(s.into())
    }

    /// Creates an error frame.
    pub fn error(s: impl Into<String>) -> Self {
        Frame::Error(s.into())
    }

    /// Creates an integer frame.
    pub fn integer(n: i64) -> Self {
        Frame::Integer(n)
    }

    /// Creates a bulk string frame.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::BulkString(Some(data.into()))
    }

    /// Creates the null bulk string.
    pub fn null_bulk() -> Self {
        Frame::BulkString(None)
    }

    /// Creates an array frame.
    pub fn array(frames: Vec<Frame>) -> Self {
        Frame::Array(Some(frames))
    }

    /// Creates the null array.
    pub fn null_array() -> Self {
        Frame::Array(None)
    }

    /// The canonical `+OK\r\n` reply.
    pub fn ok() -> Self {
        Frame::SimpleString("OK".to_string())
    }

    /// The canonical `+PONG\r\n` reply.
    pub fn pong() -> Self {
        Frame::SimpleString("PONG".to_string())
    }

    /// Returns true if this frame is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Encodes the frame into its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encodes the frame into an existing buffer.
    ///
    /// More efficient than [`Frame::encode`] when a buffer is reused.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Frame::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Frame::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Frame::BulkString(Some(data)) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Frame::BulkString(None) => {
                buf.extend_from_slice(b"$-1");
                buf.extend_from_slice(CRLF);
            }
            Frame::Array(Some(frames)) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(frames.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for frame in frames {
                    frame.encode_into(buf);
                }
            }
            Frame::Array(None) => {
                buf.extend_from_slice(b"*-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }
}

/// Human-oriented rendering used by the interactive client.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::SimpleString(s) => write!(f, "{}", s),
            Frame::Error(s) => write!(f, "(error) {}", s),
            Frame::Integer(n) => write!(f, "(integer) {}", n),
            Frame::BulkString(Some(data)) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Frame::BulkString(None) => write!(f, "(nil)"),
            Frame::Array(None) => write!(f, "(nil array)"),
            Frame::Array(Some(frames)) => {
                if frames.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    for (i, frame) in frames.iter().enumerate() {
                        if i > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "{}) {}", i + 1, frame)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
