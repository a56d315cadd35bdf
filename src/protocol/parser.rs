//! Incremental RESP frame decoder
//!
//! The decoder reads from a byte buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - one complete frame, `consumed` bytes used
//! - `Ok(None)` - the buffer does not yet hold a complete frame
//! - `Err(FrameError)` - the buffer cannot hold a valid frame
//!
//! This contract lets the transport:
//! 1. Append incoming network data to a buffer
//! 2. Call [`decode`] to attempt extraction
//! 3. On success, advance the buffer by `consumed` bytes and loop (pipelining)
//! 4. On `None`, keep every byte and wait for more data
//! 5. On error, drop the connection
//!
//! Incomplete input is never partially consumed: a frame either decodes
//! whole or not at all, so any strict prefix of a valid encoding yields
//! `Ok(None)`. Malformed input (an unknown prefix byte, an unparsable
//! declared length, nesting past [`MAX_FRAME_DEPTH`]) is reported as a
//! [`FrameError`] instead of being mistaken for "need more bytes".

use crate::protocol::types::{prefix, Frame, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors for input that can never become a valid frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Declared length or integer payload is not a valid number
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string or error payload
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Structural violation (missing CRLF after bulk payload, etc.)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Declared bulk length exceeds the allowed maximum
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },

    /// Arrays nested deeper than [`MAX_FRAME_DEPTH`]
    #[error("maximum frame nesting depth exceeded: {0}")]
    DepthExceeded(usize),
}

/// Result type for decode operations.
pub type DecodeResult = Result<Option<(Frame, usize)>, FrameError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevents unbounded recursion)
pub const MAX_FRAME_DEPTH: usize = 32;

/// Attempts to decode one frame from the front of `buf`.
///
/// Returns the frame together with the exact number of bytes it occupied,
/// `Ok(None)` when more data is needed, or an error for input that can
/// never decode. Never blocks and never consumes a partial frame.
pub fn decode(buf: &[u8]) -> DecodeResult {
    decode_at_depth(buf, 0)
}

fn decode_at_depth(buf: &[u8], depth: usize) -> DecodeResult {
    if buf.is_empty() {
        return Ok(None);
    }

    if depth > MAX_FRAME_DEPTH {
        return Err(FrameError::DepthExceeded(MAX_FRAME_DEPTH));
    }

    match buf[0] {
        prefix::SIMPLE_STRING => decode_simple_line(buf, Frame::SimpleString),
        prefix::ERROR => decode_simple_line(buf, Frame::Error),
        prefix::INTEGER => decode_integer(buf),
        prefix::BULK_STRING => decode_bulk_string(buf),
        prefix::ARRAY => decode_array(buf, depth),
        other => Err(FrameError::UnknownPrefix(other)),
    }
}

/// Decodes `+<text>\r\n` and `-<text>\r\n`.
fn decode_simple_line(buf: &[u8], make: fn(String) -> Frame) -> DecodeResult {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let text = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| FrameError::InvalidUtf8(e.to_string()))?;
            // prefix + payload + CRLF
            Ok(Some((make(text.to_string()), 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

/// Decodes `:<integer>\r\n`.
fn decode_integer(buf: &[u8]) -> DecodeResult {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let n = parse_i64(&buf[1..1 + pos])?;
            Ok(Some((Frame::Integer(n), 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

/// Decodes `$<length>\r\n<data>\r\n` and the null form `$-1\r\n`.
fn decode_bulk_string(buf: &[u8]) -> DecodeResult {
    let header_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let declared = parse_i64(&buf[1..1 + header_end])?;

    if declared == -1 {
        // `$-1\r\n`, exactly 5 bytes
        return Ok(Some((Frame::BulkString(None), 1 + header_end + 2)));
    }
    if declared < 0 {
        return Err(FrameError::InvalidBulkLength(declared));
    }

    let len = declared as usize;
    if len > MAX_BULK_LEN {
        return Err(FrameError::BulkTooLarge {
            size: len,
            max: MAX_BULK_LEN,
        });
    }

    let data_start = 1 + header_end + 2;
    let total = data_start + len + 2;
    if buf.len() < total {
        return Ok(None);
    }

    if &buf[data_start + len..total] != CRLF {
        return Err(FrameError::Protocol(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_start + len]);
    Ok(Some((Frame::BulkString(Some(data)), total)))
}

/// Decodes `*<count>\r\n<elements...>`, the null form `*-1\r\n` and the
/// empty form `*0\r\n`.
///
/// Nested elements are decoded back-to-back; if any element is incomplete
/// the whole array is incomplete and nothing is consumed.
fn decode_array(buf: &[u8], depth: usize) -> DecodeResult {
    let header_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let declared = parse_i64(&buf[1..1 + header_end])?;

    if declared == -1 {
        return Ok(Some((Frame::Array(None), 1 + header_end + 2)));
    }
    if declared < 0 {
        return Err(FrameError::InvalidArrayLength(declared));
    }

    let count = declared as usize;
    let mut elements = Vec::with_capacity(count.min(64));
    let mut consumed = 1 + header_end + 2;

    for _ in 0..count {
        match decode_at_depth(&buf[consumed..], depth + 1)? {
            Some((frame, used)) => {
                elements.push(frame);
                consumed += used;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((Frame::Array(Some(elements)), consumed)))
}

fn parse_i64(raw: &[u8]) -> Result<i64, FrameError> {
    let s = std::str::from_utf8(raw).map_err(|e| FrameError::InvalidUtf8(e.to_string()))?;
    s.parse()
        .map_err(|_| FrameError::InvalidInteger(s.to_string()))
}

/// Position of the first `\r\n` in `buf`, or None.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(input: &[u8]) -> (Frame, usize) {
        decode(input).unwrap().unwrap()
    }

    #[test]
    fn simple_string() {
        let (frame, consumed) = decode_one(b"+OK\r\n");
        assert_eq!(frame, Frame::simple("OK"));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn error_frame() {
        let (frame, consumed) = decode_one(b"-ERR unknown command\r\n");
        assert_eq!(frame, Frame::error("ERR unknown command"));
        assert_eq!(consumed, 22);
    }

    #[test]
    fn integer() {
        assert_eq!(decode_one(b":1000\r\n"), (Frame::integer(1000), 7));
        assert_eq!(decode_one(b":-42\r\n"), (Frame::integer(-42), 6));
    }

    #[test]
    fn bulk_string() {
        let (frame, consumed) = decode_one(b"$5\r\nhello\r\n");
        assert_eq!(frame, Frame::bulk("hello"));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn empty_bulk_string() {
        let (frame, consumed) = decode_one(b"$0\r\n\r\n");
        assert_eq!(frame, Frame::bulk(""));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn null_bulk_string_consumes_five_bytes() {
        let (frame, consumed) = decode_one(b"$-1\r\n");
        assert_eq!(frame, Frame::null_bulk());
        assert_eq!(consumed, 5);
    }

    #[test]
    fn binary_safe_bulk_string() {
        let (frame, _) = decode_one(b"$5\r\nhel\x00o\r\n");
        assert_eq!(frame, Frame::bulk(&b"hel\x00o"[..]));
    }

    #[test]
    fn array_of_bulk_strings() {
        let (frame, consumed) = decode_one(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
        assert_eq!(
            frame,
            Frame::array(vec![Frame::bulk("GET"), Frame::bulk("name")])
        );
        assert_eq!(consumed, 23);
    }

    #[test]
    fn null_array() {
        let (frame, consumed) = decode_one(b"*-1\r\n");
        assert_eq!(frame, Frame::null_array());
        assert_eq!(consumed, 5);
    }

    #[test]
    fn empty_array() {
        let (frame, consumed) = decode_one(b"*0\r\n");
        assert_eq!(frame, Frame::array(vec![]));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn nested_array() {
        let (frame, _) = decode_one(b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n");
        assert_eq!(
            frame,
            Frame::array(vec![
                Frame::integer(1),
                Frame::array(vec![Frame::integer(2), Frame::integer(3)]),
            ])
        );
    }

    #[test]
    fn mixed_array() {
        let (frame, _) = decode_one(b"*3\r\n+OK\r\n:100\r\n$5\r\nhello\r\n");
        assert_eq!(
            frame,
            Frame::array(vec![
                Frame::simple("OK"),
                Frame::integer(100),
                Frame::bulk("hello"),
            ])
        );
    }

    #[test]
    fn every_strict_prefix_is_incomplete() {
        let encodings: &[&[u8]] = &[
            b"+OK\r\n",
            b"-ERR boom\r\n",
            b":123\r\n",
            b"$5\r\nhello\r\n",
            b"$-1\r\n",
            b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n",
            b"*-1\r\n",
        ];
        for full in encodings {
            for cut in 0..full.len() {
                assert_eq!(
                    decode(&full[..cut]).unwrap(),
                    None,
                    "prefix of length {} of {:?} should be incomplete",
                    cut,
                    String::from_utf8_lossy(full)
                );
            }
        }
    }

    #[test]
    fn partial_array_consumes_nothing() {
        // Two of three declared elements present
        let result = decode(b"*3\r\n$1\r\na\r\n$1\r\nb\r\n").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn pipelined_frames_decode_in_sequence() {
        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(b"*1\r\n$4\r\nPING\r\n");
        buf.extend_from_slice(b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n");

        let (first, consumed) = decode(&buf).unwrap().unwrap();
        assert_eq!(first, Frame::array(vec![Frame::bulk("PING")]));
        assert_eq!(consumed, 14);

        let (second, rest) = decode(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(
            second,
            Frame::array(vec![Frame::bulk("ECHO"), Frame::bulk("hi")])
        );
        assert_eq!(consumed + rest, buf.len());
    }

    #[test]
    fn round_trip_every_variant() {
        let frames = vec![
            Frame::simple("PONG"),
            Frame::error("WRONGTYPE Operation against a key holding the wrong kind of value"),
            Frame::integer(100),
            Frame::bulk("value"),
            Frame::null_bulk(),
            Frame::array(vec![Frame::bulk("SET"), Frame::bulk("key"), Frame::bulk("value")]),
            Frame::array(vec![]),
            Frame::null_array(),
        ];
        for frame in frames {
            let encoded = frame.encode();
            let (decoded, consumed) = decode(&encoded).unwrap().unwrap();
            assert_eq!(decoded, frame);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        assert!(matches!(
            decode(b"@bogus\r\n"),
            Err(FrameError::UnknownPrefix(b'@'))
        ));
    }

    #[test]
    fn malformed_lengths_are_errors() {
        assert!(matches!(
            decode(b":not_a_number\r\n"),
            Err(FrameError::InvalidInteger(_))
        ));
        assert!(matches!(
            decode(b"$abc\r\n"),
            Err(FrameError::InvalidInteger(_))
        ));
        assert!(matches!(
            decode(b"$-2\r\n"),
            Err(FrameError::InvalidBulkLength(-2))
        ));
        assert!(matches!(
            decode(b"*-7\r\n"),
            Err(FrameError::InvalidArrayLength(-7))
        ));
    }

    #[test]
    fn bulk_payload_missing_terminator_is_an_error() {
        assert!(matches!(
            decode(b"$5\r\nhelloXX"),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut input = Vec::new();
        for _ in 0..(MAX_FRAME_DEPTH + 2) {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");
        assert!(matches!(
            decode(&input),
            Err(FrameError::DepthExceeded(_))
        ));
    }
}
