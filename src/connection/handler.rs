//! Client connection handling
//!
//! Each accepted client gets its own task running a read-decode-dispatch
//! -reply loop. TCP is a stream: one read can carry half a frame or
//! several whole ones, so incoming bytes accumulate in a `BytesMut`
//! buffer and the decode loop drains every complete frame before the
//! next read (pipelining). A zero-length read is end of stream.

use crate::commands::Dispatcher;
use crate::protocol::{decode, Frame, FrameError};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Hard cap on the per-connection read buffer (64 KB)
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total connections accepted
    pub accepted: AtomicU64,
    /// Currently active connections
    pub active: AtomicU64,
    /// Total commands processed
    pub commands: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection_opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn command_processed(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }
}

/// State for one client connection.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        dispatcher: Dispatcher,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.serve_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::Disconnected) => {
                debug!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::Io(err))
                if err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(err) => warn!(client = %self.addr, error = %err, "connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn serve_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete frame already buffered before reading
            // again, so pipelined requests all get answered
            while let Some(request) = self.extract_frame()? {
                let reply = self.dispatcher.execute(request);
                self.stats.command_processed();
                self.write_frame(&reply).await?;
            }

            self.read_more().await?;
        }
    }

    /// Pulls one complete frame off the front of the buffer, if present.
    fn extract_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match decode(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed,
                    remaining = self.buffer.len(),
                    "decoded frame"
                );
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(client = %self.addr, error = %err, "unparseable frame");
                Err(ConnectionError::Frame(err))
            }
        }
    }

    async fn read_more(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            // End of stream; bytes left over mean a frame was cut short
            return if self.buffer.is_empty() {
                Err(ConnectionError::Disconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(client = %self.addr, bytes = n, "read data");
        Ok(())
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<(), ConnectionError> {
        let bytes = frame.encode();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Network failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent bytes that can never decode
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Clean end of stream
    #[error("client disconnected")]
    Disconnected,

    /// End of stream in the middle of a frame
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The client outran the read buffer cap
    #[error("read buffer limit exceeded")]
    BufferFull,
}

/// Serves one accepted client to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
) {
    let connection = Connection::new(stream, addr, dispatcher, stats);
    // run() already logged the outcome; nothing more to do here
    let _ = connection.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DataStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn start_test_server() -> (SocketAddr, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(DataStore::new());
        let stats = Arc::new(ConnectionStats::new());

        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let dispatcher = Dispatcher::new(Arc::clone(&store));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, dispatcher, stats));
            }
        });

        (addr, stats)
    }

    #[tokio::test]
    async fn ping_pong() {
        let (addr, _) = start_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");
    }

    #[tokio::test]
    async fn set_then_get_over_the_wire() {
        let (addr, _) = start_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$5\r\nember\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .await
            .unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$5\r\nember\r\n");
    }

    #[tokio::test]
    async fn pipelined_requests_each_get_a_reply() {
        let (addr, _) = start_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // Two SETs and two GETs in a single write
        client
            .write_all(
                b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n\
                  *3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n\
                  *2\r\n$3\r\nGET\r\n$2\r\nk1\r\n\
                  *2\r\n$3\r\nGET\r\n$2\r\nk2\r\n",
            )
            .await
            .unwrap();

        // Expected replies: +OK +OK $2 v1 $2 v2 = 26 bytes
        let expected = b"+OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n";
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[tokio::test]
    async fn split_frame_across_reads() {
        let (addr, _) = start_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*2\r\n$4\r\nECHO\r\n$2").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.write_all(b"\r\nhi\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$2\r\nhi\r\n");
    }

    #[tokio::test]
    async fn stats_track_connections_and_commands() {
        let (addr, stats) = start_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = client.read(&mut buf).await.unwrap();
        assert!(stats.commands.load(Ordering::Relaxed) >= 1);

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.active.load(Ordering::Relaxed), 0);
    }
}
