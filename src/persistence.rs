//! Append-only command log
//!
//! Durability works by journaling, not snapshotting: every mutating
//! command is appended to a flat file as the same RESP array a client
//! would send, and startup replays the file through the dispatcher to
//! rebuild the store. The file is opened for unbuffered appends so a
//! record reaches the OS before the client sees its reply.
//!
//! Replay runs with no persister attached, so restored commands are not
//! logged a second time.

use crate::commands::Dispatcher;
use crate::protocol::{decode, Frame};
use crate::storage::DataStore;
use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// The append-only log writer.
pub struct Persister {
    file: Mutex<File>,
}

impl Persister {
    /// Opens (or creates) the log at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Locks the log for one mutation.
    ///
    /// The caller applies its store mutation while the returned guard is
    /// held and then appends the command through it, which pins the log
    /// order to the order mutations became visible in the store.
    pub fn begin(&self) -> AofLock<'_> {
        AofLock {
            file: self.file.lock().unwrap(),
        }
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister").finish_non_exhaustive()
    }
}

/// Exclusive access to the log for the duration of one mutation.
pub struct AofLock<'a> {
    file: MutexGuard<'a, File>,
}

impl AofLock<'_> {
    /// Appends `tokens` as a RESP array of bulk strings.
    pub fn log_command(&mut self, tokens: &[String]) -> std::io::Result<()> {
        let record = Frame::array(tokens.iter().map(|t| Frame::bulk(t.clone())).collect());
        self.file.write_all(&record.encode())
    }
}

/// Replays the log at `path` into `store`.
///
/// Frames are decoded sequentially with the same codec the network path
/// uses and executed through a dispatcher with no persister attached.
/// Corrupt data mid-file is a hard error; a trailing partial record (a
/// crash mid-append) is tolerated with a warning. Returns the number of
/// commands replayed.
///
/// Expiries in replayed `SET ... EX/PX` commands are recomputed relative
/// to replay time, not the original write time.
pub fn restore_from_file(path: impl AsRef<Path>, store: &Arc<DataStore>) -> Result<usize> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read append-only log {}", path.display()))?;

    let dispatcher = Dispatcher::new(Arc::clone(store));
    let mut offset = 0;
    let mut replayed = 0;

    while offset < data.len() {
        match decode(&data[offset..]) {
            Ok(Some((frame, consumed))) => {
                let reply = dispatcher.execute(frame);
                if let Frame::Error(message) = reply {
                    warn!(%message, offset, "logged command failed during replay");
                }
                offset += consumed;
                replayed += 1;
            }
            Ok(None) => {
                warn!(
                    offset,
                    trailing = data.len() - offset,
                    "append-only log ends with a partial record; ignoring it"
                );
                break;
            }
            Err(err) => {
                bail!(
                    "corrupt append-only log {} at byte {}: {}",
                    path.display(),
                    offset,
                    err
                );
            }
        }
    }

    info!(replayed, path = %path.display(), "append-only log replayed");
    Ok(replayed)
}
