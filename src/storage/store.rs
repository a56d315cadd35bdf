//! Concurrent key-value store with TTL support
//!
//! The whole key map lives behind one exclusive lock. Every operation
//! acquires the lock for its full duration and releases it before
//! returning, so all operations are mutually exclusive with each other:
//! there is exactly one winner for any race on a key, and no lost
//! updates. The lock is never exposed to callers.
//!
//! Expiry is enforced two ways:
//! 1. **Lazy**: a read that finds an expired entry deletes it and reports
//!    the key as absent, so a stale value is never returned.
//! 2. **Active**: [`DataStore::remove_expired_keys`] samples the key space
//!    and deletes what is due; a background task calls it periodically
//!    (see the `expiry` module).

use rand::seq::IteratorRandom;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Keys sampled per active-expiry round.
pub const EXPIRY_SAMPLE_SIZE: usize = 20;

/// Fraction of a sample that must be expired before the sweep resamples.
pub const EXPIRY_RESAMPLE_THRESHOLD: f64 = 0.25;

/// Hard cap on resampling rounds within one sweep, so a store dense with
/// expired keys cannot pin the sweep in a loop.
pub const EXPIRY_MAX_ROUNDS: usize = 16;

/// Current wall-clock time as Unix-epoch milliseconds.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Failures reported by store operations as values, never panics.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The stored text (or a supplied argument) is not a 64-bit integer.
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The operation expects one value variant but the key holds another.
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// A stored value. A key holds exactly one variant at a time; operations
/// that expect the other variant fail with [`StoreError::WrongType`]
/// instead of coercing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain text, also the representation of counters.
    Text(String),
    /// Ordered elements with cheap push at both ends.
    List(VecDeque<String>),
}

/// A value plus its optional expiry, as held in the key map.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    value: Value,
    /// Absolute Unix-epoch milliseconds; `None` never expires.
    expires_at: Option<u64>,
}

impl Entry {
    fn text(value: impl Into<String>) -> Self {
        Self {
            value: Value::Text(value.into()),
            expires_at: None,
        }
    }

    fn empty_list() -> Self {
        Self {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        }
    }

    #[inline]
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The key→entry map behind its single exclusive lock.
///
/// Designed to be wrapped in an `Arc` and shared across connection tasks
/// and the expiry sweeper.
///
/// # Example
///
/// ```
/// use cinderkv::storage::DataStore;
///
/// let store = DataStore::new();
/// store.set("name", "ember");
/// assert_eq!(store.get("name").unwrap(), Some("ember".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct DataStore {
    entries: Mutex<HashMap<String, Entry>>,
}

/// Deletes `key` if its expiry has passed. Returns true if it did.
fn purge_if_expired(entries: &mut HashMap<String, Entry>, key: &str, now: u64) -> bool {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
        true
    } else {
        false
    }
}

impl DataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the text value for `key`.
    ///
    /// An expired entry is deleted on the spot and reported as absent, so
    /// this never returns a stale value. A key holding a list is a
    /// [`StoreError::WrongType`].
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        if purge_if_expired(&mut entries, key, now_ms()) {
            return Ok(None);
        }
        match entries.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Text(s) => Ok(Some(s.clone())),
                Value::List(_) => Err(StoreError::WrongType),
            },
        }
    }

    /// Stores `value` under `key`, unconditionally replacing any previous
    /// value, its variant and its expiry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.into(), Entry::text(value));
    }

    /// Like [`DataStore::set`], but the entry expires `ttl_ms` milliseconds
    /// from now.
    pub fn set_with_expiry(&self, key: impl Into<String>, value: impl Into<String>, ttl_ms: u64) {
        let entry = Entry {
            value: Value::Text(value.into()),
            expires_at: Some(now_ms().saturating_add(ttl_ms)),
        };
        self.entries.lock().unwrap().insert(key.into(), entry);
    }

    /// Membership check. Does not lazy-expire: a key whose expiry has
    /// passed but which neither a read nor the sweeper has visited yet
    /// still counts as present for the brief interval until one of them
    /// does.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Deletes `key`. Returns true if an entry was actually removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// Increments the integer text stored at `key` by one.
    pub fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.incr_by(key, 1)
    }

    /// Decrements the integer text stored at `key` by one.
    pub fn decr(&self, key: &str) -> Result<i64, StoreError> {
        self.incr_by(key, -1)
    }

    /// Adjusts the integer text stored at `key` by `delta` and returns the
    /// new value. A missing (or expired) key starts from 0. An existing
    /// expiry is preserved. Non-numeric text is
    /// [`StoreError::NotAnInteger`]; a list is [`StoreError::WrongType`].
    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key, now_ms());
        match entries.get_mut(key) {
            None => {
                entries.insert(key.to_string(), Entry::text(delta.to_string()));
                Ok(delta)
            }
            Some(entry) => match &mut entry.value {
                Value::Text(s) => {
                    let current: i64 = s.parse().map_err(|_| StoreError::NotAnInteger)?;
                    let next = current.checked_add(delta).ok_or(StoreError::NotAnInteger)?;
                    *s = next.to_string();
                    Ok(next)
                }
                Value::List(_) => Err(StoreError::WrongType),
            },
        }
    }

    /// Appends `values` at the tail of the list at `key`, creating the
    /// list if the key is absent. Returns the resulting length. A key
    /// holding text is [`StoreError::WrongType`].
    pub fn append(&self, key: &str, values: Vec<String>) -> Result<usize, StoreError> {
        self.push(key, values, false)
    }

    /// Inserts `values` at the head of the list at `key`, one at a time in
    /// argument order, so the last value ends up nearest the head.
    /// Otherwise identical to [`DataStore::append`].
    pub fn prepend(&self, key: &str, values: Vec<String>) -> Result<usize, StoreError> {
        self.push(key, values, true)
    }

    fn push(&self, key: &str, values: Vec<String>, at_head: bool) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key, now_ms());
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(Entry::empty_list);
        match &mut entry.value {
            Value::List(list) => {
                for value in values {
                    if at_head {
                        list.push_front(value);
                    } else {
                        list.push_back(value);
                    }
                }
                Ok(list.len())
            }
            Value::Text(_) => Err(StoreError::WrongType),
        }
    }

    /// Returns a snapshot of the list elements in `[start, stop)`.
    ///
    /// Stop is exclusive. Negative indices count from the tail and
    /// out-of-range bounds clamp, so `lrange(k, 0, i64::MAX)` is the whole
    /// list. An absent key yields an empty vector; a key holding text is
    /// [`StoreError::WrongType`].
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key, now_ms());
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match &entry.value {
                Value::List(list) => {
                    let len = list.len() as i64;
                    let lo = clamp_index(start, len);
                    let hi = clamp_index(stop, len);
                    if lo >= hi {
                        return Ok(Vec::new());
                    }
                    Ok(list
                        .iter()
                        .skip(lo as usize)
                        .take((hi - lo) as usize)
                        .cloned()
                        .collect())
                }
                Value::Text(_) => Err(StoreError::WrongType),
            },
        }
    }

    /// One active-expiry sweep.
    ///
    /// Samples up to [`EXPIRY_SAMPLE_SIZE`] keys uniformly at random and
    /// deletes the expired ones. If more than
    /// [`EXPIRY_RESAMPLE_THRESHOLD`] of the sample was expired the sweep
    /// resamples immediately, up to [`EXPIRY_MAX_ROUNDS`] rounds. The lock
    /// is released between rounds so foreground operations are never
    /// blocked for longer than a single round.
    ///
    /// Returns the total number of keys removed.
    pub fn remove_expired_keys(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut removed_total = 0;

        for _ in 0..EXPIRY_MAX_ROUNDS {
            let (sampled, removed) = {
                let mut entries = self.entries.lock().unwrap();
                let now = now_ms();
                let sample = entries
                    .keys()
                    .cloned()
                    .choose_multiple(&mut rng, EXPIRY_SAMPLE_SIZE);
                let mut removed = 0;
                for key in &sample {
                    if purge_if_expired(&mut entries, key, now) {
                        removed += 1;
                    }
                }
                (sample.len(), removed)
            };

            removed_total += removed;
            if sampled == 0 || (removed as f64) <= (sampled as f64) * EXPIRY_RESAMPLE_THRESHOLD {
                break;
            }
        }

        removed_total
    }

    /// Number of entries in the map, counting expired entries the sweeper
    /// has not visited yet.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns true if the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A clone of every live (non-expired) key and value.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let entries = self.entries.lock().unwrap();
        let now = now_ms();
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }
}

/// Seed a store from a plain text mapping, with no expiries.
impl From<HashMap<String, String>> for DataStore {
    fn from(seed: HashMap<String, String>) -> Self {
        let entries = seed
            .into_iter()
            .map(|(key, value)| (key, Entry::text(value)))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }
}

/// Resolves a possibly-negative index against `len` and clamps it into
/// `[0, len]`.
fn clamp_index(index: i64, len: i64) -> i64 {
    let resolved = if index < 0 { len + index } else { index };
    resolved.clamp(0, len)
}
