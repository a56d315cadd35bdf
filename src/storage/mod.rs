//! Concurrent datastore with TTL expiry
//!
//! One exclusive lock guards the whole key map; lazy expiry on reads and
//! a background sampling sweep jointly keep expired entries from being
//! observable.
//!
//! ## Modules
//!
//! - `store`: the [`DataStore`], its tagged [`Value`] model and operations
//! - `expiry`: the background sweep task
//!
//! ## Example
//!
//! ```
//! use cinderkv::storage::DataStore;
//!
//! let store = DataStore::new();
//! store.set_with_expiry("session", "token123", 60_000);
//! store.prepend("jobs", vec!["first".into()]).unwrap();
//! assert_eq!(store.lrange("jobs", 0, 10).unwrap(), vec!["first".to_string()]);
//! ```

pub mod expiry;
pub mod store;

// Re-export commonly used types
pub use expiry::{start_expiry_sweeper, ExpirySweeper, SweeperConfig};
pub use store::{DataStore, StoreError, Value};
