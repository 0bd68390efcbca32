//! chainfeed-store: prefixed key-value storage for ChainFeed consumers.
//!
//! Backends:
//! - in-memory ([`KvStore::new`]): lost when the process exits
//! - JSON file ([`KvStore::open`]): every mutation is written through
//!
//! Entries written with [`KvStore::set_with_expiration`] read back as
//! absent (and are evicted) once their expiry has passed.

pub mod kv;

pub use kv::{ExpiringValue, KvStore, DEFAULT_PREFIX};
