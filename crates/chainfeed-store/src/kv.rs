//! Prefixed key-value store.
//!
//! Keys are namespaced by a prefix so several stores can share one backing
//! file; `clear` and `items` only ever touch their own prefix.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chainfeed_core::FeedError;

pub const DEFAULT_PREFIX: &str = "chainfeed_";

/// Stored shape of an entry written with an expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringValue {
    pub value: Value,
    /// Expiry as Unix milliseconds.
    pub expiration: i64,
}

impl ExpiringValue {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() > self.expiration
    }
}

/// Key-value store, in memory or written through to a JSON file.
pub struct KvStore {
    prefix: String,
    entries: Mutex<BTreeMap<String, Value>>,
    path: Option<PathBuf>,
}

impl KvStore {
    /// In-memory store under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Mutex::new(BTreeMap::new()),
            path: None,
        }
    }

    /// File-backed store. A missing file starts empty; it is created on the
    /// first write.
    pub fn open(path: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self, FeedError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(FeedError::Storage(format!("read {}: {e}", path.display())));
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened store");
        Ok(Self {
            prefix: prefix.into(),
            entries: Mutex::new(entries),
            path: Some(path),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Apply `change` to the entries. A file-backed store writes the changed
    /// copy first and only keeps it if the write succeeded.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, Value>) -> R,
    ) -> Result<R, FeedError> {
        let mut entries = self.lock();
        if self.path.is_none() {
            return Ok(change(&mut entries));
        }
        let mut next = entries.clone();
        let out = change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(out)
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), FeedError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(entries)?;
        fs::write(path, text)
            .map_err(|e| FeedError::Storage(format!("write {}: {e}", path.display())))
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), FeedError> {
        let value = serde_json::to_value(value)?;
        let key = self.full_key(key);
        self.update(|entries| {
            entries.insert(key, value);
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(&self.full_key(key)).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Typed read. A present value of the wrong shape is an error.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FeedError> {
        self.get(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(FeedError::Serialization)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(&self.full_key(key))
    }

    /// Returns `true` if an entry was removed.
    pub fn remove(&self, key: &str) -> Result<bool, FeedError> {
        let key = self.full_key(key);
        if !self.lock().contains_key(&key) {
            return Ok(false);
        }
        self.update(|entries| entries.remove(&key).is_some())
    }

    /// Remove every entry under this store's prefix. Returns how many went.
    pub fn clear(&self) -> Result<usize, FeedError> {
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(&self.prefix));
            before - entries.len()
        })
    }

    /// All entries under this prefix, keyed without the prefix.
    pub fn items(&self) -> BTreeMap<String, Value> {
        self.lock()
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(self.prefix.as_str())
                    .map(|short| (short.to_string(), v.clone()))
            })
            .collect()
    }

    // ─── Expiring entries ────────────────────────────────────────────────────

    /// Store `value` so that it reads back as absent after `ttl`.
    pub fn set_with_expiration<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), FeedError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| FeedError::Storage(format!("ttl out of range: {e}")))?;
        self.set_with_expiration_at(key, value, Utc::now() + ttl)
    }

    pub fn set_with_expiration_at<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> Result<(), FeedError> {
        let entry = ExpiringValue {
            value: serde_json::to_value(value)?,
            expiration: expires_at.timestamp_millis(),
        };
        self.set(key, &entry)
    }

    /// Read an entry written with an expiry. Past its expiry the entry is
    /// evicted and `None` is returned; so is an entry without the expiring
    /// shape.
    pub fn get_with_expiration(&self, key: &str) -> Result<Option<Value>, FeedError> {
        self.get_with_expiration_at(key, Utc::now())
    }

    pub fn get_with_expiration_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Value>, FeedError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let Ok(entry) = serde_json::from_value::<ExpiringValue>(raw) else {
            tracing::debug!(key, "entry has no expiry envelope");
            return Ok(None);
        };
        if entry.is_expired_at(now) {
            tracing::debug!(key, "evicting expired entry");
            self.remove(key)?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("prefix", &self.prefix)
            .field("path", &self.path)
            .field("entries", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfeed_core::types::Peer;
    use serde_json::json;

    #[test]
    fn set_get_remove() {
        let store = KvStore::default();
        store.set("theme", "dark").unwrap();
        store.set("book", &json!([{"name": "alice", "address": "1abc"}])).unwrap();

        assert_eq!(store.get("theme"), Some(json!("dark")));
        assert!(store.contains("book"));
        assert_eq!(store.get_or("missing", json!(0)), json!(0));

        assert!(store.remove("theme").unwrap());
        assert!(!store.remove("theme").unwrap());
        assert_eq!(store.get("theme"), None);
    }

    #[test]
    fn typed_reads() {
        let store = KvStore::default();
        let peer = Peer {
            id: "p1".into(),
            address: "10.0.0.2:3000".into(),
            last_seen: "2024-01-01T00:00:00Z".into(),
        };
        store.set("peer", &peer).unwrap();
        assert_eq!(store.get_as::<Peer>("peer").unwrap(), Some(peer));
        assert_eq!(store.get_as::<Peer>("nobody").unwrap(), None);
        assert!(store.get_as::<u64>("peer").is_err());
    }

    #[test]
    fn clear_and_items_respect_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let wallet = KvStore::open(&path, "wallet_").unwrap();
        wallet.set("address", "1abc").unwrap();
        wallet.set("label", "main").unwrap();

        let book = KvStore::open(&path, "book_").unwrap();
        book.set("alice", "1def").unwrap();

        // `book` re-read the file, so it holds wallet keys too
        assert_eq!(book.items().len(), 1);
        assert_eq!(book.items().get("alice"), Some(&json!("1def")));

        assert_eq!(book.clear().unwrap(), 1);
        let reopened = KvStore::open(&path, "wallet_").unwrap();
        assert_eq!(reopened.items().len(), 2);
        assert_eq!(reopened.get("address"), Some(json!("1abc")));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let store = KvStore::open(&path, DEFAULT_PREFIX).unwrap();
            assert!(store.items().is_empty());
            store.set("last_block", &42u64).unwrap();
        }
        let store = KvStore::open(&path, DEFAULT_PREFIX).unwrap();
        assert_eq!(store.get_as::<u64>("last_block").unwrap(), Some(42));
    }

    #[test]
    fn failed_write_leaves_entries_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("state");
        fs::create_dir(&sub).unwrap();
        let store = KvStore::open(sub.join("store.json"), DEFAULT_PREFIX).unwrap();
        store.set("kept", &1u64).unwrap();

        // the directory vanishing makes every further write fail
        fs::remove_dir_all(&sub).unwrap();

        assert!(store.set("added", &2u64).is_err());
        assert!(!store.contains("added"));

        assert!(store.remove("kept").is_err());
        assert_eq!(store.get_as::<u64>("kept").unwrap(), Some(1));

        assert!(store.clear().is_err());
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(KvStore::open(&path, DEFAULT_PREFIX).is_err());
    }

    #[test]
    fn expired_entry_reads_absent_and_is_evicted() {
        let store = KvStore::default();
        let now = Utc::now();
        store
            .set_with_expiration_at("quote", &json!({"price": 10}), now - chrono::Duration::seconds(1))
            .unwrap();

        assert!(store.contains("quote"));
        assert_eq!(store.get_with_expiration_at("quote", now).unwrap(), None);
        assert!(!store.contains("quote"));
    }

    #[test]
    fn live_entry_reads_value() {
        let store = KvStore::default();
        store
            .set_with_expiration("session", &json!({"user": "alice"}), Duration::from_secs(3600))
            .unwrap();
        assert_eq!(
            store.get_with_expiration("session").unwrap(),
            Some(json!({"user": "alice"}))
        );

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(store.get_with_expiration_at("session", later).unwrap(), None);
    }

    #[test]
    fn plain_entry_has_no_expiry_shape() {
        let store = KvStore::default();
        store.set("plain", "value").unwrap();
        assert_eq!(store.get_with_expiration("plain").unwrap(), None);
        assert!(store.contains("plain"));
    }
}
