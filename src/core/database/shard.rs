//! One partition of the keyspace. A shard is a plain ordered map behind a
//! lock; the sharding itself (and its deadlock-free multi-key locking) is
//! handled by [`super::core::Db`] and [`super::locking`].

use bytes::Bytes;
use indexmap::IndexMap;

use crate::core::storage::StoredValue;
use crate::core::types::{Millis, Version};

#[derive(Debug, Default)]
pub struct DbShard {
    pub map: IndexMap<Bytes, StoredValue>,
}

impl DbShard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily expires `key` if it is due, returning whether it is still
    /// live (absent keys count as not-live). This is the single choke
    /// point every read/write path routes through before touching `map`.
    pub fn expire_if_due(&mut self, key: &[u8], now: Millis) -> bool {
        let due = matches!(self.map.get(key), Some(v) if v.is_expired(now));
        if due {
            self.map.shift_remove(key);
        }
        self.map.contains_key(key)
    }

    pub fn get(&mut self, key: &[u8], now: Millis) -> Option<&StoredValue> {
        self.expire_if_due(key, now);
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8], now: Millis) -> Option<&mut StoredValue> {
        self.expire_if_due(key, now);
        self.map.get_mut(key)
    }

    /// Removes `key` if its bound value is an empty container, per the
    /// keyspace's empty-container-collapse invariant.
    pub fn collapse_if_empty(&mut self, key: &[u8]) {
        if matches!(self.map.get(key), Some(v) if v.data.is_empty_container()) {
            self.map.shift_remove(key);
        }
    }

    /// Bumps `key`'s mutation version and returns the new value, or `None`
    /// if the key is absent. Every write path ends with this call so
    /// WATCH has something to compare against.
    pub fn bump_version(&mut self, key: &[u8]) -> Option<Version> {
        self.map.get_mut(key).map(|v| {
            v.bump_version();
            v.version
        })
    }
}
