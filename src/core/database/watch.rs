//! Process-wide WATCH bookkeeping.
//!
//! Any connection can WATCH a key; any other connection's write to that
//! key must be able to find and dirty every watcher without the two
//! connections otherwise coordinating. A `DashMap` keyed by key, valued by
//! the set of `(session_id, version_at_watch)` pairs, gives writers O(1)
//! lookup by key and gives EXEC O(1) removal of its own session's entries.

use bytes::Bytes;
use dashmap::DashMap;

use crate::core::types::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    pub session_id: u64,
    /// `None` means the key did not exist at WATCH time, so any version it
    /// gets after being created (even version 0) must dirty the watcher.
    pub version_at_watch: Option<Version>,
}

#[derive(Default)]
pub struct WatchRegistry {
    watchers: DashMap<Bytes, Vec<Watch>>,
    dirty: DashMap<u64, ()>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&self, key: Bytes, session_id: u64, version_at_watch: Option<Version>) {
        self.watchers.entry(key).or_default().push(Watch {
            session_id,
            version_at_watch,
        });
    }

    /// Drops every watch entry this session owns. Called on UNWATCH,
    /// after EXEC/DISCARD, and on disconnect.
    pub fn unwatch_all(&self, session_id: u64, keys: &[Bytes]) {
        for key in keys {
            if let Some(mut entry) = self.watchers.get_mut(key) {
                entry.retain(|w| w.session_id != session_id);
            }
        }
        self.dirty.remove(&session_id);
    }

    /// Called by every mutator after it bumps a key's version. Marks any
    /// session watching that key (at an older version) dirty.
    pub fn notify_mutation(&self, key: &[u8], new_version: Version) {
        if let Some(entry) = self.watchers.get(key) {
            for w in entry.iter() {
                if w.version_at_watch != Some(new_version) {
                    self.dirty.insert(w.session_id, ());
                }
            }
        }
    }

    /// Called when a watched key is deleted outright: any watcher is
    /// unconditionally dirtied, since "the key no longer exists" is itself
    /// a change from whatever was observed at WATCH time.
    pub fn notify_deletion(&self, key: &[u8]) {
        if let Some(entry) = self.watchers.get(key) {
            for w in entry.iter() {
                self.dirty.insert(w.session_id, ());
            }
        }
    }

    pub fn is_dirty(&self, session_id: u64) -> bool {
        self.dirty.contains_key(&session_id)
    }
}
