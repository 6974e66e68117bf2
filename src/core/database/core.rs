//! The sharded keyspace itself.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::Mutex;

use super::shard::DbShard;
use crate::core::types::Millis;

/// Fixed shard count. Large enough that unrelated keys rarely contend,
/// small enough that a multi-key command's `lock_shards_for_keys` call
/// stays cheap even when it touches most of them.
pub const NUM_SHARDS: usize = 16;

pub struct Db {
    pub shards: Vec<Arc<Mutex<DbShard>>>,
}

impl Db {
    pub fn new() -> Self {
        Self::with_shard_count(NUM_SHARDS)
    }

    pub fn with_shard_count(count: usize) -> Self {
        let shards = (0..count)
            .map(|_| Arc::new(Mutex::new(DbShard::new())))
            .collect();
        Db { shards }
    }

    /// FNV-1a over the key bytes, cheap and stable across runs (unlike
    /// `std`'s randomized `HashMap` hasher), so the same key always maps
    /// to the same shard for the lifetime of the process.
    pub fn shard_index(&self, key: &[u8]) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for &b in key {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash as usize) % self.shards.len()
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as Millis
}

pub type KeySet = Vec<Bytes>;
