//! Deadlock-free multi-shard locking.
//!
//! A command touching more than one key must lock every shard those keys
//! land in, but two connections locking the same set of shards in
//! different orders is a classic deadlock. The fix is simple: always
//! acquire shard locks in ascending shard-index order. [`lock_shards`]
//! does this once for a set of keys and hands back a guard per shard,
//! indexed by shard index for O(1) lookup from the caller.

use std::collections::BTreeSet;

use bytes::Bytes;
use tokio::sync::MutexGuard;

use super::core::Db;
use super::shard::DbShard;

/// Guards for every shard a command needs, held for the command's whole
/// critical section. Acquired in ascending shard-index order.
pub struct ExecutionLocks<'a> {
    guards: Vec<(usize, MutexGuard<'a, DbShard>)>,
}

impl<'a> ExecutionLocks<'a> {
    pub fn shard_mut(&mut self, shard_index: usize) -> &mut DbShard {
        let pos = self
            .guards
            .binary_search_by_key(&shard_index, |(idx, _)| *idx)
            .expect("shard not locked by this ExecutionLocks");
        &mut self.guards[pos].1
    }
}

/// Locks every shard that any of `keys` hashes to, in ascending order.
pub async fn lock_shards_for_keys<'a>(db: &'a Db, keys: &[Bytes]) -> ExecutionLocks<'a> {
    let indices: BTreeSet<usize> = keys.iter().map(|k| db.shard_index(k)).collect();
    lock_shard_indices(db, indices).await
}

/// Locks a single shard; the common case, kept separate so single-key
/// commands don't pay for a `BTreeSet` allocation.
pub async fn lock_shard<'a>(db: &'a Db, key: &[u8]) -> ExecutionLocks<'a> {
    let idx = db.shard_index(key);
    let guard = db.shards[idx].lock().await;
    ExecutionLocks {
        guards: vec![(idx, guard)],
    }
}

async fn lock_shard_indices<'a>(db: &'a Db, indices: BTreeSet<usize>) -> ExecutionLocks<'a> {
    let mut guards = Vec::with_capacity(indices.len());
    for idx in indices {
        let guard = db.shards[idx].lock().await;
        guards.push((idx, guard));
    }
    ExecutionLocks { guards }
}
