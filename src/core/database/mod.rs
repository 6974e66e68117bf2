pub mod core;
pub mod locking;
pub mod shard;
pub mod watch;

pub use self::core::{now_millis, Db};
pub use locking::{lock_shard, lock_shards_for_keys, ExecutionLocks};
pub use shard::DbShard;
pub use watch::WatchRegistry;
