//! WATCH's server-side half: registering optimistic-lock watches against
//! the process-wide [`crate::core::database::WatchRegistry`].
//!
//! MULTI/EXEC/DISCARD/UNWATCH never appear here. They mutate the calling
//! connection's own queue/mode/watched-key list, which `ExecutableCommand`
//! has no way to reach (it only ever sees shared server state), so the
//! connection handler implements them directly against `SessionState`,
//! the same way it special-cases SUBSCRIBE. WATCH is the one exception:
//! its bookkeeping against the shared registry fits the ordinary command
//! shape fine, and the handler only needs one extra step afterward —
//! copying `Watch::keys()` into the session's own watched-key list so
//! UNWATCH and EXEC know what to release.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

#[derive(Debug)]
pub struct Watch {
    keys: Vec<Bytes>,
}

impl Watch {
    pub fn keys(&self) -> &[Bytes] {
        &self.keys
    }
}

impl ParseCommand for Watch {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        if args.is_empty() {
            return Err(KvError::Syntax);
        }
        let mut p = ArgParser::new(args);
        let mut keys = Vec::new();
        while !p.is_empty() {
            keys.push(p.next_bytes()?);
        }
        Ok(Watch { keys })
    }
}

#[async_trait]
impl ExecutableCommand for Watch {
    async fn execute(&self, state: &ServerState, session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        for key in &self.keys {
            let mut locks = lock_shard(&state.db, key).await;
            let shard = locks.shard_mut(state.db.shard_index(key));
            let version = shard.get(key, now).map(|v| v.version);
            state.watches.watch(key.clone(), session_id, version);
        }
        Ok(RespValue::ok())
    }
}
