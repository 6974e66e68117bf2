//! Key-level commands that don't care about the bound value's type:
//! expiration, existence, deletion, type introspection.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, lock_shards_for_keys, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

#[derive(Debug, Clone, Copy)]
enum ExpireUnit {
    Seconds,
    Millis,
}

#[derive(Debug)]
pub struct Expire {
    key: Bytes,
    amount: i64,
    unit: ExpireUnit,
}

impl Expire {
    pub fn parse_expire(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_with_unit(args, ExpireUnit::Seconds)
    }

    pub fn parse_pexpire(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_with_unit(args, ExpireUnit::Millis)
    }

    fn parse_with_unit(args: &[Bytes], unit: ExpireUnit) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let amount = p.next_i64()?;
        p.expect_end()?;
        Ok(Expire { key, amount, unit })
    }
}

#[async_trait]
impl ExecutableCommand for Expire {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if shard.get_mut(&self.key, now).is_none() {
            return Ok(RespValue::from_i64(0));
        }
        let ms = match self.unit {
            ExpireUnit::Seconds => self.amount.saturating_mul(1000),
            ExpireUnit::Millis => self.amount,
        };
        let deadline = (now as i64).saturating_add(ms).max(0) as u64;
        if let Some(v) = shard.map.get_mut(&self.key) {
            v.expires_at = Some(deadline);
        }
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        Ok(RespValue::from_i64(1))
    }
}

#[derive(Debug, Clone, Copy)]
enum TtlUnit {
    Seconds,
    Millis,
}

#[derive(Debug)]
pub struct Ttl {
    key: Bytes,
    unit: TtlUnit,
}

impl Ttl {
    pub fn parse_ttl(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_with_unit(args, TtlUnit::Seconds)
    }

    pub fn parse_pttl(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_with_unit(args, TtlUnit::Millis)
    }

    fn parse_with_unit(args: &[Bytes], unit: TtlUnit) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(Ttl { key, unit })
    }
}

#[async_trait]
impl ExecutableCommand for Ttl {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::from_i64(-2)),
            Some(v) => match v.expires_at {
                None => Ok(RespValue::from_i64(-1)),
                Some(at) => {
                    let remaining_ms = at.saturating_sub(now) as i64;
                    let value = match self.unit {
                        TtlUnit::Seconds => remaining_ms / 1000,
                        TtlUnit::Millis => remaining_ms,
                    };
                    Ok(RespValue::from_i64(value))
                }
            },
        }
    }
}

#[derive(Debug)]
pub struct Del {
    keys: Vec<Bytes>,
}

impl ParseCommand for Del {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        if args.is_empty() {
            return Err(KvError::Syntax);
        }
        Ok(Del {
            keys: args.to_vec(),
        })
    }
}

#[async_trait]
impl ExecutableCommand for Del {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shards_for_keys(&state.db, &self.keys).await;
        let mut removed = 0i64;
        for key in &self.keys {
            let shard = locks.shard_mut(state.db.shard_index(key));
            shard.expire_if_due(key, now);
            if shard.map.shift_remove(key).is_some() {
                removed += 1;
                state.watches.notify_deletion(key);
            }
        }
        Ok(RespValue::from_i64(removed))
    }
}

#[derive(Debug)]
pub struct Exists {
    keys: Vec<Bytes>,
}

impl ParseCommand for Exists {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        if args.is_empty() {
            return Err(KvError::Syntax);
        }
        Ok(Exists {
            keys: args.to_vec(),
        })
    }
}

#[async_trait]
impl ExecutableCommand for Exists {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shards_for_keys(&state.db, &self.keys).await;
        let mut count = 0i64;
        for key in &self.keys {
            let shard = locks.shard_mut(state.db.shard_index(key));
            if shard.get(key, now).is_some() {
                count += 1;
            }
        }
        Ok(RespValue::from_i64(count))
    }
}

#[derive(Debug)]
pub struct Type {
    key: Bytes,
}

impl ParseCommand for Type {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(Type { key })
    }
}

#[async_trait]
impl ExecutableCommand for Type {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::simple("none")),
            Some(v) => Ok(RespValue::simple(v.data.type_name())),
        }
    }
}
