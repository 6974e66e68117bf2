//! HSET/HGET and friends.

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::DataValue;

fn with_hash_mut<'a>(
    shard: &'a mut crate::core::database::DbShard,
    key: &Bytes,
    now: u64,
) -> KvResult<&'a mut IndexMap<Bytes, Bytes>> {
    if shard.get(key, now).is_none() {
        shard
            .map
            .insert(key.clone(), crate::core::storage::StoredValue::new(DataValue::Hash(IndexMap::new())));
    }
    shard.map.get_mut(key).unwrap().data.as_hash_mut()
}

#[derive(Debug)]
pub struct HSet {
    key: Bytes,
    pairs: Vec<(Bytes, Bytes)>,
}

impl ParseCommand for HSet {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 || p.remaining() % 2 != 0 {
            return Err(KvError::Syntax);
        }
        let mut pairs = Vec::new();
        while !p.is_empty() {
            let field = p.next_bytes()?;
            let value = p.next_bytes()?;
            pairs.push((field, value));
        }
        Ok(HSet { key, pairs })
    }
}

#[async_trait]
impl ExecutableCommand for HSet {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if matches!(shard.get(&self.key, now), Some(v) if !matches!(v.data, DataValue::Hash(_))) {
            return Err(KvError::WrongType);
        }
        let hash = with_hash_mut(shard, &self.key, now)?;
        let mut created = 0i64;
        for (field, value) in &self.pairs {
            if hash.insert(field.clone(), value.clone()).is_none() {
                created += 1;
            }
        }
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        Ok(RespValue::from_i64(created))
    }
}

#[derive(Debug)]
pub struct HGet {
    key: Bytes,
    field: Bytes,
}

impl ParseCommand for HGet {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let field = p.next_bytes()?;
        p.expect_end()?;
        Ok(HGet { key, field })
    }
}

#[async_trait]
impl ExecutableCommand for HGet {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::NullBulk),
            Some(v) => match v.data.as_hash()?.get(&self.field) {
                Some(value) => Ok(RespValue::bulk(value.clone())),
                None => Ok(RespValue::NullBulk),
            },
        }
    }
}

#[derive(Debug)]
pub struct HDel {
    key: Bytes,
    fields: Vec<Bytes>,
}

impl ParseCommand for HDel {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 {
            return Err(KvError::Syntax);
        }
        let mut fields = Vec::new();
        while !p.is_empty() {
            fields.push(p.next_bytes()?);
        }
        Ok(HDel { key, fields })
    }
}

#[async_trait]
impl ExecutableCommand for HDel {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let removed = match shard.get_mut(&self.key, now) {
            None => 0,
            Some(v) => {
                let hash = v.data.as_hash_mut()?;
                let mut n = 0i64;
                for field in &self.fields {
                    if hash.shift_remove(field).is_some() {
                        n += 1;
                    }
                }
                n
            }
        };
        if removed > 0 {
            shard.collapse_if_empty(&self.key);
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            } else {
                state.watches.notify_deletion(&self.key);
            }
        }
        Ok(RespValue::from_i64(removed))
    }
}

#[derive(Debug)]
pub struct HGetAll {
    key: Bytes,
}

impl ParseCommand for HGetAll {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(HGetAll { key })
    }
}

#[async_trait]
impl ExecutableCommand for HGetAll {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::array(vec![])),
            Some(v) => {
                let hash = v.data.as_hash()?;
                let mut out = Vec::with_capacity(hash.len() * 2);
                for (field, value) in hash {
                    out.push(RespValue::bulk(field.clone()));
                    out.push(RespValue::bulk(value.clone()));
                }
                Ok(RespValue::array(out))
            }
        }
    }
}
