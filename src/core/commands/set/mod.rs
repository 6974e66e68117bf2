//! SADD/SREM and friends.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::DataValue;

#[derive(Debug)]
pub struct SAdd {
    key: Bytes,
    members: Vec<Bytes>,
}

impl ParseCommand for SAdd {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 {
            return Err(KvError::Syntax);
        }
        let mut members = Vec::new();
        while !p.is_empty() {
            members.push(p.next_bytes()?);
        }
        Ok(SAdd { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for SAdd {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if matches!(shard.get(&self.key, now), Some(v) if !matches!(v.data, DataValue::Set(_))) {
            return Err(KvError::WrongType);
        }
        if shard.get(&self.key, now).is_none() {
            shard.map.insert(
                self.key.clone(),
                crate::core::storage::StoredValue::new(DataValue::Set(HashSet::new())),
            );
        }
        let set = shard.map.get_mut(&self.key).unwrap().data.as_set_mut()?;
        let mut added = 0i64;
        for member in &self.members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        Ok(RespValue::from_i64(added))
    }
}

#[derive(Debug)]
pub struct SRem {
    key: Bytes,
    members: Vec<Bytes>,
}

impl ParseCommand for SRem {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 {
            return Err(KvError::Syntax);
        }
        let mut members = Vec::new();
        while !p.is_empty() {
            members.push(p.next_bytes()?);
        }
        Ok(SRem { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for SRem {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let removed = match shard.get_mut(&self.key, now) {
            None => 0,
            Some(v) => {
                let set = v.data.as_set_mut()?;
                let mut n = 0i64;
                for member in &self.members {
                    if set.remove(member) {
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
pub struct SMembers {
    key: Bytes,
}

impl ParseCommand for SMembers {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(SMembers { key })
    }
}

#[async_trait]
impl ExecutableCommand for SMembers {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::array(vec![])),
            Some(v) => {
                let out = v
                    .data
                    .as_set()?
                    .iter()
                    .map(|m| RespValue::bulk(m.clone()))
                    .collect();
                Ok(RespValue::array(out))
            }
        }
    }
}

#[derive(Debug)]
pub struct SCard {
    key: Bytes,
}

impl ParseCommand for SCard {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(SCard { key })
    }
}

#[async_trait]
impl ExecutableCommand for SCard {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::from_i64(0)),
            Some(v) => Ok(RespValue::from_i64(v.data.as_set()?.len() as i64)),
        }
    }
}
