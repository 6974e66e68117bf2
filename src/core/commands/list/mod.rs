//! LPUSH/RPUSH and friends.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::DataValue;

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

#[derive(Debug)]
pub struct Push {
    key: Bytes,
    values: Vec<Bytes>,
    side: Side,
}

impl Push {
    pub fn parse_lpush(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_side(args, Side::Left)
    }

    pub fn parse_rpush(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_side(args, Side::Right)
    }

    fn parse_side(args: &[Bytes], side: Side) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 {
            return Err(KvError::Syntax);
        }
        let mut values = Vec::new();
        while !p.is_empty() {
            values.push(p.next_bytes()?);
        }
        Ok(Push { key, values, side })
    }
}

#[async_trait]
impl ExecutableCommand for Push {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if matches!(shard.get(&self.key, now), Some(v) if !matches!(v.data, DataValue::List(_))) {
            return Err(KvError::WrongType);
        }
        if shard.get(&self.key, now).is_none() {
            shard.map.insert(
                self.key.clone(),
                crate::core::storage::StoredValue::new(DataValue::List(VecDeque::new())),
            );
        }
        let list = shard.map.get_mut(&self.key).unwrap().data.as_list_mut()?;
        for value in &self.values {
            match self.side {
                Side::Left => list.push_front(value.clone()),
                Side::Right => list.push_back(value.clone()),
            }
        }
        let len = list.len() as i64;
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        Ok(RespValue::from_i64(len))
    }
}

#[derive(Debug)]
pub struct Pop {
    key: Bytes,
    side: Side,
}

impl Pop {
    pub fn parse_lpop(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_side(args, Side::Left)
    }

    pub fn parse_rpop(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_side(args, Side::Right)
    }

    fn parse_side(args: &[Bytes], side: Side) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(Pop { key, side })
    }
}

#[async_trait]
impl ExecutableCommand for Pop {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let popped = match shard.get_mut(&self.key, now) {
            None => None,
            Some(v) => {
                let list = v.data.as_list_mut()?;
                match self.side {
                    Side::Left => list.pop_front(),
                    Side::Right => list.pop_back(),
                }
            }
        };
        match popped {
            None => Ok(RespValue::NullBulk),
            Some(value) => {
                shard.collapse_if_empty(&self.key);
                if let Some(version) = shard.bump_version(&self.key) {
                    state.watches.notify_mutation(&self.key, version);
                } else {
                    state.watches.notify_deletion(&self.key);
                }
                Ok(RespValue::bulk(value))
            }
        }
    }
}

fn resolve_index(idx: i64, len: usize) -> i64 {
    if idx < 0 {
        idx + len as i64
    } else {
        idx
    }
}

#[derive(Debug)]
pub struct LRange {
    key: Bytes,
    start: i64,
    stop: i64,
}

impl ParseCommand for LRange {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let start = p.next_i64()?;
        let stop = p.next_i64()?;
        p.expect_end()?;
        Ok(LRange { key, start, stop })
    }
}

#[async_trait]
impl ExecutableCommand for LRange {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let list = match shard.get(&self.key, now) {
            None => return Ok(RespValue::array(vec![])),
            Some(v) => v.data.as_list()?,
        };
        let len = list.len();
        if len == 0 {
            return Ok(RespValue::array(vec![]));
        }
        let start = resolve_index(self.start, len).max(0) as usize;
        let stop = resolve_index(self.stop, len);
        if stop < 0 || start >= len || start as i64 > stop {
            return Ok(RespValue::array(vec![]));
        }
        let stop = (stop as usize).min(len - 1);
        let out = list
            .iter()
            .skip(start)
            .take(stop - start + 1)
            .map(|v| RespValue::bulk(v.clone()))
            .collect();
        Ok(RespValue::array(out))
    }
}

#[derive(Debug)]
pub struct LIndex {
    key: Bytes,
    index: i64,
}

impl ParseCommand for LIndex {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let index = p.next_i64()?;
        p.expect_end()?;
        Ok(LIndex { key, index })
    }
}

#[async_trait]
impl ExecutableCommand for LIndex {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let list = match shard.get(&self.key, now) {
            None => return Ok(RespValue::NullBulk),
            Some(v) => v.data.as_list()?,
        };
        let len = list.len();
        let idx = resolve_index(self.index, len);
        if idx < 0 || idx as usize >= len {
            return Ok(RespValue::NullBulk);
        }
        Ok(RespValue::bulk(list[idx as usize].clone()))
    }
}

#[derive(Debug)]
pub struct LSet {
    key: Bytes,
    index: i64,
    value: Bytes,
}

impl ParseCommand for LSet {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let index = p.next_i64()?;
        let value = p.next_bytes()?;
        p.expect_end()?;
        Ok(LSet { key, index, value })
    }
}

#[async_trait]
impl ExecutableCommand for LSet {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let list = match shard.get_mut(&self.key, now) {
            None => return Err(KvError::IndexOutOfRange),
            Some(v) => v.data.as_list_mut()?,
        };
        let len = list.len();
        let idx = resolve_index(self.index, len);
        if idx < 0 || idx as usize >= len {
            return Err(KvError::IndexOutOfRange);
        }
        list[idx as usize] = self.value.clone();
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        Ok(RespValue::ok())
    }
}

#[derive(Debug)]
pub struct LTrim {
    key: Bytes,
    start: i64,
    stop: i64,
}

impl ParseCommand for LTrim {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let start = p.next_i64()?;
        let stop = p.next_i64()?;
        p.expect_end()?;
        Ok(LTrim { key, start, stop })
    }
}

#[async_trait]
impl ExecutableCommand for LTrim {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if let Some(v) = shard.get_mut(&self.key, now) {
            let list = v.data.as_list_mut()?;
            let len = list.len();
            let start = resolve_index(self.start, len).max(0);
            let stop = resolve_index(self.stop, len);
            let kept: VecDeque<Bytes> = if stop < 0 || start as usize >= len || start > stop {
                VecDeque::new()
            } else {
                let stop = (stop as usize).min(len - 1);
                list.iter()
                    .skip(start as usize)
                    .take(stop - start as usize + 1)
                    .cloned()
                    .collect()
            };
            *list = kept;
            shard.collapse_if_empty(&self.key);
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            } else {
                state.watches.notify_deletion(&self.key);
            }
        }
        Ok(RespValue::ok())
    }
}

#[derive(Debug)]
pub struct LLen {
    key: Bytes,
}

impl ParseCommand for LLen {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(LLen { key })
    }
}

#[async_trait]
impl ExecutableCommand for LLen {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::from_i64(0)),
            Some(v) => Ok(RespValue::from_i64(v.data.as_list()?.len() as i64)),
        }
    }
}
