//! GET/SET and friends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::{parse_i64, ArgParser};
use crate::core::database::{lock_shard, lock_shards_for_keys, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::DataValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existence {
    Any,
    MustExist,
    MustNotExist,
}

#[derive(Debug)]
pub struct Set {
    key: Bytes,
    value: Bytes,
    existence: Existence,
    expire_ms: Option<i64>,
}

impl ParseCommand for Set {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let value = p.next_bytes()?;
        let mut existence = Existence::Any;
        let mut expire_ms = None;
        while !p.is_empty() {
            if p.eat_keyword("NX") {
                existence = Existence::MustNotExist;
            } else if p.eat_keyword("XX") {
                existence = Existence::MustExist;
            } else if p.eat_keyword("EX") {
                expire_ms = Some(p.next_i64()? * 1000);
            } else if p.eat_keyword("PX") {
                expire_ms = Some(p.next_i64()?);
            } else {
                return Err(KvError::Syntax);
            }
        }
        Ok(Set {
            key,
            value,
            existence,
            expire_ms,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Set {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let exists = shard.get(&self.key, now).is_some();
        match self.existence {
            Existence::MustExist if !exists => return Ok(RespValue::NullBulk),
            Existence::MustNotExist if exists => return Ok(RespValue::NullBulk),
            _ => {}
        }
        let expires_at = self.expire_ms.map(|ms| now + ms.max(0) as u64);
        shard.map.insert(
            self.key.clone(),
            crate::core::storage::StoredValue {
                data: DataValue::String(self.value.clone()),
                expires_at,
                version: shard
                    .map
                    .get(&self.key)
                    .map(|v| v.version.wrapping_add(1))
                    .unwrap_or(0),
            },
        );
        let version = shard.map.get(&self.key).map(|v| v.version).unwrap_or(0);
        state.watches.notify_mutation(&self.key, version);
        Ok(RespValue::ok())
    }
}

#[derive(Debug)]
pub struct Get {
    key: Bytes,
}

impl ParseCommand for Get {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(Get { key })
    }
}

#[async_trait]
impl ExecutableCommand for Get {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::NullBulk),
            Some(v) => Ok(RespValue::bulk(v.data.as_string()?.clone())),
        }
    }
}

#[derive(Debug)]
pub struct MGet {
    keys: Vec<Bytes>,
}

impl ParseCommand for MGet {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        if args.is_empty() {
            return Err(KvError::Syntax);
        }
        Ok(MGet {
            keys: args.to_vec(),
        })
    }
}

#[async_trait]
impl ExecutableCommand for MGet {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shards_for_keys(&state.db, &self.keys).await;
        let mut out = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let shard = locks.shard_mut(state.db.shard_index(key));
            let item = match shard.get(key, now) {
                None => RespValue::NullBulk,
                Some(v) => match &v.data {
                    DataValue::String(b) => RespValue::bulk(b.clone()),
                    _ => RespValue::NullBulk,
                },
            };
            out.push(item);
        }
        Ok(RespValue::array(out))
    }
}

#[derive(Debug)]
pub struct MSet {
    pairs: Vec<(Bytes, Bytes)>,
}

impl ParseCommand for MSet {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(KvError::Syntax);
        }
        let pairs = args.chunks(2).map(|c| (c[0].clone(), c[1].clone())).collect();
        Ok(MSet { pairs })
    }
}

#[async_trait]
impl ExecutableCommand for MSet {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let keys: Vec<Bytes> = self.pairs.iter().map(|(k, _)| k.clone()).collect();
        let mut locks = lock_shards_for_keys(&state.db, &keys).await;
        for (key, value) in &self.pairs {
            let shard = locks.shard_mut(state.db.shard_index(key));
            let next_version = shard.map.get(key).map(|v| v.version.wrapping_add(1)).unwrap_or(0);
            shard.map.insert(
                key.clone(),
                crate::core::storage::StoredValue {
                    data: DataValue::String(value.clone()),
                    expires_at: None,
                    version: next_version,
                },
            );
            state.watches.notify_mutation(key, next_version);
        }
        Ok(RespValue::ok())
    }
}

#[derive(Debug, Clone, Copy)]
enum IncrKind {
    Incr,
    Decr,
    IncrBy(i64),
    DecrBy(i64),
}

#[derive(Debug)]
pub struct IncrDecr {
    key: Bytes,
    kind: IncrKind,
}

fn parse_counter(args: &[Bytes], kind_from_delta: impl Fn(i64) -> IncrKind) -> KvResult<(Bytes, IncrKind)> {
    let mut p = ArgParser::new(args);
    let key = p.next_bytes()?;
    let delta = p.next_i64()?;
    p.expect_end()?;
    Ok((key, kind_from_delta(delta)))
}

impl IncrDecr {
    pub fn parse_incr(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(IncrDecr {
            key,
            kind: IncrKind::Incr,
        })
    }

    pub fn parse_decr(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(IncrDecr {
            key,
            kind: IncrKind::Decr,
        })
    }

    pub fn parse_incrby(args: &[Bytes]) -> KvResult<Self> {
        let (key, kind) = parse_counter(args, IncrKind::IncrBy)?;
        Ok(IncrDecr { key, kind })
    }

    pub fn parse_decrby(args: &[Bytes]) -> KvResult<Self> {
        let (key, kind) = parse_counter(args, IncrKind::DecrBy)?;
        Ok(IncrDecr { key, kind })
    }
}

#[async_trait]
impl ExecutableCommand for IncrDecr {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let current: i64 = match shard.get(&self.key, now) {
            None => 0,
            Some(v) => parse_i64(v.data.as_string()?)?,
        };
        let delta = match self.kind {
            IncrKind::Incr => 1,
            IncrKind::Decr => -1,
            IncrKind::IncrBy(d) => d,
            IncrKind::DecrBy(d) => -d,
        };
        let next = current.checked_add(delta).ok_or(KvError::NotAnInteger)?;
        let mut buf = itoa::Buffer::new();
        let rendered = Bytes::copy_from_slice(buf.format(next).as_bytes());
        let next_version = shard
            .map
            .get(&self.key)
            .map(|v| v.version.wrapping_add(1))
            .unwrap_or(0);
        let expires_at = shard.map.get(&self.key).and_then(|v| v.expires_at);
        shard.map.insert(
            self.key.clone(),
            crate::core::storage::StoredValue {
                data: DataValue::String(rendered),
                expires_at,
                version: next_version,
            },
        );
        state.watches.notify_mutation(&self.key, next_version);
        Ok(RespValue::from_i64(next))
    }
}
