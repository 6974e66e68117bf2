//! ZADD/ZRANGE and friends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, now_millis};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::zset::{format_score, SortedSet};
use crate::core::storage::DataValue;

#[derive(Debug)]
pub struct ZAdd {
    key: Bytes,
    pairs: Vec<(f64, Bytes)>,
}

impl ParseCommand for ZAdd {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 || p.remaining() % 2 != 0 {
            return Err(KvError::Syntax);
        }
        let mut pairs = Vec::new();
        while !p.is_empty() {
            let score = p.next_f64()?;
            let member = p.next_bytes()?;
            pairs.push((score, member));
        }
        Ok(ZAdd { key, pairs })
    }
}

#[async_trait]
impl ExecutableCommand for ZAdd {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if matches!(shard.get(&self.key, now), Some(v) if !matches!(v.data, DataValue::SortedSet(_)))
        {
            return Err(KvError::WrongType);
        }
        if shard.get(&self.key, now).is_none() {
            shard.map.insert(
                self.key.clone(),
                crate::core::storage::StoredValue::new(DataValue::SortedSet(SortedSet::new())),
            );
        }
        let zset = shard.map.get_mut(&self.key).unwrap().data.as_zset_mut()?;
        let mut added = 0i64;
        for (score, member) in &self.pairs {
            if zset.insert(member.clone(), *score) {
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
pub struct ZRange {
    key: Bytes,
    start: i64,
    stop: i64,
    with_scores: bool,
}

impl ParseCommand for ZRange {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let start = p.next_i64()?;
        let stop = p.next_i64()?;
        let with_scores = p.eat_keyword("WITHSCORES");
        p.expect_end()?;
        Ok(ZRange {
            key,
            start,
            stop,
            with_scores,
        })
    }
}

fn resolve_index(idx: i64, len: usize) -> i64 {
    if idx < 0 {
        idx + len as i64
    } else {
        idx
    }
}

#[async_trait]
impl ExecutableCommand for ZRange {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let zset = match shard.get(&self.key, now) {
            None => return Ok(RespValue::array(vec![])),
            Some(v) => v.data.as_zset()?,
        };
        let members: Vec<(Bytes, f64)> = zset
            .iter_ordered()
            .map(|(m, s)| (m.clone(), s))
            .collect();
        let len = members.len();
        if len == 0 {
            return Ok(RespValue::array(vec![]));
        }
        let start = resolve_index(self.start, len).max(0);
        let stop = resolve_index(self.stop, len);
        if stop < 0 || start as usize >= len || start > stop {
            return Ok(RespValue::array(vec![]));
        }
        let stop = (stop as usize).min(len - 1);
        let mut out = Vec::new();
        for (member, score) in &members[start as usize..=stop] {
            out.push(RespValue::bulk(member.clone()));
            if self.with_scores {
                out.push(RespValue::bulk(format_score(*score)));
            }
        }
        Ok(RespValue::array(out))
    }
}

#[derive(Debug)]
pub struct ZRangeByScore {
    key: Bytes,
    min: f64,
    max: f64,
    with_scores: bool,
}

impl ParseCommand for ZRangeByScore {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let min = p.next_f64()?;
        let max = p.next_f64()?;
        let with_scores = p.eat_keyword("WITHSCORES");
        p.expect_end()?;
        Ok(ZRangeByScore {
            key,
            min,
            max,
            with_scores,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZRangeByScore {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let zset = match shard.get(&self.key, now) {
            None => return Ok(RespValue::array(vec![])),
            Some(v) => v.data.as_zset()?,
        };
        let mut out = Vec::new();
        for (member, score) in zset.range_by_score(self.min, self.max) {
            out.push(RespValue::bulk(member));
            if self.with_scores {
                out.push(RespValue::bulk(format_score(score)));
            }
        }
        Ok(RespValue::array(out))
    }
}

#[derive(Debug)]
pub struct ZScore {
    key: Bytes,
    member: Bytes,
}

impl ParseCommand for ZScore {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let member = p.next_bytes()?;
        p.expect_end()?;
        Ok(ZScore { key, member })
    }
}

#[async_trait]
impl ExecutableCommand for ZScore {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::NullBulk),
            Some(v) => match v.data.as_zset()?.score(&self.member) {
                Some(score) => Ok(RespValue::bulk(format_score(score))),
                None => Ok(RespValue::NullBulk),
            },
        }
    }
}

#[derive(Debug)]
pub struct ZIncrBy {
    key: Bytes,
    increment: f64,
    member: Bytes,
}

impl ParseCommand for ZIncrBy {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let increment = p.next_f64()?;
        let member = p.next_bytes()?;
        p.expect_end()?;
        Ok(ZIncrBy {
            key,
            increment,
            member,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZIncrBy {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if matches!(shard.get(&self.key, now), Some(v) if !matches!(v.data, DataValue::SortedSet(_)))
        {
            return Err(KvError::WrongType);
        }
        if shard.get(&self.key, now).is_none() {
            shard.map.insert(
                self.key.clone(),
                crate::core::storage::StoredValue::new(DataValue::SortedSet(SortedSet::new())),
            );
        }
        let zset = shard.map.get_mut(&self.key).unwrap().data.as_zset_mut()?;
        let new_score = zset.score(&self.member).unwrap_or(0.0) + self.increment;
        zset.insert(self.member.clone(), new_score);
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        Ok(RespValue::bulk(format_score(new_score)))
    }
}

#[derive(Debug)]
pub struct ZCount {
    key: Bytes,
    min: f64,
    max: f64,
}

impl ParseCommand for ZCount {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let min = p.next_f64()?;
        let max = p.next_f64()?;
        p.expect_end()?;
        Ok(ZCount { key, min, max })
    }
}

#[async_trait]
impl ExecutableCommand for ZCount {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::from_i64(0)),
            Some(v) => Ok(RespValue::from_i64(
                v.data.as_zset()?.count_by_score(self.min, self.max) as i64,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RankDirection {
    Ascending,
    Descending,
}

#[derive(Debug)]
pub struct ZRank {
    key: Bytes,
    member: Bytes,
    direction: RankDirection,
}

impl ZRank {
    pub fn parse_zrank(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_direction(args, RankDirection::Ascending)
    }

    pub fn parse_zrevrank(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_direction(args, RankDirection::Descending)
    }

    fn parse_direction(args: &[Bytes], direction: RankDirection) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let member = p.next_bytes()?;
        p.expect_end()?;
        Ok(ZRank {
            key,
            member,
            direction,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZRank {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::NullBulk),
            Some(v) => {
                let zset = v.data.as_zset()?;
                match zset.rank(&self.member) {
                    None => Ok(RespValue::NullBulk),
                    Some(rank) => {
                        let rank = match self.direction {
                            RankDirection::Ascending => rank,
                            RankDirection::Descending => zset.len() - 1 - rank,
                        };
                        Ok(RespValue::from_i64(rank as i64))
                    }
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct ZRem {
    key: Bytes,
    members: Vec<Bytes>,
}

impl ParseCommand for ZRem {
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
        Ok(ZRem { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for ZRem {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let removed = match shard.get_mut(&self.key, now) {
            None => 0,
            Some(v) => {
                let zset = v.data.as_zset_mut()?;
                let mut n = 0i64;
                for member in &self.members {
                    if zset.remove(member) {
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
pub struct ZRemRangeByScore {
    key: Bytes,
    min: f64,
    max: f64,
}

impl ParseCommand for ZRemRangeByScore {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let min = p.next_f64()?;
        let max = p.next_f64()?;
        p.expect_end()?;
        Ok(ZRemRangeByScore { key, min, max })
    }
}

#[async_trait]
impl ExecutableCommand for ZRemRangeByScore {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let removed = match shard.get_mut(&self.key, now) {
            None => 0,
            Some(v) => v.data.as_zset_mut()?.remove_range_by_score(self.min, self.max),
        };
        if removed > 0 {
            shard.collapse_if_empty(&self.key);
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            } else {
                state.watches.notify_deletion(&self.key);
            }
        }
        Ok(RespValue::from_i64(removed as i64))
    }
}

#[derive(Debug)]
pub struct ZCard {
    key: Bytes,
}

impl ParseCommand for ZCard {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(ZCard { key })
    }
}

#[async_trait]
impl ExecutableCommand for ZCard {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match shard.get(&self.key, now) {
            None => Ok(RespValue::from_i64(0)),
            Some(v) => Ok(RespValue::from_i64(v.data.as_zset()?.len() as i64)),
        }
    }
}
