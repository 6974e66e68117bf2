//! The stream command family: XADD through XINFO.
//!
//! Blocking reads (`XREAD BLOCK`, `XREADGROUP BLOCK`) follow the
//! register-before-release pattern: the waiter is registered in the
//! blocking manager while the keyspace lock from the first (empty) read
//! attempt is still held, then the lock is dropped and the caller awaits
//! a wakeup or timeout, then reacquires the lock and re-evaluates exactly
//! once. This avoids the lost-wakeup race where a write could land in the
//! gap between "found nothing" and "started waiting".

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::ParseCommand;
use crate::core::commands::helpers::ArgParser;
use crate::core::database::{lock_shard, lock_shards_for_keys, now_millis, DbShard};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::stream::{ConsumerGroup, Stream, StreamEntry, StreamId};
use crate::core::storage::DataValue;

fn entry_to_resp(e: &StreamEntry) -> RespValue {
    let mut fields = Vec::with_capacity(e.fields.len() * 2);
    for (k, v) in &e.fields {
        fields.push(RespValue::bulk(k.clone()));
        fields.push(RespValue::bulk(v.clone()));
    }
    RespValue::array(vec![
        RespValue::bulk(Bytes::from(e.id.to_string())),
        RespValue::array(fields),
    ])
}

fn get_stream<'a>(shard: &'a mut DbShard, key: &[u8], now: u64) -> KvResult<Option<&'a Stream>> {
    match shard.get(key, now) {
        None => Ok(None),
        Some(v) => Ok(Some(v.data.as_stream()?)),
    }
}

fn get_stream_mut<'a>(
    shard: &'a mut DbShard,
    key: &Bytes,
    now: u64,
    create: bool,
) -> KvResult<Option<&'a mut Stream>> {
    if shard.get(key, now).is_none() {
        if !create {
            return Ok(None);
        }
        shard
            .map
            .insert(key.clone(), crate::core::storage::StoredValue::new(DataValue::Stream(Stream::new())));
    }
    Ok(Some(shard.map.get_mut(key).unwrap().data.as_stream_mut()?))
}

fn parse_range_id(s: &[u8], default_seq: u64) -> KvResult<StreamId> {
    if s == b"-" {
        Ok(StreamId::MIN)
    } else if s == b"+" {
        Ok(StreamId::MAX)
    } else {
        StreamId::parse(s, default_seq)
    }
}

// ---------------------------------------------------------------- XADD ---

#[derive(Debug)]
pub struct XAdd {
    key: Bytes,
    id_spec: Bytes,
    fields: Vec<(Bytes, Bytes)>,
}

impl ParseCommand for XAdd {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let id_spec = p.next_bytes()?;
        if p.remaining() == 0 || p.remaining() % 2 != 0 {
            return Err(KvError::Syntax);
        }
        let mut fields = Vec::new();
        while !p.is_empty() {
            let field = p.next_bytes()?;
            let value = p.next_bytes()?;
            fields.push((field, value));
        }
        Ok(XAdd {
            key,
            id_spec,
            fields,
        })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XAdd {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        if matches!(shard.get(&self.key, now), Some(v) if !matches!(v.data, DataValue::Stream(_)))
        {
            return Err(KvError::WrongType);
        }
        let stream = get_stream_mut(shard, &self.key, now, true)?.unwrap();
        let id = stream.resolve_add_id(&self.id_spec, now)?;
        stream.add_entry(id, self.fields.clone());
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        state.blockers.notify(&self.key);
        Ok(RespValue::bulk(Bytes::from(id.to_string())))
    }
}

// -------------------------------------------------------- XRANGE/XREVRANGE

#[derive(Debug)]
pub struct XRange {
    key: Bytes,
    start: Bytes,
    end: Bytes,
    count: Option<usize>,
    reverse: bool,
}

impl XRange {
    pub fn parse_forward(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_inner(args, false)
    }

    pub fn parse_reverse(args: &[Bytes]) -> KvResult<Self> {
        Self::parse_inner(args, true)
    }

    fn parse_inner(args: &[Bytes], reverse: bool) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let start = p.next_bytes()?;
        let end = p.next_bytes()?;
        let mut count = None;
        if p.eat_keyword("COUNT") {
            count = Some(p.next_usize()?);
        }
        p.expect_end()?;
        Ok(XRange {
            key,
            start,
            end,
            count,
            reverse,
        })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XRange {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let stream = match get_stream(shard, &self.key, now)? {
            None => return Ok(RespValue::array(vec![])),
            Some(s) => s,
        };
        let entries = if self.reverse {
            let start = parse_range_id(&self.start, u64::MAX)?;
            let end = parse_range_id(&self.end, 0)?;
            stream.rev_range(start, end, self.count)
        } else {
            let start = parse_range_id(&self.start, 0)?;
            let end = parse_range_id(&self.end, u64::MAX)?;
            stream.range(start, end, self.count)
        };
        Ok(RespValue::array(entries.iter().map(entry_to_resp).collect()))
    }
}

// --------------------------------------------------------------- XLEN ---

#[derive(Debug)]
pub struct XLen {
    key: Bytes,
}

impl ParseCommand for XLen {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        p.expect_end()?;
        Ok(XLen { key })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XLen {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        match get_stream(shard, &self.key, now)? {
            None => Ok(RespValue::from_i64(0)),
            Some(s) => Ok(RespValue::from_i64(s.len() as i64)),
        }
    }
}

// --------------------------------------------------------------- XDEL ---

#[derive(Debug)]
pub struct XDel {
    key: Bytes,
    ids: Vec<StreamId>,
}

impl ParseCommand for XDel {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        if p.remaining() == 0 {
            return Err(KvError::Syntax);
        }
        let mut ids = Vec::new();
        while !p.is_empty() {
            ids.push(StreamId::parse(p.next()?, 0)?);
        }
        Ok(XDel { key, ids })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XDel {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let removed = match get_stream_mut(shard, &self.key, now, false)? {
            None => 0,
            Some(s) => s.remove_entries(&self.ids),
        };
        if removed > 0 {
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            }
        }
        Ok(RespValue::from_i64(removed as i64))
    }
}

// -------------------------------------------------------------- XTRIM ---

#[derive(Debug)]
enum TrimStrategy {
    MaxLen(usize),
    MinId(StreamId),
}

#[derive(Debug)]
pub struct XTrim {
    key: Bytes,
    strategy: TrimStrategy,
}

impl ParseCommand for XTrim {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let strategy = if p.eat_keyword("MAXLEN") {
            let _approx = p.eat_keyword("~") || p.eat_keyword("=");
            TrimStrategy::MaxLen(p.next_usize()?)
        } else if p.eat_keyword("MINID") {
            let _approx = p.eat_keyword("~") || p.eat_keyword("=");
            TrimStrategy::MinId(StreamId::parse(p.next()?, 0)?)
        } else {
            return Err(KvError::Syntax);
        };
        p.expect_end()?;
        Ok(XTrim { key, strategy })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XTrim {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let removed = match get_stream_mut(shard, &self.key, now, false)? {
            None => 0,
            Some(s) => match self.strategy {
                TrimStrategy::MaxLen(n) => s.trim_maxlen(n),
                TrimStrategy::MinId(id) => s.trim_minid(id),
            },
        };
        if removed > 0 {
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            }
        }
        Ok(RespValue::from_i64(removed as i64))
    }
}

// -------------------------------------------------------------- XSETID --

#[derive(Debug)]
pub struct XSetId {
    key: Bytes,
    id: Bytes,
}

impl ParseCommand for XSetId {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let id = p.next_bytes()?;
        p.expect_end()?;
        Ok(XSetId { key, id })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XSetId {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let stream = get_stream_mut(shard, &self.key, now, true)?.unwrap();
        let id = StreamId::parse(&self.id, 0)?;
        let raised = id > stream.last_generated_id;
        stream.last_generated_id = id;
        if let Some(version) = shard.bump_version(&self.key) {
            state.watches.notify_mutation(&self.key, version);
        }
        if raised {
            state.blockers.notify(&self.key);
        }
        Ok(RespValue::ok())
    }
}

// --------------------------------------------------- XREAD / XREADGROUP --

struct StreamQuery {
    key: Bytes,
    requested_id: Bytes,
}

fn parse_streams_clause(p: &mut ArgParser<'_>) -> KvResult<Vec<StreamQuery>> {
    if !p.eat_keyword("STREAMS") {
        return Err(KvError::Syntax);
    }
    let rest = p.remaining();
    if rest == 0 || rest % 2 != 0 {
        return Err(KvError::Syntax);
    }
    let n = rest / 2;
    let mut keys = Vec::with_capacity(n);
    for _ in 0..n {
        keys.push(p.next_bytes()?);
    }
    let mut queries = Vec::with_capacity(n);
    for key in keys {
        queries.push(StreamQuery {
            key,
            requested_id: p.next_bytes()?,
        });
    }
    Ok(queries)
}

#[derive(Debug)]
pub struct XRead {
    count: Option<usize>,
    block_ms: Option<i64>,
    queries_keys: Vec<Bytes>,
    queries_ids: Vec<Bytes>,
}

impl ParseCommand for XRead {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let mut count = None;
        let mut block_ms = None;
        loop {
            if p.eat_keyword("COUNT") {
                count = Some(p.next_usize()?);
            } else if p.eat_keyword("BLOCK") {
                block_ms = Some(p.next_i64()?);
            } else {
                break;
            }
        }
        let queries = parse_streams_clause(&mut p)?;
        p.expect_end()?;
        Ok(XRead {
            count,
            block_ms,
            queries_keys: queries.iter().map(|q| q.key.clone()).collect(),
            queries_ids: queries.iter().map(|q| q.requested_id.clone()).collect(),
        })
    }
}

impl XRead {
    async fn resolve_after_ids(&self, state: &ServerState, now: u64) -> KvResult<Vec<StreamId>> {
        let mut locks = lock_shards_for_keys(&state.db, &self.queries_keys).await;
        let mut out = Vec::with_capacity(self.queries_keys.len());
        for (key, requested) in self.queries_keys.iter().zip(self.queries_ids.iter()) {
            let shard = locks.shard_mut(state.db.shard_index(key));
            let after = if requested.as_ref() == b"$" {
                get_stream(shard, key, now)?
                    .map(|s| s.last_generated_id)
                    .unwrap_or(StreamId::MIN)
            } else {
                StreamId::parse(requested, 0)?
            };
            out.push(after);
        }
        Ok(out)
    }

    async fn attempt(&self, state: &ServerState, after_ids: &[StreamId], now: u64) -> Vec<(Bytes, Vec<StreamEntry>)> {
        let mut locks = lock_shards_for_keys(&state.db, &self.queries_keys).await;
        let mut out = Vec::new();
        for (key, after) in self.queries_keys.iter().zip(after_ids.iter()) {
            let shard = locks.shard_mut(state.db.shard_index(key));
            if let Ok(Some(stream)) = get_stream(shard, key, now) {
                let entries = stream.range(after.next(), StreamId::MAX, self.count);
                if !entries.is_empty() {
                    out.push((key.clone(), entries));
                }
            }
        }
        out
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XRead {
    async fn execute(&self, state: &ServerState, session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let after_ids = self.resolve_after_ids(state, now).await?;
        let results = self.attempt(state, &after_ids, now).await;
        if !results.is_empty() || self.block_ms.is_none() {
            return Ok(render_xread(results));
        }
        let handle = state.blockers.register(session_id, &self.queries_keys);
        let deadline = match self.block_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms as u64)),
            None => None,
        };
        handle.wait(&state.blockers, session_id, deadline).await;
        let now2 = now_millis();
        let results = self.attempt(state, &after_ids, now2).await;
        Ok(render_xread(results))
    }
}

fn render_xread(results: Vec<(Bytes, Vec<StreamEntry>)>) -> RespValue {
    if results.is_empty() {
        return RespValue::NullArray;
    }
    RespValue::array(
        results
            .into_iter()
            .map(|(key, entries)| {
                RespValue::array(vec![
                    RespValue::bulk(key),
                    RespValue::array(entries.iter().map(entry_to_resp).collect()),
                ])
            })
            .collect(),
    )
}

#[derive(Debug)]
pub struct XReadGroup {
    group: Bytes,
    consumer: Bytes,
    count: Option<usize>,
    block_ms: Option<i64>,
    queries_keys: Vec<Bytes>,
    queries_ids: Vec<Bytes>,
}

impl ParseCommand for XReadGroup {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        if !p.eat_keyword("GROUP") {
            return Err(KvError::Syntax);
        }
        let group = p.next_bytes()?;
        let consumer = p.next_bytes()?;
        let mut count = None;
        let mut block_ms = None;
        loop {
            if p.eat_keyword("COUNT") {
                count = Some(p.next_usize()?);
            } else if p.eat_keyword("BLOCK") {
                block_ms = Some(p.next_i64()?);
            } else if p.eat_keyword("NOACK") {
                // accepted, no separate ack-suppression state kept
            } else {
                break;
            }
        }
        let queries = parse_streams_clause(&mut p)?;
        p.expect_end()?;
        Ok(XReadGroup {
            group,
            consumer,
            count,
            block_ms,
            queries_keys: queries.iter().map(|q| q.key.clone()).collect(),
            queries_ids: queries.iter().map(|q| q.requested_id.clone()).collect(),
        })
    }
}

impl XReadGroup {
    async fn attempt(&self, state: &ServerState, now: u64) -> KvResult<Vec<(Bytes, Vec<StreamEntry>)>> {
        let mut locks = lock_shards_for_keys(&state.db, &self.queries_keys).await;
        let mut out = Vec::new();
        for (key, requested) in self.queries_keys.iter().zip(self.queries_ids.iter()) {
            let shard = locks.shard_mut(state.db.shard_index(key));
            let stream = match get_stream_mut(shard, key, now, false)? {
                None => {
                    return Err(KvError::NoGroup {
                        key: String::from_utf8_lossy(key).to_string(),
                        group: String::from_utf8_lossy(&self.group).to_string(),
                    })
                }
                Some(s) => s,
            };
            if !stream.groups.contains_key(&self.group) {
                return Err(KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(&self.group).to_string(),
                });
            }
            let entries = if requested.as_ref() == b">" {
                let group = stream.groups.get(&self.group).unwrap();
                let after = group.last_delivered_id;
                let fresh = stream.range(after.next(), StreamId::MAX, self.count);
                if !fresh.is_empty() {
                    let group = stream.groups.get_mut(&self.group).unwrap();
                    group.touch_consumer(&self.consumer, now);
                    for e in &fresh {
                        group.last_delivered_id = e.id;
                        let pel = group
                            .pending
                            .entry(e.id)
                            .or_insert_with(|| crate::core::storage::stream::PendingEntryInfo {
                                consumer: self.consumer.clone(),
                                delivery_time: now,
                                delivery_count: 0,
                            });
                        pel.consumer = self.consumer.clone();
                        pel.delivery_time = now;
                        pel.delivery_count += 1;
                    }
                    if let Some(version) = shard.bump_version(key) {
                        state.watches.notify_mutation(key, version);
                    }
                } else {
                    stream.groups.get_mut(&self.group).unwrap().touch_consumer(&self.consumer, now);
                }
                fresh
            } else {
                let after = StreamId::parse(requested, 0)?;
                let group = stream.groups.get(&self.group).unwrap();
                let owned: Vec<StreamId> = group
                    .pending
                    .range(after.next()..)
                    .filter(|(_, p)| p.consumer == self.consumer)
                    .map(|(id, _)| *id)
                    .collect();
                owned
                    .into_iter()
                    .filter_map(|id| stream.entries.get(&id).cloned())
                    .collect()
            };
            if !entries.is_empty() || requested.as_ref() != b">" {
                out.push((key.clone(), entries));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XReadGroup {
    async fn execute(&self, state: &ServerState, session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let results = self.attempt(state, now).await?;
        let all_empty = results.iter().all(|(_, e)| e.is_empty());
        let has_new_mode_query = self.queries_ids.iter().any(|id| id.as_ref() == b">");
        if !all_empty || self.block_ms.is_none() || !has_new_mode_query {
            return Ok(render_xread(results));
        }
        let handle = state.blockers.register(session_id, &self.queries_keys);
        let deadline = match self.block_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms as u64)),
            None => None,
        };
        handle.wait(&state.blockers, session_id, deadline).await;
        let now2 = now_millis();
        let results = self.attempt(state, now2).await?;
        Ok(render_xread(results))
    }
}

// -------------------------------------------------------------- XACK ---

#[derive(Debug)]
pub struct XAck {
    key: Bytes,
    group: Bytes,
    ids: Vec<StreamId>,
}

impl ParseCommand for XAck {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let group = p.next_bytes()?;
        if p.remaining() == 0 {
            return Err(KvError::Syntax);
        }
        let mut ids = Vec::new();
        while !p.is_empty() {
            ids.push(StreamId::parse(p.next()?, 0)?);
        }
        Ok(XAck { key, group, ids })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XAck {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let stream = match get_stream_mut(shard, &self.key, now, false)? {
            None => return Ok(RespValue::from_i64(0)),
            Some(s) => s,
        };
        let group = match stream.groups.get_mut(&self.group) {
            None => return Ok(RespValue::from_i64(0)),
            Some(g) => g,
        };
        let mut removed = 0i64;
        for id in &self.ids {
            if group.pending.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            }
        }
        Ok(RespValue::from_i64(removed))
    }
}

// ------------------------------------------------------------ XPENDING --

#[derive(Debug)]
pub struct XPending {
    key: Bytes,
    group: Bytes,
    extended: Option<(StreamId, StreamId, usize, Option<Bytes>)>,
}

impl ParseCommand for XPending {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let group = p.next_bytes()?;
        if p.is_empty() {
            return Ok(XPending {
                key,
                group,
                extended: None,
            });
        }
        let start = parse_range_id(p.next()?, 0)?;
        let end = parse_range_id(p.next()?, u64::MAX)?;
        let count = p.next_usize()?;
        let consumer = if !p.is_empty() {
            Some(p.next_bytes()?)
        } else {
            None
        };
        p.expect_end()?;
        Ok(XPending {
            key,
            group,
            extended: Some((start, end, count, consumer)),
        })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XPending {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let stream = get_stream_mut(shard, &self.key, now, false)?.ok_or_else(|| KvError::NoGroup {
            key: String::from_utf8_lossy(&self.key).to_string(),
            group: String::from_utf8_lossy(&self.group).to_string(),
        })?;
        let group = stream.groups.get(&self.group).ok_or_else(|| KvError::NoGroup {
            key: String::from_utf8_lossy(&self.key).to_string(),
            group: String::from_utf8_lossy(&self.group).to_string(),
        })?;
        match &self.extended {
            None => {
                if group.pending.is_empty() {
                    return Ok(RespValue::array(vec![
                        RespValue::from_i64(0),
                        RespValue::NullBulk,
                        RespValue::NullBulk,
                        RespValue::array(vec![]),
                    ]));
                }
                let smallest = *group.pending.keys().next().unwrap();
                let largest = *group.pending.keys().next_back().unwrap();
                let mut by_consumer: indexmap::IndexMap<Bytes, i64> = indexmap::IndexMap::new();
                for p in group.pending.values() {
                    *by_consumer.entry(p.consumer.clone()).or_insert(0) += 1;
                }
                let per_consumer = by_consumer
                    .into_iter()
                    .map(|(c, n)| {
                        RespValue::array(vec![
                            RespValue::bulk(c),
                            RespValue::bulk(Bytes::from(n.to_string())),
                        ])
                    })
                    .collect();
                Ok(RespValue::array(vec![
                    RespValue::from_i64(group.pending.len() as i64),
                    RespValue::bulk(Bytes::from(smallest.to_string())),
                    RespValue::bulk(Bytes::from(largest.to_string())),
                    RespValue::array(per_consumer),
                ]))
            }
            Some((start, end, count, consumer)) => {
                let mut out = Vec::new();
                for (id, info) in group.pending.range(*start..=*end) {
                    if let Some(c) = consumer {
                        if &info.consumer != c {
                            continue;
                        }
                    }
                    out.push(RespValue::array(vec![
                        RespValue::bulk(Bytes::from(id.to_string())),
                        RespValue::bulk(info.consumer.clone()),
                        RespValue::from_i64(now.saturating_sub(info.delivery_time) as i64),
                        RespValue::from_i64(info.delivery_count as i64),
                    ]));
                    if out.len() >= *count {
                        break;
                    }
                }
                Ok(RespValue::array(out))
            }
        }
    }
}

// ------------------------------------------------------------- XCLAIM ---

#[derive(Debug)]
pub struct XClaim {
    key: Bytes,
    group: Bytes,
    consumer: Bytes,
    min_idle_ms: i64,
    ids: Vec<StreamId>,
    idle: Option<i64>,
    time: Option<i64>,
    retry_count: Option<u64>,
    force: bool,
    justid: bool,
}

impl ParseCommand for XClaim {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let group = p.next_bytes()?;
        let consumer = p.next_bytes()?;
        let min_idle_ms = p.next_i64()?;
        let mut ids = Vec::new();
        while let Some(b) = p.peek() {
            if b.eq_ignore_ascii_case(b"IDLE")
                || b.eq_ignore_ascii_case(b"TIME")
                || b.eq_ignore_ascii_case(b"RETRYCOUNT")
                || b.eq_ignore_ascii_case(b"FORCE")
                || b.eq_ignore_ascii_case(b"JUSTID")
            {
                break;
            }
            ids.push(StreamId::parse(p.next()?, 0)?);
        }
        if ids.is_empty() {
            return Err(KvError::Syntax);
        }
        let mut idle = None;
        let mut time = None;
        let mut retry_count = None;
        let mut force = false;
        let mut justid = false;
        loop {
            if p.eat_keyword("IDLE") {
                idle = Some(p.next_i64()?);
            } else if p.eat_keyword("TIME") {
                time = Some(p.next_i64()?);
            } else if p.eat_keyword("RETRYCOUNT") {
                retry_count = Some(p.next_i64()? as u64);
            } else if p.eat_keyword("FORCE") {
                force = true;
            } else if p.eat_keyword("JUSTID") {
                justid = true;
            } else {
                break;
            }
        }
        p.expect_end()?;
        Ok(XClaim {
            key,
            group,
            consumer,
            min_idle_ms,
            ids,
            idle,
            time,
            retry_count,
            force,
            justid,
        })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XClaim {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let stream = get_stream_mut(shard, &self.key, now, false)?.ok_or_else(|| KvError::NoGroup {
            key: String::from_utf8_lossy(&self.key).to_string(),
            group: String::from_utf8_lossy(&self.group).to_string(),
        })?;
        let entries_snapshot = stream.entries.clone();
        let group = stream.groups.get_mut(&self.group).ok_or_else(|| KvError::NoGroup {
            key: String::from_utf8_lossy(&self.key).to_string(),
            group: String::from_utf8_lossy(&self.group).to_string(),
        })?;
        let new_delivery_time = self.idle.map(|i| now.saturating_sub(i.max(0) as u64))
            .or(self.time.map(|t| t.max(0) as u64))
            .unwrap_or(now);
        let mut claimed_ids = Vec::new();
        for id in &self.ids {
            match group.pending.get(id) {
                Some(existing) => {
                    let idle_ms = now.saturating_sub(existing.delivery_time);
                    if (idle_ms as i64) < self.min_idle_ms {
                        continue;
                    }
                    let next_count = self.retry_count.unwrap_or(existing.delivery_count + 1);
                    group.pending.insert(
                        *id,
                        crate::core::storage::stream::PendingEntryInfo {
                            consumer: self.consumer.clone(),
                            delivery_time: new_delivery_time,
                            delivery_count: next_count,
                        },
                    );
                    claimed_ids.push(*id);
                }
                None => {
                    if self.force && entries_snapshot.contains_key(id) {
                        group.pending.insert(
                            *id,
                            crate::core::storage::stream::PendingEntryInfo {
                                consumer: self.consumer.clone(),
                                delivery_time: new_delivery_time,
                                delivery_count: self.retry_count.unwrap_or(1),
                            },
                        );
                        claimed_ids.push(*id);
                    }
                }
            }
        }
        if !claimed_ids.is_empty() {
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            }
        }
        if self.justid {
            Ok(RespValue::array(
                claimed_ids
                    .iter()
                    .map(|id| RespValue::bulk(Bytes::from(id.to_string())))
                    .collect(),
            ))
        } else {
            Ok(RespValue::array(
                claimed_ids
                    .iter()
                    .filter_map(|id| entries_snapshot.get(id))
                    .map(entry_to_resp)
                    .collect(),
            ))
        }
    }
}

// ---------------------------------------------------------- XAUTOCLAIM --

#[derive(Debug)]
pub struct XAutoClaim {
    key: Bytes,
    group: Bytes,
    consumer: Bytes,
    min_idle_ms: i64,
    start: StreamId,
    count: usize,
    justid: bool,
}

impl ParseCommand for XAutoClaim {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let key = p.next_bytes()?;
        let group = p.next_bytes()?;
        let consumer = p.next_bytes()?;
        let min_idle_ms = p.next_i64()?;
        let start = parse_range_id(p.next()?, 0)?;
        let mut count = 100;
        let mut justid = false;
        loop {
            if p.eat_keyword("COUNT") {
                count = p.next_usize()?;
            } else if p.eat_keyword("JUSTID") {
                justid = true;
            } else {
                break;
            }
        }
        p.expect_end()?;
        Ok(XAutoClaim {
            key,
            group,
            consumer,
            min_idle_ms,
            start,
            count,
            justid,
        })
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XAutoClaim {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        let mut locks = lock_shard(&state.db, &self.key).await;
        let shard = locks.shard_mut(state.db.shard_index(&self.key));
        let stream = get_stream_mut(shard, &self.key, now, false)?.ok_or_else(|| KvError::NoGroup {
            key: String::from_utf8_lossy(&self.key).to_string(),
            group: String::from_utf8_lossy(&self.group).to_string(),
        })?;
        let entries_snapshot = stream.entries.clone();
        let group = stream.groups.get_mut(&self.group).ok_or_else(|| KvError::NoGroup {
            key: String::from_utf8_lossy(&self.key).to_string(),
            group: String::from_utf8_lossy(&self.group).to_string(),
        })?;
        let candidate_ids: Vec<StreamId> = group
            .pending
            .range(self.start..)
            .filter(|(_, p)| now.saturating_sub(p.delivery_time) as i64 >= self.min_idle_ms)
            .map(|(id, _)| *id)
            .take(self.count)
            .collect();
        let mut claimed = Vec::new();
        let mut deleted = Vec::new();
        let next_cursor = candidate_ids.last().map(|id| id.next()).unwrap_or(StreamId::MIN);
        for id in candidate_ids {
            if !entries_snapshot.contains_key(&id) {
                group.pending.remove(&id);
                deleted.push(id);
                continue;
            }
            let prior = group.pending.get(&id).unwrap().delivery_count;
            group.pending.insert(
                id,
                crate::core::storage::stream::PendingEntryInfo {
                    consumer: self.consumer.clone(),
                    delivery_time: now,
                    delivery_count: prior + 1,
                },
            );
            claimed.push(id);
        }
        if !claimed.is_empty() || !deleted.is_empty() {
            if let Some(version) = shard.bump_version(&self.key) {
                state.watches.notify_mutation(&self.key, version);
            }
        }
        let claimed_resp = if self.justid {
            RespValue::array(
                claimed
                    .iter()
                    .map(|id| RespValue::bulk(Bytes::from(id.to_string())))
                    .collect(),
            )
        } else {
            RespValue::array(
                claimed
                    .iter()
                    .filter_map(|id| entries_snapshot.get(id))
                    .map(entry_to_resp)
                    .collect(),
            )
        };
        Ok(RespValue::array(vec![
            RespValue::bulk(Bytes::from(next_cursor.to_string())),
            claimed_resp,
            RespValue::array(
                deleted
                    .iter()
                    .map(|id| RespValue::bulk(Bytes::from(id.to_string())))
                    .collect(),
            ),
        ]))
    }
}

// -------------------------------------------------------------- XGROUP --

#[derive(Debug)]
pub enum XGroup {
    Create {
        key: Bytes,
        group: Bytes,
        start_id: Bytes,
        mkstream: bool,
    },
    Destroy {
        key: Bytes,
        group: Bytes,
    },
    SetId {
        key: Bytes,
        group: Bytes,
        id: Bytes,
    },
    DelConsumer {
        key: Bytes,
        group: Bytes,
        consumer: Bytes,
    },
    CreateConsumer {
        key: Bytes,
        group: Bytes,
        consumer: Bytes,
    },
}

impl ParseCommand for XGroup {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let sub = p.next_bytes()?;
        if sub.eq_ignore_ascii_case(b"CREATE") {
            let key = p.next_bytes()?;
            let group = p.next_bytes()?;
            let start_id = p.next_bytes()?;
            let mkstream = p.eat_keyword("MKSTREAM");
            p.expect_end()?;
            Ok(XGroup::Create {
                key,
                group,
                start_id,
                mkstream,
            })
        } else if sub.eq_ignore_ascii_case(b"DESTROY") {
            let key = p.next_bytes()?;
            let group = p.next_bytes()?;
            p.expect_end()?;
            Ok(XGroup::Destroy { key, group })
        } else if sub.eq_ignore_ascii_case(b"SETID") {
            let key = p.next_bytes()?;
            let group = p.next_bytes()?;
            let id = p.next_bytes()?;
            p.expect_end()?;
            Ok(XGroup::SetId { key, group, id })
        } else if sub.eq_ignore_ascii_case(b"DELCONSUMER") {
            let key = p.next_bytes()?;
            let group = p.next_bytes()?;
            let consumer = p.next_bytes()?;
            p.expect_end()?;
            Ok(XGroup::DelConsumer {
                key,
                group,
                consumer,
            })
        } else if sub.eq_ignore_ascii_case(b"CREATECONSUMER") {
            let key = p.next_bytes()?;
            let group = p.next_bytes()?;
            let consumer = p.next_bytes()?;
            p.expect_end()?;
            Ok(XGroup::CreateConsumer {
                key,
                group,
                consumer,
            })
        } else {
            Err(KvError::Syntax)
        }
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XGroup {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        match self {
            XGroup::Create {
                key,
                group,
                start_id,
                mkstream,
            } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = match get_stream_mut(shard, key, now, *mkstream)? {
                    None => return Err(KvError::StreamKeyMissing),
                    Some(s) => s,
                };
                if stream.groups.contains_key(group) {
                    return Err(KvError::BusyGroup);
                }
                let start = if start_id.as_ref() == b"$" {
                    stream.last_generated_id
                } else if start_id.as_ref() == b"-" {
                    StreamId::MIN
                } else {
                    StreamId::parse(start_id, 0)?
                };
                stream.groups.insert(group.clone(), ConsumerGroup::new(start));
                Ok(RespValue::ok())
            }
            XGroup::Destroy { key, group } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                match get_stream_mut(shard, key, now, false)? {
                    None => Ok(RespValue::from_i64(0)),
                    Some(s) => Ok(RespValue::from_i64(if s.groups.shift_remove(group).is_some() {
                        1
                    } else {
                        0
                    })),
                }
            }
            XGroup::SetId { key, group, id } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = get_stream_mut(shard, key, now, false)?.ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                let resolved = if id.as_ref() == b"$" {
                    stream.last_generated_id
                } else {
                    StreamId::parse(id, 0)?
                };
                let g = stream.groups.get_mut(group).ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                g.last_delivered_id = resolved;
                if let Some(version) = shard.bump_version(key) {
                    state.watches.notify_mutation(key, version);
                }
                Ok(RespValue::ok())
            }
            XGroup::DelConsumer {
                key,
                group,
                consumer,
            } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = get_stream_mut(shard, key, now, false)?.ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                let g = stream.groups.get_mut(group).ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                let before = g.pending.len();
                g.pending.retain(|_, p| &p.consumer != consumer);
                let removed = before - g.pending.len();
                g.consumers.shift_remove(consumer);
                if let Some(version) = shard.bump_version(key) {
                    state.watches.notify_mutation(key, version);
                }
                Ok(RespValue::from_i64(removed as i64))
            }
            XGroup::CreateConsumer {
                key,
                group,
                consumer,
            } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = get_stream_mut(shard, key, now, false)?.ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                let g = stream.groups.get_mut(group).ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                let created = !g.consumers.contains_key(consumer);
                g.touch_consumer(consumer, now);
                Ok(RespValue::from_i64(if created { 1 } else { 0 }))
            }
        }
    }
}

// --------------------------------------------------------------- XINFO --

#[derive(Debug)]
pub enum XInfo {
    Stream { key: Bytes },
    Groups { key: Bytes },
    Consumers { key: Bytes, group: Bytes },
}

impl ParseCommand for XInfo {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let sub = p.next_bytes()?;
        if sub.eq_ignore_ascii_case(b"STREAM") {
            let key = p.next_bytes()?;
            p.expect_end()?;
            Ok(XInfo::Stream { key })
        } else if sub.eq_ignore_ascii_case(b"GROUPS") {
            let key = p.next_bytes()?;
            p.expect_end()?;
            Ok(XInfo::Groups { key })
        } else if sub.eq_ignore_ascii_case(b"CONSUMERS") {
            let key = p.next_bytes()?;
            let group = p.next_bytes()?;
            p.expect_end()?;
            Ok(XInfo::Consumers { key, group })
        } else {
            Err(KvError::Syntax)
        }
    }
}

#[async_trait]
impl super::command_trait::ExecutableCommand for XInfo {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let now = now_millis();
        match self {
            XInfo::Stream { key } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = get_stream(shard, key, now)?.ok_or(KvError::StreamKeyMissing)?;
                let mut out = vec![
                    RespValue::bulk("length"),
                    RespValue::from_i64(stream.len() as i64),
                    RespValue::bulk("last-generated-id"),
                    RespValue::bulk(Bytes::from(stream.last_generated_id.to_string())),
                ];
                if let Some((_, first)) = stream.entries.iter().next() {
                    out.push(RespValue::bulk("first-entry"));
                    out.push(entry_to_resp(first));
                }
                if let Some((_, last)) = stream.entries.iter().next_back() {
                    out.push(RespValue::bulk("last-entry"));
                    out.push(entry_to_resp(last));
                }
                Ok(RespValue::array(out))
            }
            XInfo::Groups { key } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = get_stream(shard, key, now)?.ok_or(KvError::StreamKeyMissing)?;
                let groups = stream
                    .groups
                    .iter()
                    .map(|(name, g)| {
                        RespValue::array(vec![
                            RespValue::bulk("name"),
                            RespValue::bulk(name.clone()),
                            RespValue::bulk("consumers"),
                            RespValue::from_i64(g.consumers_with_pending().max(g.consumers.len()) as i64),
                            RespValue::bulk("pending"),
                            RespValue::from_i64(g.pending.len() as i64),
                            RespValue::bulk("last-delivered-id"),
                            RespValue::bulk(Bytes::from(g.last_delivered_id.to_string())),
                        ])
                    })
                    .collect();
                Ok(RespValue::array(groups))
            }
            XInfo::Consumers { key, group } => {
                let mut locks = lock_shard(&state.db, key).await;
                let shard = locks.shard_mut(state.db.shard_index(key));
                let stream = get_stream(shard, key, now)?.ok_or(KvError::StreamKeyMissing)?;
                let g = stream.groups.get(group).ok_or_else(|| KvError::NoGroup {
                    key: String::from_utf8_lossy(key).to_string(),
                    group: String::from_utf8_lossy(group).to_string(),
                })?;
                let mut pending_count: indexmap::IndexMap<Bytes, i64> = indexmap::IndexMap::new();
                for p in g.pending.values() {
                    *pending_count.entry(p.consumer.clone()).or_insert(0) += 1;
                }
                let out = g
                    .consumers
                    .iter()
                    .map(|(name, c)| {
                        RespValue::array(vec![
                            RespValue::bulk("name"),
                            RespValue::bulk(name.clone()),
                            RespValue::bulk("pending"),
                            RespValue::from_i64(*pending_count.get(name).unwrap_or(&0)),
                            RespValue::bulk("idle"),
                            RespValue::from_i64(now.saturating_sub(c.seen_time) as i64),
                        ])
                    })
                    .collect();
                Ok(RespValue::array(out))
            }
        }
    }
}
