//! The top-level command enum: parses a command name and its argument
//! array into a concrete variant, and forwards execution to it. This is
//! the single place that knows every command name; individual families
//! stay ignorant of dispatch and only implement `ParseCommand`/
//! `ExecutableCommand` for their own structs.

pub mod command_trait;
pub mod generic;
pub mod hash;
pub mod helpers;
pub mod keys;
pub mod list;
pub mod pubsub;
pub mod set;
pub mod streams;
pub mod string;
pub mod txn;
pub mod zset;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use command_trait::{ExecutableCommand, ParseCommand};

/// Every command this server understands except the ones that need
/// mutable access to the calling connection's own state
/// (`MULTI`/`EXEC`/`DISCARD`/`WATCH`/`UNWATCH`, `SUBSCRIBE` and its
/// siblings) — those are recognized by name and routed around this enum
/// entirely by `crate::core::handler::dispatch`. Kept as a flat enum
/// (rather than `Box<dyn ExecutableCommand>`) so queued `MULTI` commands
/// own their data without an extra allocation per queued command.
#[derive(Debug)]
pub enum Command {
    Ping(generic::Ping),
    Echo(generic::Echo),
    Set(string::Set),
    Get(string::Get),
    MGet(string::MGet),
    MSet(string::MSet),
    IncrDecr(string::IncrDecr),
    HSet(hash::HSet),
    HGet(hash::HGet),
    HDel(hash::HDel),
    HGetAll(hash::HGetAll),
    Push(list::Push),
    Pop(list::Pop),
    LRange(list::LRange),
    LIndex(list::LIndex),
    LSet(list::LSet),
    LTrim(list::LTrim),
    LLen(list::LLen),
    SAdd(set::SAdd),
    SRem(set::SRem),
    SMembers(set::SMembers),
    SCard(set::SCard),
    ZAdd(zset::ZAdd),
    ZRange(zset::ZRange),
    ZRangeByScore(zset::ZRangeByScore),
    ZScore(zset::ZScore),
    ZIncrBy(zset::ZIncrBy),
    ZCount(zset::ZCount),
    ZRank(zset::ZRank),
    ZRem(zset::ZRem),
    ZRemRangeByScore(zset::ZRemRangeByScore),
    ZCard(zset::ZCard),
    Expire(keys::Expire),
    Ttl(keys::Ttl),
    Del(keys::Del),
    Exists(keys::Exists),
    Type(keys::Type),
    XAdd(streams::XAdd),
    XRange(streams::XRange),
    XLen(streams::XLen),
    XDel(streams::XDel),
    XTrim(streams::XTrim),
    XSetId(streams::XSetId),
    XRead(streams::XRead),
    XReadGroup(streams::XReadGroup),
    XAck(streams::XAck),
    XPending(streams::XPending),
    XClaim(streams::XClaim),
    XAutoClaim(streams::XAutoClaim),
    XGroup(streams::XGroup),
    XInfo(streams::XInfo),
    Publish(pubsub::Publish),
    PubSub(pubsub::PubSub),
}

impl Command {
    /// Parses `name`/`args` into a `Command`. Unknown command names and
    /// per-command argument errors both surface as `KvError`, which is
    /// exactly what `MULTI` needs to reject bad commands at queue time
    /// rather than at `EXEC` time.
    pub fn parse(name: &[u8], args: &[Bytes]) -> KvResult<Command> {
        let upper = name.to_ascii_uppercase();
        Ok(match upper.as_slice() {
            b"PING" => Command::Ping(generic::Ping::parse(args)?),
            b"ECHO" => Command::Echo(generic::Echo::parse(args)?),
            b"SET" => Command::Set(string::Set::parse(args)?),
            b"GET" => Command::Get(string::Get::parse(args)?),
            b"MGET" => Command::MGet(string::MGet::parse(args)?),
            b"MSET" => Command::MSet(string::MSet::parse(args)?),
            b"INCR" => Command::IncrDecr(string::IncrDecr::parse_incr(args)?),
            b"DECR" => Command::IncrDecr(string::IncrDecr::parse_decr(args)?),
            b"INCRBY" => Command::IncrDecr(string::IncrDecr::parse_incrby(args)?),
            b"DECRBY" => Command::IncrDecr(string::IncrDecr::parse_decrby(args)?),
            b"HSET" => Command::HSet(hash::HSet::parse(args)?),
            b"HGET" => Command::HGet(hash::HGet::parse(args)?),
            b"HDEL" => Command::HDel(hash::HDel::parse(args)?),
            b"HGETALL" => Command::HGetAll(hash::HGetAll::parse(args)?),
            b"LPUSH" => Command::Push(list::Push::parse_lpush(args)?),
            b"RPUSH" => Command::Push(list::Push::parse_rpush(args)?),
            b"LPOP" => Command::Pop(list::Pop::parse_lpop(args)?),
            b"RPOP" => Command::Pop(list::Pop::parse_rpop(args)?),
            b"LRANGE" => Command::LRange(list::LRange::parse(args)?),
            b"LINDEX" => Command::LIndex(list::LIndex::parse(args)?),
            b"LSET" => Command::LSet(list::LSet::parse(args)?),
            b"LTRIM" => Command::LTrim(list::LTrim::parse(args)?),
            b"LLEN" => Command::LLen(list::LLen::parse(args)?),
            b"SADD" => Command::SAdd(set::SAdd::parse(args)?),
            b"SREM" => Command::SRem(set::SRem::parse(args)?),
            b"SMEMBERS" => Command::SMembers(set::SMembers::parse(args)?),
            b"SCARD" => Command::SCard(set::SCard::parse(args)?),
            b"ZADD" => Command::ZAdd(zset::ZAdd::parse(args)?),
            b"ZRANGE" => Command::ZRange(zset::ZRange::parse(args)?),
            b"ZRANGEBYSCORE" => Command::ZRangeByScore(zset::ZRangeByScore::parse(args)?),
            b"ZSCORE" => Command::ZScore(zset::ZScore::parse(args)?),
            b"ZINCRBY" => Command::ZIncrBy(zset::ZIncrBy::parse(args)?),
            b"ZCOUNT" => Command::ZCount(zset::ZCount::parse(args)?),
            b"ZRANK" => Command::ZRank(zset::ZRank::parse_zrank(args)?),
            b"ZREM" => Command::ZRem(zset::ZRem::parse(args)?),
            b"ZREMRANGEBYSCORE" => {
                Command::ZRemRangeByScore(zset::ZRemRangeByScore::parse(args)?)
            }
            b"ZCARD" => Command::ZCard(zset::ZCard::parse(args)?),
            b"EXPIRE" => Command::Expire(keys::Expire::parse_expire(args)?),
            b"PEXPIRE" => Command::Expire(keys::Expire::parse_pexpire(args)?),
            b"TTL" => Command::Ttl(keys::Ttl::parse_ttl(args)?),
            b"PTTL" => Command::Ttl(keys::Ttl::parse_pttl(args)?),
            b"DEL" => Command::Del(keys::Del::parse(args)?),
            b"EXISTS" => Command::Exists(keys::Exists::parse(args)?),
            b"TYPE" => Command::Type(keys::Type::parse(args)?),
            b"XADD" => Command::XAdd(streams::XAdd::parse(args)?),
            b"XRANGE" => Command::XRange(streams::XRange::parse_forward(args)?),
            b"XREVRANGE" => Command::XRange(streams::XRange::parse_reverse(args)?),
            b"XLEN" => Command::XLen(streams::XLen::parse(args)?),
            b"XDEL" => Command::XDel(streams::XDel::parse(args)?),
            b"XTRIM" => Command::XTrim(streams::XTrim::parse(args)?),
            b"XSETID" => Command::XSetId(streams::XSetId::parse(args)?),
            b"XREAD" => Command::XRead(streams::XRead::parse(args)?),
            b"XREADGROUP" => Command::XReadGroup(streams::XReadGroup::parse(args)?),
            b"XACK" => Command::XAck(streams::XAck::parse(args)?),
            b"XPENDING" => Command::XPending(streams::XPending::parse(args)?),
            b"XCLAIM" => Command::XClaim(streams::XClaim::parse(args)?),
            b"XAUTOCLAIM" => Command::XAutoClaim(streams::XAutoClaim::parse(args)?),
            b"XGROUP" => Command::XGroup(streams::XGroup::parse(args)?),
            b"XINFO" => Command::XInfo(streams::XInfo::parse(args)?),
            b"PUBLISH" => Command::Publish(pubsub::Publish::parse(args)?),
            b"PUBSUB" => Command::PubSub(pubsub::PubSub::parse(args)?),
            _ => {
                return Err(KvError::UnknownCommand(
                    String::from_utf8_lossy(name).to_string(),
                ))
            }
        })
    }
}

#[async_trait]
impl ExecutableCommand for Command {
    async fn execute(&self, state: &ServerState, session_id: u64) -> KvResult<RespValue> {
        match self {
            Command::Ping(c) => c.execute(state, session_id).await,
            Command::Echo(c) => c.execute(state, session_id).await,
            Command::Set(c) => c.execute(state, session_id).await,
            Command::Get(c) => c.execute(state, session_id).await,
            Command::MGet(c) => c.execute(state, session_id).await,
            Command::MSet(c) => c.execute(state, session_id).await,
            Command::IncrDecr(c) => c.execute(state, session_id).await,
            Command::HSet(c) => c.execute(state, session_id).await,
            Command::HGet(c) => c.execute(state, session_id).await,
            Command::HDel(c) => c.execute(state, session_id).await,
            Command::HGetAll(c) => c.execute(state, session_id).await,
            Command::Push(c) => c.execute(state, session_id).await,
            Command::Pop(c) => c.execute(state, session_id).await,
            Command::LRange(c) => c.execute(state, session_id).await,
            Command::LIndex(c) => c.execute(state, session_id).await,
            Command::LSet(c) => c.execute(state, session_id).await,
            Command::LTrim(c) => c.execute(state, session_id).await,
            Command::LLen(c) => c.execute(state, session_id).await,
            Command::SAdd(c) => c.execute(state, session_id).await,
            Command::SRem(c) => c.execute(state, session_id).await,
            Command::SMembers(c) => c.execute(state, session_id).await,
            Command::SCard(c) => c.execute(state, session_id).await,
            Command::ZAdd(c) => c.execute(state, session_id).await,
            Command::ZRange(c) => c.execute(state, session_id).await,
            Command::ZRangeByScore(c) => c.execute(state, session_id).await,
            Command::ZScore(c) => c.execute(state, session_id).await,
            Command::ZIncrBy(c) => c.execute(state, session_id).await,
            Command::ZCount(c) => c.execute(state, session_id).await,
            Command::ZRank(c) => c.execute(state, session_id).await,
            Command::ZRem(c) => c.execute(state, session_id).await,
            Command::ZRemRangeByScore(c) => c.execute(state, session_id).await,
            Command::ZCard(c) => c.execute(state, session_id).await,
            Command::Expire(c) => c.execute(state, session_id).await,
            Command::Ttl(c) => c.execute(state, session_id).await,
            Command::Del(c) => c.execute(state, session_id).await,
            Command::Exists(c) => c.execute(state, session_id).await,
            Command::Type(c) => c.execute(state, session_id).await,
            Command::XAdd(c) => c.execute(state, session_id).await,
            Command::XRange(c) => c.execute(state, session_id).await,
            Command::XLen(c) => c.execute(state, session_id).await,
            Command::XDel(c) => c.execute(state, session_id).await,
            Command::XTrim(c) => c.execute(state, session_id).await,
            Command::XSetId(c) => c.execute(state, session_id).await,
            Command::XRead(c) => c.execute(state, session_id).await,
            Command::XReadGroup(c) => c.execute(state, session_id).await,
            Command::XAck(c) => c.execute(state, session_id).await,
            Command::XPending(c) => c.execute(state, session_id).await,
            Command::XClaim(c) => c.execute(state, session_id).await,
            Command::XAutoClaim(c) => c.execute(state, session_id).await,
            Command::XGroup(c) => c.execute(state, session_id).await,
            Command::XInfo(c) => c.execute(state, session_id).await,
            Command::Publish(c) => c.execute(state, session_id).await,
            Command::PubSub(c) => c.execute(state, session_id).await,
        }
    }
}
