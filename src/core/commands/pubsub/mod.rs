//! PUBLISH and the PUBSUB introspection subcommands.
//!
//! SUBSCRIBE/UNSUBSCRIBE/PSUBSCRIBE/PUNSUBSCRIBE are not modeled here: they
//! mutate the calling connection's own subscription state and register a
//! broadcast receiver onto it, so they are handled directly against
//! `SessionState` in the connection layer rather than through
//! `ExecutableCommand`, which only ever sees shared server state.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::helpers::ArgParser;
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

#[derive(Debug)]
pub struct Publish {
    channel: Bytes,
    message: Bytes,
}

impl ParseCommand for Publish {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let channel = p.next_bytes()?;
        let message = p.next_bytes()?;
        p.expect_end()?;
        Ok(Publish { channel, message })
    }
}

#[async_trait]
impl ExecutableCommand for Publish {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        let n = state.pubsub.publish(&self.channel, &self.message);
        Ok(RespValue::from_i64(n as i64))
    }
}

#[derive(Debug)]
pub enum PubSub {
    Channels(Option<Bytes>),
    NumSub(Vec<Bytes>),
    NumPat,
}

impl ParseCommand for PubSub {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        let mut p = ArgParser::new(args);
        let sub = p.next_bytes()?;
        if sub.eq_ignore_ascii_case(b"CHANNELS") {
            let pattern = if !p.is_empty() {
                Some(p.next_bytes()?)
            } else {
                None
            };
            p.expect_end()?;
            Ok(PubSub::Channels(pattern))
        } else if sub.eq_ignore_ascii_case(b"NUMSUB") {
            let mut channels = Vec::new();
            while !p.is_empty() {
                channels.push(p.next_bytes()?);
            }
            Ok(PubSub::NumSub(channels))
        } else if sub.eq_ignore_ascii_case(b"NUMPAT") {
            p.expect_end()?;
            Ok(PubSub::NumPat)
        } else {
            Err(KvError::Syntax)
        }
    }
}

#[async_trait]
impl ExecutableCommand for PubSub {
    async fn execute(&self, state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        match self {
            PubSub::Channels(pattern) => {
                let channels = state
                    .pubsub
                    .channels_matching(pattern.as_deref())
                    .into_iter()
                    .map(RespValue::bulk)
                    .collect();
                Ok(RespValue::array(channels))
            }
            PubSub::NumSub(channels) => {
                let mut out = Vec::with_capacity(channels.len() * 2);
                for channel in channels {
                    out.push(RespValue::bulk(channel.clone()));
                    out.push(RespValue::from_i64(state.pubsub.num_subscribers(channel) as i64));
                }
                Ok(RespValue::array(out))
            }
            PubSub::NumPat => Ok(RespValue::from_i64(state.pubsub.num_patterns() as i64)),
        }
    }
}
