//! Connection-housekeeping commands that don't touch the keyspace.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

#[derive(Debug)]
pub struct Ping {
    message: Option<Bytes>,
}

impl ParseCommand for Ping {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        match args.len() {
            0 => Ok(Ping { message: None }),
            1 => Ok(Ping {
                message: Some(args[0].clone()),
            }),
            _ => Err(KvError::WrongArity("ping".into())),
        }
    }
}

#[async_trait]
impl ExecutableCommand for Ping {
    async fn execute(&self, _state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        match &self.message {
            None => Ok(RespValue::simple("PONG")),
            Some(msg) => Ok(RespValue::bulk(msg.clone())),
        }
    }
}

#[derive(Debug)]
pub struct Echo {
    message: Bytes,
}

impl ParseCommand for Echo {
    fn parse(args: &[Bytes]) -> KvResult<Self> {
        if args.len() != 1 {
            return Err(KvError::WrongArity("echo".into()));
        }
        Ok(Echo {
            message: args[0].clone(),
        })
    }
}

#[async_trait]
impl ExecutableCommand for Echo {
    async fn execute(&self, _state: &ServerState, _session_id: u64) -> KvResult<RespValue> {
        Ok(RespValue::bulk(self.message.clone()))
    }
}
