//! The two traits every command implements: parsing from wire arguments,
//! and execution against shared server state.

use async_trait::async_trait;
use bitflags::bitflags;

use crate::core::errors::KvResult;
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

bitflags! {
    /// Command metadata used by the dispatcher to decide what's allowed
    /// where (e.g. write commands bump WATCH versions automatically via
    /// the store layer, so this flag set only needs to describe dispatch
    /// gating, not replication/ACL concerns the teacher's richer bitset
    /// also carried).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        const WRITE    = 0b0001;
        const READONLY = 0b0010;
        const BLOCKING = 0b0100;
        const PUBSUB   = 0b1000;
    }
}

/// Parses a command's arguments (the request array minus the command
/// name) into a concrete, validated representation. Parsing failures are
/// exactly the "syntax error at queue time" cases MULTI must reject
/// before a command ever reaches the queue.
pub trait ParseCommand: Sized {
    fn parse(args: &[bytes::Bytes]) -> KvResult<Self>;
}

/// Executes an already-parsed command against the shared server state.
#[async_trait]
pub trait ExecutableCommand {
    async fn execute(&self, state: &ServerState, session_id: u64) -> KvResult<RespValue>;
}
