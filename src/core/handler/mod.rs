//! The connection-facing dispatcher: turns a raw command name and
//! argument array into a response, routing around the generic
//! `Command::execute` path for the handful of commands that need to
//! mutate the calling connection's own state.

pub mod actions;

use std::sync::Arc;

use bytes::Bytes;

use crate::connection::SessionState;
use crate::core::commands::command_trait::ExecutableCommand;
use crate::core::commands::Command;
use crate::core::errors::{KvError, KvResult};
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

/// What a dispatched command produced. Subscribe/unsubscribe commands
/// reply with one frame per channel/pattern rather than a single nested
/// array, which is why this isn't just `RespValue`.
pub enum RouteResponse {
    Single(RespValue),
    Multiple(Vec<RespValue>),
}

impl RouteResponse {
    pub fn into_frames(self) -> Vec<RespValue> {
        match self {
            RouteResponse::Single(v) => vec![v],
            RouteResponse::Multiple(vs) => vs,
        }
    }
}

const SUBSCRIBED_MODE_ALLOWLIST: &[&[u8]] = &[
    b"SUBSCRIBE",
    b"UNSUBSCRIBE",
    b"PSUBSCRIBE",
    b"PUNSUBSCRIBE",
    b"PING",
    b"QUIT",
];

const SUBSCRIBE_FAMILY: &[&[u8]] = &[b"SUBSCRIBE", b"UNSUBSCRIBE", b"PSUBSCRIBE", b"PUNSUBSCRIBE"];

/// Parses and routes one request. `name` is the command's first argument
/// (uppercased for matching, case-preserved for error messages); `args`
/// is everything after it.
pub async fn dispatch(
    name: &[u8],
    args: Vec<Bytes>,
    state: &Arc<ServerState>,
    session: &mut SessionState,
    session_id: u64,
) -> RouteResponse {
    match dispatch_inner(name, args, state, session, session_id).await {
        Ok(resp) => resp,
        Err(e) => RouteResponse::Single(RespValue::from(e)),
    }
}

async fn dispatch_inner(
    name: &[u8],
    args: Vec<Bytes>,
    state: &Arc<ServerState>,
    session: &mut SessionState,
    session_id: u64,
) -> KvResult<RouteResponse> {
    let upper = name.to_ascii_uppercase();

    if session.is_subscribed_mode()
        && !SUBSCRIBED_MODE_ALLOWLIST.contains(&upper.as_slice())
    {
        return Err(KvError::NotAllowedInSubscribe(
            String::from_utf8_lossy(name).to_string(),
        ));
    }

    if session.in_transaction && SUBSCRIBE_FAMILY.contains(&upper.as_slice()) {
        return Err(KvError::NotAllowedInTransaction(
            String::from_utf8_lossy(name).to_string(),
        ));
    }

    match upper.as_slice() {
        b"SUBSCRIBE" => {
            if args.is_empty() {
                return Err(KvError::WrongArity("subscribe".into()));
            }
            return Ok(actions::pubsub::handle_subscribe(args, session, state));
        }
        b"UNSUBSCRIBE" => {
            return Ok(actions::pubsub::handle_unsubscribe(args, session));
        }
        b"PSUBSCRIBE" => {
            if args.is_empty() {
                return Err(KvError::WrongArity("psubscribe".into()));
            }
            return Ok(actions::pubsub::handle_psubscribe(args, session, state));
        }
        b"PUNSUBSCRIBE" => {
            return Ok(actions::pubsub::handle_punsubscribe(args, session));
        }
        b"MULTI" => return actions::transaction::handle_multi(session),
        b"EXEC" => return actions::transaction::handle_exec(session, state, session_id).await,
        b"DISCARD" => return actions::transaction::handle_discard(session, state, session_id),
        b"WATCH" => {
            return actions::transaction::handle_watch(args, session, state, session_id).await
        }
        b"UNWATCH" => return actions::transaction::handle_unwatch(session, state, session_id),
        _ => {}
    }

    let command = Command::parse(name, &args);

    if session.in_transaction {
        return Ok(RouteResponse::Single(match command {
            Err(e) => {
                session.tx_has_error = true;
                RespValue::from(e)
            }
            Ok(command) => {
                session.queued_commands.push(command);
                RespValue::simple("QUEUED")
            }
        }));
    }

    let command = command?;
    let result = command.execute(state, session_id).await?;
    Ok(RouteResponse::Single(result))
}
