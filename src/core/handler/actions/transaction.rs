//! MULTI/EXEC/DISCARD/WATCH/UNWATCH. These mutate `SessionState` directly
//! (the queue, the watched-key list, the transaction flag), which is why
//! they live outside `Command::execute` entirely rather than being
//! ordinary command structs — see [`crate::core::handler::RouteResponse`].

use std::sync::Arc;

use bytes::Bytes;

use crate::connection::SessionState;
use crate::core::commands::command_trait::{ExecutableCommand, ParseCommand};
use crate::core::commands::txn::Watch;
use crate::core::errors::{KvError, KvResult};
use crate::core::handler::RouteResponse;
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

pub fn handle_multi(session: &mut SessionState) -> KvResult<RouteResponse> {
    if session.in_transaction {
        return Err(KvError::NestedMulti);
    }
    session.in_transaction = true;
    session.queued_commands.clear();
    session.tx_has_error = false;
    Ok(RouteResponse::Single(RespValue::ok()))
}

pub fn handle_discard(session: &mut SessionState, state: &ServerState, session_id: u64) -> KvResult<RouteResponse> {
    if !session.in_transaction {
        return Err(KvError::DiscardWithoutMulti);
    }
    state.watches.unwatch_all(session_id, &session.watched_keys);
    session.watched_keys.clear();
    session.reset_transaction();
    Ok(RouteResponse::Single(RespValue::ok()))
}

pub async fn handle_exec(
    session: &mut SessionState,
    state: &Arc<ServerState>,
    session_id: u64,
) -> KvResult<RouteResponse> {
    if !session.in_transaction {
        return Err(KvError::ExecWithoutMulti);
    }
    let had_error = session.tx_has_error;
    let commands = std::mem::take(&mut session.queued_commands);
    let watched_keys = std::mem::take(&mut session.watched_keys);
    session.reset_transaction();

    if had_error {
        state.watches.unwatch_all(session_id, &watched_keys);
        return Err(KvError::Other(
            "EXECABORT Transaction discarded because of previous errors.".to_string(),
        ));
    }

    if !watched_keys.is_empty() && state.watches.is_dirty(session_id) {
        state.watches.unwatch_all(session_id, &watched_keys);
        return Ok(RouteResponse::Single(RespValue::NullArray));
    }
    state.watches.unwatch_all(session_id, &watched_keys);

    let mut results = Vec::with_capacity(commands.len());
    for command in &commands {
        let result = match command.execute(state, session_id).await {
            Ok(value) => value,
            Err(e) => RespValue::from(e),
        };
        results.push(result);
    }
    Ok(RouteResponse::Single(RespValue::array(results)))
}

pub async fn handle_watch(
    keys: Vec<Bytes>,
    session: &mut SessionState,
    state: &ServerState,
    session_id: u64,
) -> KvResult<RouteResponse> {
    if session.in_transaction {
        return Err(KvError::WatchInsideMulti);
    }
    let watch = Watch::parse(&keys)?;
    watch.execute(state, session_id).await?;
    session.watched_keys.extend(keys);
    Ok(RouteResponse::Single(RespValue::ok()))
}

pub fn handle_unwatch(session: &mut SessionState, state: &ServerState, session_id: u64) -> KvResult<RouteResponse> {
    state.watches.unwatch_all(session_id, &session.watched_keys);
    session.watched_keys.clear();
    Ok(RouteResponse::Single(RespValue::ok()))
}
