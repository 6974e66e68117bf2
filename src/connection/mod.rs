//! Manages the lifecycle of a single client TCP connection: framing,
//! command dispatch, and forwarding pub/sub messages the connection has
//! subscribed to back to the socket concurrently with reading requests.

pub mod session;

pub use session::{SessionState, SubscriptionReceiver};

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::select_all;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::core::handler::dispatch;
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::state::ServerState;

/// Drives one client connection until it disconnects or a fatal protocol
/// error occurs. Cleans up the session's watches, subscriptions, and any
/// stream-blocking waiters on the way out, regardless of how the loop
/// ended.
pub async fn handle_connection(socket: TcpStream, addr: SocketAddr, state: Arc<ServerState>, session_id: u64) {
    socket.set_nodelay(true).ok();
    let mut framed = Framed::new(socket, RespFrameCodec);
    let mut session = SessionState::new();

    'conn: loop {
        // Polling a subscription receiver borrows it for the lifetime of
        // the `select!` below, which would collide with the frame arm's
        // need for `&mut session` (command dispatch can itself add or
        // drop subscriptions). Move the list out for the duration of the
        // select and merge it back afterward so the two borrows never
        // overlap.
        let mut live_receivers = std::mem::take(&mut session.pubsub_receivers);
        let pubsub_fut = next_pubsub_frame(&mut live_receivers);
        tokio::select! {
            biased;
            frame = framed.next() => {
                match frame {
                    Some(Ok(frame)) => {
                        let responses = match handle_frame(frame, &state, &mut session, session_id).await {
                            Ok(rs) => rs,
                            Err(e) => vec![RespFrame::Error(e)],
                        };
                        session.pubsub_receivers.extend(live_receivers);
                        session.prune_pubsub_receivers();
                        for frame in responses {
                            if framed.send(frame).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!("connection {} error: {}", addr, e);
                        break 'conn;
                    }
                    None => {
                        debug!("connection {} closed by peer", addr);
                        break 'conn;
                    }
                }
            }
            Some(pubsub_frame) = pubsub_fut => {
                session.pubsub_receivers.extend(live_receivers);
                if framed.send(pubsub_frame).await.is_err() {
                    break 'conn;
                }
            }
        }
    }

    cleanup(&state, &session, session_id);
}

async fn handle_frame(
    frame: RespFrame,
    state: &Arc<ServerState>,
    session: &mut SessionState,
    session_id: u64,
) -> Result<Vec<RespFrame>, Bytes> {
    let args = frame
        .into_command_args()
        .map_err(|e| Bytes::from(crate::core::errors::error_message(&e)))?;
    let (name, rest) = match args.split_first() {
        Some((name, rest)) => (name.clone(), rest.to_vec()),
        None => return Ok(vec![RespFrame::Error(Bytes::from_static(b"ERR empty command"))]),
    };
    let route_response = dispatch(&name, rest, state, session, session_id).await;
    Ok(route_response
        .into_frames()
        .into_iter()
        .map(RespFrame::from)
        .collect())
}

/// Races every live subscription receiver and returns the first message
/// to arrive, formatted as the wire frame a subscribed client expects
/// (`message`/`pmessage`). Never resolves while `receivers` is empty, so
/// it is safe to poll unconditionally in the connection's `select!`.
fn next_pubsub_frame(
    receivers: &mut [SubscriptionReceiver],
) -> Pin<Box<dyn Future<Output = Option<RespFrame>> + Send + '_>> {
    if receivers.is_empty() {
        return Box::pin(std::future::pending());
    }
    let futs: Vec<Pin<Box<dyn Future<Output = Option<RespFrame>> + Send + '_>>> = receivers
        .iter_mut()
        .map(|r| -> Pin<Box<dyn Future<Output = Option<RespFrame>> + Send + '_>> {
            Box::pin(async move {
                match r {
                    SubscriptionReceiver::Channel(_, rx) => {
                        let (channel, payload) = rx.recv().await.ok()?;
                        Some(RespFrame::Array(vec![
                            RespFrame::BulkString(Bytes::from_static(b"message")),
                            RespFrame::BulkString(channel),
                            RespFrame::BulkString(payload),
                        ]))
                    }
                    SubscriptionReceiver::Pattern(_, rx) => {
                        let (pattern, channel, payload) = rx.recv().await.ok()?;
                        Some(RespFrame::Array(vec![
                            RespFrame::BulkString(Bytes::from_static(b"pmessage")),
                            RespFrame::BulkString(pattern),
                            RespFrame::BulkString(channel),
                            RespFrame::BulkString(payload),
                        ]))
                    }
                }
            })
        })
        .collect();
    Box::pin(async move {
        let (result, _, _) = select_all(futs).await;
        result
    })
}

fn cleanup(state: &Arc<ServerState>, session: &SessionState, session_id: u64) {
    state.watches.unwatch_all(session_id, &session.watched_keys);
    state.blockers.remove_waiters_for_session(session_id);
}
