//! SUBSCRIBE/UNSUBSCRIBE/PSUBSCRIBE/PUNSUBSCRIBE. These register a live
//! `broadcast::Receiver` onto the calling connection and flip its
//! subscribed-mode flags, so — like the transaction control commands —
//! they run outside `Command::execute` against `&mut SessionState`
//! directly.

use bytes::Bytes;

use crate::connection::session::SubscriptionReceiver;
use crate::connection::SessionState;
use crate::core::handler::RouteResponse;
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;

pub fn handle_subscribe(channels: Vec<Bytes>, session: &mut SessionState, state: &ServerState) -> RouteResponse {
    let mut responses = Vec::with_capacity(channels.len());
    for name in channels {
        if session.subscribed_channels.insert(name.clone()) {
            let rx = state.pubsub.subscribe_channel(name.clone());
            session
                .pubsub_receivers
                .push(SubscriptionReceiver::Channel(name.clone(), rx));
        }
        let total = session.subscribed_channels.len() + session.subscribed_patterns.len();
        responses.push(RespValue::array(vec![
            RespValue::bulk("subscribe"),
            RespValue::bulk(name),
            RespValue::from_i64(total as i64),
        ]));
    }
    session.is_subscribed = session.is_subscribed_mode();
    RouteResponse::Multiple(responses)
}

pub fn handle_psubscribe(patterns: Vec<Bytes>, session: &mut SessionState, state: &ServerState) -> RouteResponse {
    let mut responses = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        if session.subscribed_patterns.insert(pattern.clone()) {
            let rx = state.pubsub.subscribe_pattern(pattern.clone());
            session
                .pubsub_receivers
                .push(SubscriptionReceiver::Pattern(pattern.clone(), rx));
        }
        let total = session.subscribed_channels.len() + session.subscribed_patterns.len();
        responses.push(RespValue::array(vec![
            RespValue::bulk("psubscribe"),
            RespValue::bulk(pattern),
            RespValue::from_i64(total as i64),
        ]));
    }
    session.is_subscribed = session.is_subscribed_mode();
    RouteResponse::Multiple(responses)
}

pub fn handle_unsubscribe(channels: Vec<Bytes>, session: &mut SessionState) -> RouteResponse {
    let to_process: Vec<Bytes> = if channels.is_empty() {
        session.subscribed_channels.iter().cloned().collect()
    } else {
        channels
    };
    let mut responses = Vec::new();
    if to_process.is_empty() {
        responses.push(RespValue::array(vec![
            RespValue::bulk("unsubscribe"),
            RespValue::NullBulk,
            RespValue::from_i64(session.subscribed_patterns.len() as i64),
        ]));
    } else {
        for name in &to_process {
            if session.subscribed_channels.remove(name) {
                let total = session.subscribed_channels.len() + session.subscribed_patterns.len();
                responses.push(RespValue::array(vec![
                    RespValue::bulk("unsubscribe"),
                    RespValue::bulk(name.clone()),
                    RespValue::from_i64(total as i64),
                ]));
            }
        }
    }
    session
        .pubsub_receivers
        .retain(|r| !matches!(r, SubscriptionReceiver::Channel(c, _) if !session.subscribed_channels.contains(c)));
    session.is_subscribed = session.is_subscribed_mode();
    RouteResponse::Multiple(responses)
}

pub fn handle_punsubscribe(patterns: Vec<Bytes>, session: &mut SessionState) -> RouteResponse {
    let to_process: Vec<Bytes> = if patterns.is_empty() {
        session.subscribed_patterns.iter().cloned().collect()
    } else {
        patterns
    };
    let mut responses = Vec::new();
    if to_process.is_empty() {
        responses.push(RespValue::array(vec![
            RespValue::bulk("punsubscribe"),
            RespValue::NullBulk,
            RespValue::from_i64(session.subscribed_channels.len() as i64),
        ]));
    } else {
        for pattern in &to_process {
            if session.subscribed_patterns.remove(pattern) {
                let total = session.subscribed_channels.len() + session.subscribed_patterns.len();
                responses.push(RespValue::array(vec![
                    RespValue::bulk("punsubscribe"),
                    RespValue::bulk(pattern.clone()),
                    RespValue::from_i64(total as i64),
                ]));
            }
        }
    }
    session
        .pubsub_receivers
        .retain(|r| !matches!(r, SubscriptionReceiver::Pattern(p, _) if !session.subscribed_patterns.contains(p)));
    session.is_subscribed = session.is_subscribed_mode();
    RouteResponse::Multiple(responses)
}
