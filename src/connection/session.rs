//! Per-connection state: everything that belongs to one client and must
//! never leak into the shared [`crate::core::state::ServerState`] —
//! transaction queue, watched keys, and live subscriptions.

use bytes::Bytes;
use std::collections::HashSet;
use tokio::sync::broadcast;

use crate::core::commands::Command;
use crate::core::pubsub::{ChannelMessage, PatternMessage};

/// An enum holding a receiver for either a channel or pattern
/// subscription, so the connection loop can poll a single
/// `Vec<SubscriptionReceiver>` without knowing which kind each one is
/// until a message actually arrives.
#[derive(Debug)]
pub enum SubscriptionReceiver {
    Channel(Bytes, broadcast::Receiver<ChannelMessage>),
    Pattern(Bytes, broadcast::Receiver<PatternMessage>),
}

#[derive(Debug, Default)]
pub struct SessionState {
    /// True once `MULTI` has been seen and no `EXEC`/`DISCARD` has closed
    /// it yet. While true, ordinary commands are queued rather than run.
    pub in_transaction: bool,
    /// Commands queued since `MULTI`, in arrival order.
    pub queued_commands: Vec<Command>,
    /// Set once a command fails to parse while queuing; `EXEC` then
    /// refuses to run anything and reports `EXECABORT`.
    pub tx_has_error: bool,
    /// Keys this session has `WATCH`ed, so `UNWATCH`/`EXEC`/disconnect
    /// know what to release from the process-wide registry.
    pub watched_keys: Vec<Bytes>,
    /// True once at least one of `subscribed_channels`/`subscribed_patterns`
    /// is non-empty; gates the handler's subscribed-mode command allowlist.
    pub is_subscribed: bool,
    pub subscribed_channels: HashSet<Bytes>,
    pub subscribed_patterns: HashSet<Bytes>,
    /// Live receivers the connection loop polls alongside the socket.
    pub pubsub_receivers: Vec<SubscriptionReceiver>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_transaction(&mut self) {
        self.in_transaction = false;
        self.queued_commands.clear();
        self.tx_has_error = false;
    }

    pub fn is_subscribed_mode(&self) -> bool {
        !self.subscribed_channels.is_empty() || !self.subscribed_patterns.is_empty()
    }

    /// Drops any receiver whose channel/pattern is no longer in the
    /// subscribed sets. The connection loop temporarily moves
    /// `pubsub_receivers` out of the session while polling it, so an
    /// UNSUBSCRIBE processed during that window only updates the sets;
    /// this reconciles the receiver list with them once control returns.
    pub fn prune_pubsub_receivers(&mut self) {
        let channels = &self.subscribed_channels;
        let patterns = &self.subscribed_patterns;
        self.pubsub_receivers.retain(|r| match r {
            SubscriptionReceiver::Channel(c, _) => channels.contains(c),
            SubscriptionReceiver::Pattern(p, _) => patterns.contains(p),
        });
    }
}
