//! Process-wide pub/sub fan-out.
//!
//! Channels and patterns each get a lazily-created `broadcast` sender the
//! first time anyone subscribes; publishing looks the sender up (or finds
//! nothing, in which case there are no subscribers and the message is
//! simply dropped) and sends once. Subscribers hold their own `Receiver`
//! and drain it independently, so a slow subscriber never blocks a
//! publisher — it just risks lagging and dropping the oldest messages,
//! which `tokio::sync::broadcast` already handles by returning `Lagged`.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use wildmatch::WildMatch;

pub const CHANNEL_CAPACITY: usize = 1024;

/// `(channel, payload)` delivered to exact-channel subscribers.
pub type ChannelMessage = (Bytes, Bytes);
/// `(pattern, channel, payload)` delivered to pattern subscribers.
pub type PatternMessage = (Bytes, Bytes, Bytes);

#[derive(Default)]
pub struct PubSubManager {
    channels: DashMap<Bytes, broadcast::Sender<ChannelMessage>>,
    patterns: DashMap<Bytes, broadcast::Sender<PatternMessage>>,
}

impl PubSubManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_channel(&self, channel: Bytes) -> broadcast::Receiver<ChannelMessage> {
        self.channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_pattern(&self, pattern: Bytes) -> broadcast::Receiver<PatternMessage> {
        self.patterns
            .entry(pattern)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drops the sender for `channel`/`pattern` once nobody holds a
    /// receiver for it, so the registries don't grow unbounded over a long
    /// server lifetime. Safe to call speculatively; a sender with live
    /// receivers is left alone.
    pub fn gc_channel(&self, channel: &[u8]) {
        self.channels
            .remove_if(channel, |_, tx| tx.receiver_count() == 0);
    }

    pub fn gc_pattern(&self, pattern: &[u8]) {
        self.patterns
            .remove_if(pattern, |_, tx| tx.receiver_count() == 0);
    }

    /// Publishes to every exact-channel subscriber and every pattern
    /// subscriber whose pattern matches, returning the total recipient
    /// count the wire contract for PUBLISH reports.
    pub fn publish(&self, channel: &Bytes, message: &Bytes) -> usize {
        let mut recipients = 0;
        if let Some(tx) = self.channels.get(channel) {
            if let Ok(n) = tx.send((channel.clone(), message.clone())) {
                recipients += n;
            }
        }
        for entry in self.patterns.iter() {
            let pattern = entry.key();
            if glob_match(pattern, channel) {
                if let Ok(n) = entry
                    .value()
                    .send((pattern.clone(), channel.clone(), message.clone()))
                {
                    recipients += n;
                }
            }
        }
        recipients
    }

    pub fn channels_matching(&self, pattern: Option<&[u8]>) -> Vec<Bytes> {
        self.channels
            .iter()
            .filter(|e| e.value().receiver_count() > 0)
            .filter(|e| pattern.is_none_or(|p| glob_match(p, e.key())))
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn num_subscribers(&self, channel: &[u8]) -> usize {
        self.channels
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns
            .iter()
            .filter(|e| e.value().receiver_count() > 0)
            .count()
    }
}

/// Glob matching for PSUBSCRIBE/PUBSUB patterns: `*` any run, `?` one
/// character, `[...]` character classes, `\` escapes. `WildMatch` only
/// natively supports `*`/`?`, so a bracket class is rewritten one
/// character at a time before delegating — this build's patterns are
/// short (channel names), so the per-call allocation cost is negligible.
pub fn glob_match(pattern: &[u8], input: &[u8]) -> bool {
    let Ok(pattern) = std::str::from_utf8(pattern) else {
        return false;
    };
    let Ok(input) = std::str::from_utf8(input) else {
        return false;
    };
    if !pattern.contains('[') {
        return WildMatch::new(pattern).matches(input);
    }
    glob_match_with_classes(pattern, input)
}

fn glob_match_with_classes(pattern: &str, input: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = input.chars().collect();
    fn rec(p: &[char], s: &[char]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some('*') => rec(&p[1..], s) || (!s.is_empty() && rec(p, &s[1..])),
            Some('?') => !s.is_empty() && rec(&p[1..], &s[1..]),
            Some('[') => {
                let close = match p.iter().position(|&c| c == ']') {
                    Some(i) if i > 0 => i,
                    _ => return !s.is_empty() && p[0] == s[0] && rec(&p[1..], &s[1..]),
                };
                if s.is_empty() {
                    return false;
                }
                let class = &p[1..close];
                let (negate, class) = match class.first() {
                    Some('^') => (true, &class[1..]),
                    _ => (false, class),
                };
                let hit = class_contains(class, s[0]);
                if hit != negate {
                    rec(&p[close + 1..], &s[1..])
                } else {
                    false
                }
            }
            Some('\\') if p.len() > 1 => {
                !s.is_empty() && p[1] == s[0] && rec(&p[2..], &s[1..])
            }
            Some(&c) => !s.is_empty() && c == s[0] && rec(&p[1..], &s[1..]),
        }
    }
    rec(&p, &s)
}

fn class_contains(class: &[char], c: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if c >= class[i] && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}
