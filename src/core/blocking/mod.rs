//! The waiter registry backing `XREAD BLOCK` and `XREADGROUP BLOCK`.
//!
//! A blocking read can watch several streams at once, so one logical
//! waiter is registered under every stream key it cares about, sharing a
//! single wakeup slot: whichever stream is written to first fires it, and
//! every other registration becomes a no-op the next time something tries
//! to fire it (the `Option::take` inside the shared mutex makes firing
//! idempotent). The woken caller re-evaluates every stream it was watching
//! under the keyspace lock rather than trusting the wakeup reason, because
//! by the time it reacquires the lock another reader may already have
//! consumed the new entry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

type Waker = Arc<AsyncMutex<Option<oneshot::Sender<()>>>>;

struct WaiterInfo {
    session_id: u64,
    waker: Waker,
}

#[derive(Default)]
pub struct StreamBlockerManager {
    waiters: DashMap<Bytes, VecDeque<WaiterInfo>>,
}

pub struct BlockHandle {
    keys: Vec<Bytes>,
    waker: Waker,
    receiver: Option<oneshot::Receiver<()>>,
}

impl StreamBlockerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter under every key in `keys`. Must be called
    /// while still holding the keyspace lock that established "there is
    /// nothing to read yet", and the lock must be released before
    /// `wait` is awaited.
    pub fn register(&self, session_id: u64, keys: &[Bytes]) -> BlockHandle {
        let (tx, rx) = oneshot::channel();
        let waker: Waker = Arc::new(AsyncMutex::new(Some(tx)));
        for key in keys {
            self.waiters
                .entry(key.clone())
                .or_default()
                .push_back(WaiterInfo {
                    session_id,
                    waker: waker.clone(),
                });
        }
        BlockHandle {
            keys: keys.to_vec(),
            waker,
            receiver: Some(rx),
        }
    }

    /// Wakes every waiter registered on `key`. Called by any write that
    /// appends to the stream (`XADD`, `XSETID` raising the watermark).
    pub fn notify(&self, key: &[u8]) {
        if let Some(mut entry) = self.waiters.get_mut(key) {
            for waiter in entry.drain(..) {
                // Fire-and-forget: a blocked future is expected to poll
                // this via `try_lock` only from its own `wait` call, so a
                // brief lock contention window here is never observed.
                if let Ok(mut guard) = waiter.waker.try_lock() {
                    if let Some(tx) = guard.take() {
                        let _ = tx.send(());
                    }
                }
            }
        }
    }

    /// Drops every waiter belonging to `session_id`, called when its
    /// connection disconnects while blocked.
    pub fn remove_waiters_for_session(&self, session_id: u64) {
        for mut entry in self.waiters.iter_mut() {
            entry.retain(|w| w.session_id != session_id);
        }
    }

    fn cleanup(&self, keys: &[Bytes], session_id: u64) {
        for key in keys {
            if let Some(mut entry) = self.waiters.get_mut(key) {
                entry.retain(|w| w.session_id != session_id);
            }
        }
    }
}

impl BlockHandle {
    /// Waits for a wakeup or `deadline` (`None` means wait forever),
    /// returning `true` if woken, `false` on timeout. Either way, the
    /// caller must re-evaluate its read under the keyspace lock.
    pub async fn wait(mut self, manager: &StreamBlockerManager, session_id: u64, deadline: Option<Duration>) -> bool {
        let rx = self.receiver.take().expect("wait called twice");
        let woken = match deadline {
            None => rx.await.is_ok(),
            Some(d) => matches!(tokio::time::timeout(d, rx).await, Ok(Ok(()))),
        };
        manager.cleanup(&self.keys, session_id);
        woken
    }
}
