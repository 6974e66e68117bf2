//! The process-wide singleton every connection and background task shares.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::core::blocking::StreamBlockerManager;
use crate::core::database::{Db, WatchRegistry};
use crate::core::pubsub::PubSubManager;

pub struct ServerState {
    pub db: Db,
    pub pubsub: PubSubManager,
    pub watches: WatchRegistry,
    pub blockers: StreamBlockerManager,
    pub config: Config,
    next_session_id: AtomicU64,
}

impl ServerState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(ServerState {
            db: Db::new(),
            pubsub: PubSubManager::new(),
            watches: WatchRegistry::new(),
            blockers: StreamBlockerManager::new(),
            config,
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }
}
