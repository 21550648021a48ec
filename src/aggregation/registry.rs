//! # Session Registry
//!
//! Concurrent map from job reference identifier to its active [`Session`].
//!
//! ## Key Features
//!
//! - **Atomic get-or-create**: concurrent first arrivals for a key observe one session
//! - **Identity-checked removal**: a session only evicts its own entry, never a
//!   successor created for the same key
//! - **Re-routing**: a record that lands on a session which finalized underneath
//!   it is handed to a fresh session instead of being dropped
//!
//! The map is sharded ([`DashMap`]); no map guard is ever held while a session
//! lock is taken, since finalization removes entries while holding its own lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregation::report::{CompletionReason, ReportSink};
use crate::aggregation::session::{AddOutcome, ReleaseFn, Session, SessionSnapshot};
use crate::config::SessionConfig;
use crate::error::AggregationError;
use crate::models::Record;
use crate::scheduler::DeadlineScheduler;

type SessionMap = DashMap<String, Arc<Session>>;

/// Where a dispatched record ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub session_id: Uuid,
    pub outcome: AddOutcome,
    /// How many finalized sessions the record bounced off first
    pub reroutes: u32,
}

/// Registry lifetime counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub active: usize,
    pub sessions_created: u64,
    pub sessions_released: u64,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    released: AtomicU64,
}

pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    counters: Arc<Counters>,
    scheduler: DeadlineScheduler,
    sink: Arc<dyn ReportSink>,
    idle_timeout: Duration,
    max_reroutes: u32,
}

impl SessionRegistry {
    pub fn new(
        scheduler: DeadlineScheduler,
        sink: Arc<dyn ReportSink>,
        idle_timeout: Duration,
        max_reroutes: u32,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            scheduler,
            sink,
            idle_timeout,
            max_reroutes,
        }
    }

    pub fn from_config(
        config: &SessionConfig,
        scheduler: DeadlineScheduler,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self::new(scheduler, sink, config.idle_timeout(), config.max_reroutes)
    }

    /// Return the active session for `key`, creating it with `expected_count` if absent
    pub fn get_or_create(&self, key: &str, expected_count: u32) -> Arc<Session> {
        // The entry guard must be released before the session is used
        Arc::clone(
            self.sessions
                .entry(key.to_string())
                .or_insert_with(|| {
                    self.counters.created.fetch_add(1, Ordering::AcqRel);
                    Arc::new(Session::new(
                        key,
                        expected_count,
                        self.idle_timeout,
                        self.scheduler.clone(),
                        Arc::clone(&self.sink),
                        self.release_fn(),
                    ))
                })
                .value(),
        )
    }

    /// Remove `key` only if it still maps to the session identified by `session_id`
    pub fn remove(&self, key: &str, session_id: Uuid) -> bool {
        remove_matching(&self.sessions, &self.counters, key, session_id)
    }

    /// Route a record to its key's session
    pub fn dispatch(&self, record: Record) -> Result<DispatchOutcome, AggregationError> {
        for reroutes in 0..=self.max_reroutes {
            let session = self.get_or_create(&record.key, record.expected_count);

            match session.add_record(record.clone()) {
                AddOutcome::Rejected => {
                    debug!(
                        key = %record.key,
                        sub_id = %record.sub_id,
                        stale_session = %session.session_id(),
                        "🔀 Session finalized before record landed; re-routing"
                    );
                }
                outcome => {
                    return Ok(DispatchOutcome {
                        session_id: session.session_id(),
                        outcome,
                        reroutes,
                    })
                }
            }
        }

        Err(AggregationError::RoutingExhausted {
            key: record.key,
            attempts: self.max_reroutes + 1,
        })
    }

    pub fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active: self.active_count(),
            sessions_created: self.counters.created.load(Ordering::Acquire),
            sessions_released: self.counters.released.load(Ordering::Acquire),
        }
    }

    /// Snapshot every active session, ordered by key
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .active_sessions()
            .iter()
            .map(|session| session.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    /// Finalize every active session with [`CompletionReason::Shutdown`]
    pub fn shutdown_flush(&self) -> usize {
        let flushed = self
            .active_sessions()
            .iter()
            .filter(|session| session.finalize(CompletionReason::Shutdown))
            .count();

        info!(flushed = flushed, "🛑 Flushed active sessions on shutdown");
        flushed
    }

    /// Clone the session handles out so no shard guard outlives this call
    fn active_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn release_fn(&self) -> ReleaseFn {
        let sessions: Weak<SessionMap> = Arc::downgrade(&self.sessions);
        let counters = Arc::clone(&self.counters);
        Arc::new(move |key: &str, session_id: Uuid| {
            if let Some(sessions) = sessions.upgrade() {
                remove_matching(&sessions, &counters, key, session_id);
            }
        })
    }
}

fn remove_matching(sessions: &SessionMap, counters: &Counters, key: &str, session_id: Uuid) -> bool {
    let removed = sessions
        .remove_if(key, |_, session| session.session_id() == session_id)
        .is_some();

    if removed {
        counters.released.fetch_add(1, Ordering::AcqRel);
        debug!(key = %key, session_id = %session_id, "Session released from registry");
    }
    removed
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.sessions.len())
            .field("idle_timeout", &self.idle_timeout)
            .field("max_reroutes", &self.max_reroutes)
            .finish()
    }
}
