//! # Session
//!
//! Per-key aggregation state. A session buffers records by ray identifier,
//! counts arrivals down from the job's declared transaction count, and
//! finalizes exactly once: when the count reaches zero, when its idle deadline
//! expires, or when the service flushes it on shutdown.
//!
//! `add_record` and `finalize` serialize on a per-session mutex. Sessions for
//! different keys never share a lock.
//!
//! ```text
//! Empty ──add_record──▶ Accumulating ──count reaches 0 / deadline──▶ Finalized
//!                         │    ▲
//!                         └────┘ add_record (deadline re-armed)
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregation::report::{CompletionReason, ReportSink, SessionReport};
use crate::logging::log_session_operation;
use crate::models::Record;
use crate::scheduler::{DeadlineHandle, DeadlineScheduler};

/// Invoked once from inside finalization so the owner can drop the session
pub type ReleaseFn = Arc<dyn Fn(&str, Uuid) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Empty,
    Accumulating,
    Finalized,
}

/// Result of handing a record to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Buffered; the idle deadline was re-armed
    Accepted { remaining: i64 },
    /// Buffered and the count reached zero; the session finalized
    Completed,
    /// The session had already finalized; nothing changed
    Rejected,
}

/// Point-in-time view of a session for observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub key: String,
    pub session_id: Uuid,
    pub state: SessionState,
    pub expected_count: u32,
    pub remaining: i64,
    pub received: u64,
    pub distinct: usize,
    /// Arrival time of the most recently received buffered record
    pub last_record_at: Option<DateTime<Utc>>,
    pub completion: Option<CompletionReason>,
}

struct SessionInner {
    buffer: BTreeMap<String, Record>,
    deadline: Option<DeadlineHandle>,
    /// Bumped on every re-arm; a firing deadline from an older generation is stale
    generation: u64,
    received: u64,
    finalized: bool,
    completion: Option<CompletionReason>,
}

pub struct Session {
    key: String,
    session_id: Uuid,
    expected_count: u32,
    remaining: AtomicI64,
    opened_at: DateTime<Utc>,
    idle_timeout: Duration,
    scheduler: DeadlineScheduler,
    sink: Arc<dyn ReportSink>,
    release: ReleaseFn,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(
        key: impl Into<String>,
        expected_count: u32,
        idle_timeout: Duration,
        scheduler: DeadlineScheduler,
        sink: Arc<dyn ReportSink>,
        release: ReleaseFn,
    ) -> Self {
        let key = key.into();
        let session_id = Uuid::new_v4();

        log_session_operation(
            "create",
            &key,
            Some(&session_id.to_string()),
            "open",
            Some(&format!("expected_count={expected_count}")),
        );

        Self {
            key,
            session_id,
            expected_count,
            remaining: AtomicI64::new(i64::from(expected_count)),
            opened_at: Utc::now(),
            idle_timeout,
            scheduler,
            sink,
            release,
            inner: Mutex::new(SessionInner {
                buffer: BTreeMap::new(),
                deadline: None,
                generation: 0,
                received: 0,
                finalized: false,
                completion: None,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn expected_count(&self) -> u32 {
        self.expected_count
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.lock().finalized
    }

    pub fn state(&self) -> SessionState {
        let inner = self.inner.lock();
        Self::state_of(&inner)
    }

    fn state_of(inner: &SessionInner) -> SessionState {
        if inner.finalized {
            SessionState::Finalized
        } else if inner.received == 0 {
            SessionState::Empty
        } else {
            SessionState::Accumulating
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            key: self.key.clone(),
            session_id: self.session_id,
            state: Self::state_of(&inner),
            expected_count: self.expected_count,
            remaining: self.remaining(),
            received: inner.received,
            distinct: inner.buffer.len(),
            last_record_at: inner.buffer.values().map(|record| record.received_at).max(),
            completion: inner.completion,
        }
    }

    /// Buffer a record, counting it toward completion
    ///
    /// A duplicate ray identifier replaces the earlier record but still counts.
    pub fn add_record(self: &Arc<Self>, record: Record) -> AddOutcome {
        let mut inner = self.inner.lock();

        if inner.finalized {
            debug!(
                key = %self.key,
                session_id = %self.session_id,
                sub_id = %record.sub_id,
                "Record arrived after finalization; ignoring"
            );
            return AddOutcome::Rejected;
        }

        if record.expected_count != self.expected_count {
            warn!(
                key = %self.key,
                sub_id = %record.sub_id,
                declared = record.expected_count,
                expected = self.expected_count,
                "⚠️ Record declares a different transaction count; keeping the first-seen value"
            );
        }

        let sub_id = record.sub_id.clone();
        let received_at = record.received_at;
        let source = record.source_path.clone();
        inner.received += 1;
        if inner.buffer.insert(sub_id.clone(), record).is_some() {
            debug!(key = %self.key, sub_id = %sub_id, "Duplicate ray identifier; latest status wins");
        }

        let remaining = self.remaining.fetch_sub(1, Ordering::AcqRel) - 1;

        info!(
            key = %self.key,
            sub_id = %sub_id,
            received = inner.received,
            remaining = remaining,
            received_at = %received_at,
            source = ?source,
            "📥 Record added to session"
        );

        if remaining <= 0 {
            self.finalize_locked(&mut inner, CompletionReason::CountComplete);
            return AddOutcome::Completed;
        }

        self.rearm_deadline(&mut inner);
        AddOutcome::Accepted { remaining }
    }

    /// Finalize now; returns false if the session had already finalized
    pub fn finalize(&self, reason: CompletionReason) -> bool {
        let mut inner = self.inner.lock();
        self.finalize_locked(&mut inner, reason)
    }

    fn rearm_deadline(self: &Arc<Self>, inner: &mut SessionInner) {
        if let Some(previous) = inner.deadline.take() {
            self.scheduler.cancel(previous);
        }

        inner.generation += 1;
        let generation = inner.generation;
        let session = Arc::downgrade(self);

        inner.deadline = Some(self.scheduler.schedule(self.idle_timeout, move || {
            if let Some(session) = session.upgrade() {
                session.on_deadline(generation);
            }
        }));
    }

    fn on_deadline(&self, generation: u64) {
        let mut inner = self.inner.lock();

        if inner.generation != generation {
            debug!(
                key = %self.key,
                fired = generation,
                current = inner.generation,
                "Superseded deadline fired; ignoring"
            );
            return;
        }

        inner.deadline = None;
        if self.finalize_locked(&mut inner, CompletionReason::DeadlineExpired) {
            warn!(
                key = %self.key,
                idle_timeout_secs = self.idle_timeout.as_secs(),
                received = inner.received,
                expected = self.expected_count,
                "⏰ Session idle deadline expired"
            );
        }
    }

    fn finalize_locked(&self, inner: &mut SessionInner, reason: CompletionReason) -> bool {
        if inner.finalized {
            return false;
        }
        inner.finalized = true;
        inner.completion = Some(reason);

        if let Some(deadline) = inner.deadline.take() {
            self.scheduler.cancel(deadline);
        }

        if inner.buffer.is_empty() {
            info!(key = %self.key, "No records to report for session");
        } else {
            let report = SessionReport::build(
                &self.key,
                self.session_id,
                reason,
                self.expected_count,
                inner.received,
                self.opened_at,
                inner.buffer.values().cloned(),
            );
            self.sink.deliver(&report);
        }

        (self.release)(&self.key, self.session_id);

        log_session_operation(
            "finalize",
            &self.key,
            Some(&self.session_id.to_string()),
            &reason.to_string(),
            Some(&format!(
                "distinct={} received={}",
                inner.buffer.len(),
                inner.received
            )),
        );
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("session_id", &self.session_id)
            .field("expected_count", &self.expected_count)
            .field("remaining", &self.remaining())
            .finish()
    }
}
