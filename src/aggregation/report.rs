//! # Session Reports
//!
//! The final, ordered view of a session and the sinks it is delivered to.
//! Building and formatting a report are pure; delivery is the only side effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::Record;

/// What caused a session to finalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionReason {
    /// Every expected record arrived
    CountComplete,
    /// No record arrived within the idle window
    DeadlineExpired,
    /// The service stopped while the session was still open
    Shutdown,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionReason::CountComplete => write!(f, "count_complete"),
            CompletionReason::DeadlineExpired => write!(f, "deadline_expired"),
            CompletionReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub sub_id: String,
    pub status: String,
}

/// Ordered outcome of one finalized session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub key: String,
    pub session_id: Uuid,
    pub completion: CompletionReason,
    pub expected_count: u32,
    /// Entries sorted by `sub_id`, one per distinct ray
    pub entries: Vec<ReportEntry>,
    /// Number of distinct rays (equals `entries.len()`)
    pub total: usize,
    /// Number of arrivals, duplicates included
    pub received: u64,
    pub opened_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn build<I>(
        key: &str,
        session_id: Uuid,
        completion: CompletionReason,
        expected_count: u32,
        received: u64,
        opened_at: DateTime<Utc>,
        records: I,
    ) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut entries: Vec<ReportEntry> = records
            .into_iter()
            .map(|record| ReportEntry {
                sub_id: record.sub_id,
                status: record.status,
            })
            .collect();
        entries.sort_by(|a, b| a.sub_id.cmp(&b.sub_id));

        Self {
            key: key.to_string(),
            session_id,
            completion,
            expected_count,
            total: entries.len(),
            entries,
            received,
            opened_at,
            finalized_at: Utc::now(),
        }
    }

    /// Fewer distinct rays than the job declared
    pub fn is_partial(&self) -> bool {
        self.total < self.expected_count as usize
    }
}

/// Render the numbered listing emitted when a session finalizes
pub fn format_report(report: &SessionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Final grouped output for Reference Identifier: {} ({})",
        report.key, report.completion
    );
    for (index, entry) in report.entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. Ray Identifier: {} | State: {}",
            index + 1,
            entry.sub_id,
            entry.status
        );
    }
    let _ = write!(
        out,
        "Total ray_ids processed for refId {}: {} of {} expected",
        report.key, report.total, report.expected_count
    );
    out
}

/// Receives every finalized report
pub trait ReportSink: Send + Sync {
    fn deliver(&self, report: &SessionReport);
}

/// Writes the formatted listing to the log
#[derive(Debug, Default, Clone)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn deliver(&self, report: &SessionReport) {
        info!(
            key = %report.key,
            session_id = %report.session_id,
            completion = %report.completion,
            total = report.total,
            expected = report.expected_count,
            partial = report.is_partial(),
            "📦 Session finalized\n{}",
            format_report(report)
        );
    }
}

/// Delivers to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ReportSink for FanoutSink {
    fn deliver(&self, report: &SessionReport) {
        for sink in &self.sinks {
            sink.deliver(report);
        }
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
