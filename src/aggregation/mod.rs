//! # Aggregation
//!
//! Per-key sessions, the registry that owns them, and the reports they emit.
//!
//! ```text
//! Record ──▶ SessionRegistry::dispatch ──▶ Session::add_record
//!                                              │
//!                       count == 0 / deadline ─┴─▶ finalize ──▶ ReportSink
//!                                                     └──▶ registry release
//! ```

pub mod registry;
pub mod report;
pub mod session;

pub use registry::{DispatchOutcome, RegistryStats, SessionRegistry};
pub use report::{
    format_report, CompletionReason, FanoutSink, ReportEntry, ReportSink, SessionReport,
    TracingReportSink,
};
pub use session::{AddOutcome, ReleaseFn, Session, SessionSnapshot, SessionState};
