use tokio::sync::broadcast;
use tracing::trace;

use crate::aggregation::report::{ReportSink, SessionReport};

/// Event name carried by every finalized-session event
pub const SESSION_FINALIZED: &str = "session.finalized";

/// Broadcasts finalized session reports to any number of subscribers
#[derive(Debug, Clone)]
pub struct ReportPublisher {
    sender: broadcast::Sender<PublishedReport>,
}

/// Report that has been published
#[derive(Debug, Clone)]
pub struct PublishedReport {
    pub name: String,
    pub report: SessionReport,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl ReportPublisher {
    /// Create a new publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a report, returning how many subscribers received it
    pub fn publish(&self, report: SessionReport) -> usize {
        let event = PublishedReport {
            name: SESSION_FINALIZED.to_string(),
            report,
            published_at: chrono::Utc::now(),
        };

        // send() only fails when nobody is subscribed, which is fine
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(key = %event.report.key, "No report subscribers");
                0
            }
        }
    }

    /// Subscribe to reports
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedReport> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ReportSink for ReportPublisher {
    fn deliver(&self, report: &SessionReport) {
        self.publish(report.clone());
    }
}

impl Default for ReportPublisher {
    fn default() -> Self {
        Self::new(1000) // Default capacity of 1000 reports
    }
}
