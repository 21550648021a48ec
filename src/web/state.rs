//! # Web API Application State

use std::sync::Arc;

use crate::service::AggregatorService;
use crate::submission::SubmissionWriter;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub writer: Arc<SubmissionWriter>,
    /// Present when the API runs inside the aggregator process
    pub service: Option<Arc<AggregatorService>>,
}

impl AppState {
    pub fn new(writer: SubmissionWriter) -> Self {
        Self {
            writer: Arc::new(writer),
            service: None,
        }
    }

    pub fn with_service(mut self, service: Arc<AggregatorService>) -> Self {
        self.service = Some(service);
        self
    }
}
