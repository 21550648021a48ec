pub mod document;
pub mod record;

// Re-export core models for easy access
pub use document::{
    parse_record, EventDocument, GenericExtract, JobInfo, NotificationInfo, ProcessStageInfo,
    TrackingInfo, TransactionInfo,
};
pub use record::Record;
