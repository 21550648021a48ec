//! # Event Document
//!
//! Wire model of one artifact as written by producers. Every group is optional
//! so that a half-flushed file still deserializes; [`parse_record`] decides
//! whether what arrived is usable.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::IngestError;
use crate::models::record::Record;

/// Status used when a tracking block carries no `state`
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// One artifact: notification, tracking and job metadata plus transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_info: Option<NotificationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_info: Option<TrackingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_info: Option<JobInfo>,
    #[serde(default)]
    pub transaction_info: Vec<TransactionInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInfo {
    pub stage: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub ray_identifier: Option<String>,
    pub source_type_identifier: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub identifier: Option<String>,
    pub reference_identifier: Option<String>,
    pub definition: Option<String>,
    pub transaction_count: Option<u32>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub record_identifier: Option<String>,
    pub generic_extract: Option<GenericExtract>,
    #[serde(default)]
    pub process_stage_info: Vec<ProcessStageInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericExtract {
    pub page_no: Option<u32>,
    pub page_data_id: Option<String>,
    pub line_count: Option<u32>,
    pub total_page: Option<u32>,
    pub extract_file_name: Option<String>,
    /// Free-form identifier lists (payment, ray, job, claim ids)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceables: Option<JsonValue>,
}

/// One audit entry of a transaction's processing history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStageInfo {
    pub process_stage_name: Option<String>,
    pub process_status: Option<String>,
    pub audit_time: Option<String>,
}

impl EventDocument {
    pub fn reference_identifier(&self) -> Option<&str> {
        self.job_info
            .as_ref()
            .and_then(|job| job.reference_identifier.as_deref())
    }
}

/// Decode raw artifact content into a [`Record`]
///
/// Syntax errors and missing groups are reported as retryable failures because
/// the writer may still be flushing. A job block without a reference
/// identifier is [`IngestError::MissingKey`], which no amount of waiting fixes.
pub fn parse_record(content: &str, source: &Path) -> Result<Record, IngestError> {
    let document: EventDocument = serde_json::from_str(content)?;

    let job = document
        .job_info
        .as_ref()
        .ok_or(IngestError::Incomplete { field: "jobInfo" })?;

    let key = job
        .reference_identifier
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or(IngestError::MissingKey)?;

    let expected_count = job.transaction_count.ok_or(IngestError::Incomplete {
        field: "jobInfo.transactionCount",
    })?;

    let tracking = document.tracking_info.as_ref().ok_or(IngestError::Incomplete {
        field: "trackingInfo",
    })?;

    let sub_id = tracking
        .ray_identifier
        .as_deref()
        .ok_or(IngestError::Incomplete {
            field: "trackingInfo.rayIdentifier",
        })?;

    let status = tracking.state.as_deref().unwrap_or(UNKNOWN_STATUS);

    Ok(Record::new(key, sub_id, status, expected_count).with_source(source))
}
