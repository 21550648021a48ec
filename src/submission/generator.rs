//! Synthetic batch producer: `jobs × rays` artifacts with the field layout real
//! extract producers emit.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use super::{SubmissionError, SubmissionWriter};
use crate::models::{
    EventDocument, GenericExtract, JobInfo, NotificationInfo, ProcessStageInfo, TrackingInfo,
    TransactionInfo,
};

const CLAIMS_PER_FILE: u32 = 5;
const FIRST_CLAIM_NUMBER: u32 = 11_000;

/// Largest batch `write_batch` accepts; keeps ray and claim numbering in range
pub const MAX_BATCH_FILES: u32 = 100_000;

/// Shape and pacing of a generated batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSpec {
    pub jobs: u32,
    pub rays_per_job: u32,
    /// Wait between consecutive files; none after the last
    pub pause: Duration,
}

impl Default for BatchSpec {
    fn default() -> Self {
        Self {
            jobs: 6,
            rays_per_job: 7,
            pause: Duration::from_secs(10),
        }
    }
}

impl BatchSpec {
    pub fn with_jobs(mut self, jobs: u32) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_rays_per_job(mut self, rays_per_job: u32) -> Self {
        self.rays_per_job = rays_per_job;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// `None` when the product does not fit in a `u32`
    pub fn total_files(&self) -> Option<u32> {
        self.jobs.checked_mul(self.rays_per_job)
    }

    fn checked_total(&self) -> Result<u32, SubmissionError> {
        self.total_files()
            .filter(|total| *total <= MAX_BATCH_FILES)
            .ok_or(SubmissionError::BatchTooLarge {
                jobs: self.jobs,
                rays_per_job: self.rays_per_job,
                max: MAX_BATCH_FILES,
            })
    }
}

/// Build the document for ray `ray` (1-based) of job `job` (1-based)
pub fn build_document(spec: &BatchSpec, job: u32, ray: u32) -> EventDocument {
    let overall_ray = (job - 1) * spec.rays_per_job + ray;
    let ray_identifier = format!("Dev_RayId_{overall_ray:03}");

    let first_claim = FIRST_CLAIM_NUMBER + (overall_ray - 1) * CLAIMS_PER_FILE + 1;
    let claim_ids: Vec<String> = (first_claim..first_claim + CLAIMS_PER_FILE)
        .map(|claim| format!("C{claim}"))
        .collect();

    EventDocument {
        notification_info: Some(NotificationInfo {
            stage: Some("Final".to_string()),
            source: Some("iPlus".to_string()),
        }),
        tracking_info: Some(TrackingInfo {
            ray_identifier: Some(ray_identifier),
            source_type_identifier: Some("PayementTeam001".to_string()),
            state: Some("Success".to_string()),
        }),
        job_info: Some(JobInfo {
            identifier: Some("Dev_ExtractId_001".to_string()),
            reference_identifier: Some(format!("Dev_JobId_{job:03}")),
            definition: Some("Payment_Extract_001".to_string()),
            transaction_count: Some(spec.rays_per_job),
            state: Some("Started".to_string()),
        }),
        transaction_info: vec![TransactionInfo {
            record_identifier: Some(format!("Dev_PageId_{overall_ray:03}")),
            generic_extract: Some(GenericExtract {
                page_no: Some(1),
                page_data_id: Some(format!("54000{overall_ray}")),
                line_count: Some(100),
                total_page: Some(1),
                extract_file_name: Some("GenericExtract\\summary".to_string()),
                traceables: Some(json!({
                    "paymentIdentifier": ["Pay_PaymentIdentifier"],
                    "rayIdentifier": ["Pay_RayIdentifier"],
                    "jobIdentifier": ["Pay_JobIdentifier"],
                    "claimIds": claim_ids,
                })),
            }),
            process_stage_info: process_stages(),
        }],
    }
}

fn process_stages() -> Vec<ProcessStageInfo> {
    [
        ("GENERIC-EXTRACTION-SERVICE - createFolder", "PROCESS_START", "2025-03-03 16:22:04.127"),
        ("GENERIC-EXTRACTION-SERVICE - createFolder", "PROCESS_END", "2025-03-03 16:24:04.127"),
        ("GENERIC-EXTRACTION-SERVICE - page data identifiers", "MESSAGE_PUBLISH", "2025-03-03 16:33:33.130"),
        ("GENERIC-EXTRACTION-SERVICE - FileGeneration", "SUCCESS", "2025-03-03 16:40:25.130"),
    ]
    .into_iter()
    .map(|(name, status, audit_time)| ProcessStageInfo {
        process_stage_name: Some(name.to_string()),
        process_status: Some(status.to_string()),
        audit_time: Some(audit_time.to_string()),
    })
    .collect()
}

/// Write the whole batch through `writer`, one `<rayIdentifier>.json` per document
pub async fn write_batch(
    writer: &SubmissionWriter,
    spec: &BatchSpec,
) -> Result<Vec<PathBuf>, SubmissionError> {
    let total = spec.checked_total()?;
    let mut written = Vec::with_capacity(total as usize);

    info!(
        jobs = spec.jobs,
        rays_per_job = spec.rays_per_job,
        directory = %writer.directory().display(),
        "📦 Generating batch"
    );

    for job in 1..=spec.jobs {
        for ray in 1..=spec.rays_per_job {
            let document = build_document(spec, job, ray);
            let overall_ray = (job - 1) * spec.rays_per_job + ray;
            let value = serde_json::to_value(&document)?;

            let path = writer
                .write_atomically(&format!("Dev_RayId_{overall_ray:03}.json"), &value)
                .await?;
            written.push(path);

            if (written.len() as u32) < total && !spec.pause.is_zero() {
                tokio::time::sleep(spec.pause).await;
            }
        }
    }

    info!(files = written.len(), "✅ Batch generated");
    Ok(written)
}
