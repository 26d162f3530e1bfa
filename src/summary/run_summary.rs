//! Run summary (run_summary.json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::failure::{ExitCode, ExitCodeAggregator, FailureKind, Status};
use super::job_record::JobRecord;

/// Schema version for run_summary.json
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_summary.json
pub const RUN_SUMMARY_SCHEMA_ID: &str = "distcc-cross/run_summary@1";

/// Run summary (run_summary.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub schema_id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,

    /// Aggregated status
    pub status: Status,

    /// Aggregated exit code
    pub exit_code: i32,

    pub job_count: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,

    /// Jobs never attempted because an earlier one failed
    pub jobs_skipped: usize,

    /// 1-based index of the job that stopped the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_job: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Wall-clock duration of the entire run in milliseconds
    pub duration_ms: u64,

    pub human_summary: String,

    pub jobs: Vec<JobRecord>,
}

impl RunSummary {
    /// Aggregate per-job records
    pub fn from_records(run_id: String, records: Vec<JobRecord>, duration_ms: u64) -> Self {
        let mut aggregator = ExitCodeAggregator::new();
        let (mut succeeded, mut failed, mut skipped) = (0, 0, 0);

        for record in &records {
            let exit_code = record
                .failure_kind
                .map(|kind| kind.exit_code())
                .unwrap_or(ExitCode::Process);
            aggregator.add(record.status, exit_code);
            match record.status {
                Status::Success => succeeded += 1,
                Status::Failed => failed += 1,
                Status::Skipped => skipped += 1,
            }
        }

        let first_failure = records.iter().find(|r| r.status.is_failure());
        let failed_job = first_failure.map(|r| r.index);
        let failure_kind = first_failure.and_then(|r| r.failure_kind);
        let status = aggregator.status();
        let human_summary = Self::generate_human_summary(
            status,
            records.len(),
            succeeded,
            skipped,
            first_failure,
        );

        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            status,
            exit_code: aggregator.exit_code().as_i32(),
            job_count: records.len(),
            jobs_succeeded: succeeded,
            jobs_failed: failed,
            jobs_skipped: skipped,
            failed_job,
            failure_kind,
            duration_ms,
            human_summary,
            jobs: records,
        }
    }

    fn generate_human_summary(
        status: Status,
        job_count: usize,
        succeeded: usize,
        skipped: usize,
        first_failure: Option<&JobRecord>,
    ) -> String {
        match (status, first_failure) {
            (Status::Failed, Some(failed)) => {
                let kind = failed
                    .failure_kind
                    .map(|k| k.description())
                    .unwrap_or("Job failed");
                format!(
                    "Run failed at job {}/{} ({}): {}. {} succeeded, {} skipped",
                    failed.index, job_count, failed.description, kind, succeeded, skipped
                )
            }
            _ if job_count == 1 => "Run succeeded".to_string(),
            _ => format!("Run succeeded: {}/{} jobs passed", succeeded, job_count),
        }
    }

    pub fn exit_code_enum(&self) -> Option<ExitCode> {
        ExitCode::from_i32(self.exit_code)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }
}
