//! Per-job record, one per matrix entry

use serde::{Deserialize, Serialize};

use crate::job::Job;

use super::failure::{FailureKind, Status};

/// Outcome of a single planned job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// 1-based position in the matrix
    pub index: usize,

    /// "build" or "test"
    pub kind: String,

    /// Human-readable job description
    pub description: String,

    pub status: Status,

    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    fn new(index: usize, job: &Job, status: Status, duration_ms: u64) -> Self {
        Self {
            index,
            kind: job.kind().to_string(),
            description: job.to_string(),
            status,
            duration_ms,
            failure_kind: None,
            error: None,
        }
    }

    pub fn success(index: usize, job: &Job, duration_ms: u64) -> Self {
        Self::new(index, job, Status::Success, duration_ms)
    }

    pub fn failure(
        index: usize,
        job: &Job,
        duration_ms: u64,
        kind: FailureKind,
        error: String,
    ) -> Self {
        Self {
            failure_kind: Some(kind),
            error: Some(error),
            ..Self::new(index, job, Status::Failed, duration_ms)
        }
    }

    pub fn skipped(index: usize, job: &Job) -> Self {
        Self::new(index, job, Status::Skipped, 0)
    }
}
