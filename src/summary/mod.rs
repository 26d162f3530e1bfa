//! Run outcome reporting
//!
//! Failure taxonomy, stable exit codes, per-job records and the
//! `run_summary.json` artifact.

mod failure;
mod job_record;
mod run_summary;

pub use failure::{ExitCode, ExitCodeAggregator, FailureKind, Status};
pub use job_record::JobRecord;
pub use run_summary::{RunSummary, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION};
