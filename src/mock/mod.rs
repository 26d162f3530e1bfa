//! Test doubles for the process and job seams
//!
//! - [`RecordingRunner`]: a `ProcessRunner` that records command lines and
//!   returns scripted exit codes
//! - [`FakeBackend`]: a `JobBackend` that records dispatched jobs and fails
//!   at a chosen position

mod backend;
mod runner;

pub use backend::FakeBackend;
pub use runner::RecordingRunner;
